//! Display view of a vaccination record, placeholders already applied.
//!
//! Mirrors the three panels a front end shows: patient information,
//! vaccines received, and due vaccines with precautions.

use serde::Serialize;

use crate::models::{PrecautionSource, VaccinationRecord};

pub const NOT_AVAILABLE: &str = "N/A";
pub const UNNAMED_VACCINE: &str = "Vaccine";
pub const NO_HISTORY_MESSAGE: &str = "No vaccination history found";
pub const NO_UPCOMING_MESSAGE: &str = "No upcoming vaccines found";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardDetails {
    pub patient: PatientDetails,
    pub vaccines_received: DetailsSection<ReceivedDetails>,
    pub due_vaccines: DetailsSection<DueDetails>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatientDetails {
    pub name: String,
    pub date_of_birth: String,
    pub patient_id: String,
}

/// A list panel. `empty_message` is set iff `entries` is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetailsSection<T> {
    pub entries: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_message: Option<&'static str>,
}

impl<T> DetailsSection<T> {
    fn new(entries: Vec<T>, empty_message: &'static str) -> Self {
        let empty_message = entries.is_empty().then_some(empty_message);
        Self {
            entries,
            empty_message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceivedDetails {
    pub name: String,
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DueDetails {
    pub name: String,
    pub due_date: String,
    pub precautions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precaution_source: Option<PrecautionSource>,
}

impl CardDetails {
    pub fn from_record(record: &VaccinationRecord) -> Self {
        let info = &record.patient_info;
        let patient = PatientDetails {
            name: or_placeholder(info.name.as_deref(), NOT_AVAILABLE),
            date_of_birth: or_placeholder(info.dob.as_deref(), NOT_AVAILABLE),
            patient_id: or_placeholder(info.patient_id.as_deref(), NOT_AVAILABLE),
        };

        let received = record
            .vaccines_received
            .iter()
            .map(|v| ReceivedDetails {
                name: or_placeholder(v.name.as_deref(), UNNAMED_VACCINE),
                date: or_placeholder(v.date.as_deref(), NOT_AVAILABLE),
            })
            .collect();

        let due = record
            .due_vaccines
            .iter()
            .map(|v| DueDetails {
                name: or_placeholder(v.name.as_deref(), UNNAMED_VACCINE),
                due_date: or_placeholder(v.due_date.as_deref(), NOT_AVAILABLE),
                precautions: v.precautions.clone().unwrap_or_default(),
                precaution_source: v.precaution_source,
            })
            .collect();

        Self {
            patient,
            vaccines_received: DetailsSection::new(received, NO_HISTORY_MESSAGE),
            due_vaccines: DetailsSection::new(due, NO_UPCOMING_MESSAGE),
        }
    }
}

/// Missing and blank values both read as the placeholder.
fn or_placeholder(value: Option<&str>, placeholder: &str) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => placeholder.to_string(),
    }
}
