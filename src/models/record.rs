use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::enums::PrecautionSource;

/// Structured contents of one vaccination card.
///
/// Built once per accepted upload by the extraction pipeline, then extended
/// in place with precautions for each due vaccine. Serializes back to the
/// JSON shape the extraction prompt asks for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VaccinationRecord {
    #[serde(default)]
    pub patient_info: PatientInfo,
    #[serde(default)]
    pub vaccines_received: Vec<ReceivedVaccine>,
    #[serde(default)]
    pub due_vaccines: Vec<DueVaccine>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientInfo {
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub dob: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedVaccine {
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueVaccine {
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    /// Filled by the precaution enricher; absent straight out of extraction.
    #[serde(default, deserialize_with = "lenient_string_list", skip_serializing_if = "Option::is_none")]
    pub precautions: Option<Vec<String>>,
    /// Where `precautions` came from. Not part of the model-facing JSON.
    #[serde(skip)]
    pub precaution_source: Option<PrecautionSource>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordShapeError {
    #[error("Expected a JSON object for the vaccination record, got {0}")]
    NotAnObject(&'static str),
}

impl VaccinationRecord {
    /// Map a parsed model response onto a record.
    ///
    /// Missing keys default to absent/empty. Array entries that cannot be
    /// read as vaccines are skipped rather than failing the whole record.
    pub fn from_value(value: Value) -> Result<Self, RecordShapeError> {
        let mut map = match value {
            Value::Object(map) => map,
            other => return Err(RecordShapeError::NotAnObject(json_kind(&other))),
        };

        let patient_info = map
            .remove("patient_info")
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();

        Ok(Self {
            patient_info,
            vaccines_received: parse_array_lenient(map.remove("vaccines_received")),
            due_vaccines: parse_array_lenient(map.remove("due_vaccines")),
        })
    }

    /// Pretty JSON, as embedded in chat prompts.
    pub fn to_pretty_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Parse an array leniently, skipping items that fail to deserialize.
fn parse_array_lenient<T: for<'de> Deserialize<'de>>(items: Option<Value>) -> Vec<T> {
    match items {
        Some(Value::Array(arr)) => arr
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect(),
        _ => vec![],
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Accept strings and bare numbers; anything else reads as absent.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_string_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
        ),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "patient_info": {"name": "Jane Doe", "dob": "1990-01-01", "patient_id": "X1"},
            "vaccines_received": [{"name": "MMR", "date": "2000-05-01"}],
            "due_vaccines": [{"name": "Tdap", "due_date": "2025-01-01"}]
        })
    }

    #[test]
    fn full_record_maps_every_field() {
        let record = VaccinationRecord::from_value(sample()).unwrap();
        assert_eq!(record.patient_info.name.as_deref(), Some("Jane Doe"));
        assert_eq!(record.patient_info.dob.as_deref(), Some("1990-01-01"));
        assert_eq!(record.patient_info.patient_id.as_deref(), Some("X1"));
        assert_eq!(record.vaccines_received.len(), 1);
        assert_eq!(record.vaccines_received[0].name.as_deref(), Some("MMR"));
        assert_eq!(record.due_vaccines[0].due_date.as_deref(), Some("2025-01-01"));
        assert!(record.due_vaccines[0].precautions.is_none());
    }

    #[test]
    fn serializes_back_to_the_same_shape() {
        let record = VaccinationRecord::from_value(sample()).unwrap();
        assert_eq!(serde_json::to_value(&record).unwrap(), sample());
    }

    #[test]
    fn missing_keys_default_to_empty() {
        let record = VaccinationRecord::from_value(json!({})).unwrap();
        assert_eq!(record, VaccinationRecord::default());
    }

    #[test]
    fn missing_patient_id_is_absent_not_an_error() {
        let record = VaccinationRecord::from_value(json!({
            "patient_info": {"name": "Sam"}
        }))
        .unwrap();
        assert_eq!(record.patient_info.name.as_deref(), Some("Sam"));
        assert!(record.patient_info.patient_id.is_none());
    }

    #[test]
    fn numeric_identifiers_are_read_as_strings() {
        let record = VaccinationRecord::from_value(json!({
            "patient_info": {"patient_id": 448812, "dob": null}
        }))
        .unwrap();
        assert_eq!(record.patient_info.patient_id.as_deref(), Some("448812"));
        assert!(record.patient_info.dob.is_none());
    }

    #[test]
    fn unreadable_entries_are_skipped() {
        let record = VaccinationRecord::from_value(json!({
            "vaccines_received": [
                {"name": "Polio", "date": "2001-02-03"},
                "not an object",
                42,
                {"name": "Hep B"}
            ],
            "due_vaccines": "none"
        }))
        .unwrap();
        assert_eq!(record.vaccines_received.len(), 2);
        assert_eq!(record.vaccines_received[1].name.as_deref(), Some("Hep B"));
        assert!(record.vaccines_received[1].date.is_none());
        assert!(record.due_vaccines.is_empty());
    }

    #[test]
    fn non_object_is_rejected() {
        let err = VaccinationRecord::from_value(json!(["MMR"])).unwrap_err();
        assert_eq!(err, RecordShapeError::NotAnObject("an array"));
    }

    #[test]
    fn precaution_source_is_not_serialized() {
        let mut record = VaccinationRecord::from_value(sample()).unwrap();
        record.due_vaccines[0].precautions = Some(vec!["Rest".into()]);
        record.due_vaccines[0].precaution_source = Some(PrecautionSource::Fallback);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["due_vaccines"][0]["precautions"], json!(["Rest"]));
        assert!(value["due_vaccines"][0].get("precaution_source").is_none());
    }

    #[test]
    fn pretty_json_contains_names() {
        let record = VaccinationRecord::from_value(sample()).unwrap();
        let text = record.to_pretty_json().unwrap();
        assert!(text.contains("\"Jane Doe\""));
        assert!(text.contains('\n'));
    }
}
