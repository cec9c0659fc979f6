//! Precaution enricher: 2-3 precautions per due vaccine.
//!
//! A failed lookup never fails the card. The entry gets the fixed
//! fallback list instead, and the outcome says which one it got.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use super::inference::{InferenceClient, InferenceRequest};
use super::normalize::normalize_response;
use super::prompt::build_precautions_prompt;
use crate::models::{PrecautionSource, VaccinationRecord};

/// Substituted whenever the model cannot supply precautions.
pub const FALLBACK_PRECAUTIONS: [&str; 2] = [
    "Consult your doctor before vaccination",
    "Inform about any allergies",
];

pub fn fallback_precautions() -> Vec<String> {
    FALLBACK_PRECAUTIONS.iter().map(|p| p.to_string()).collect()
}

/// Result of one precaution lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrecautionOutcome {
    /// The model answered with a usable list.
    Provided(Vec<String>),
    /// The lookup failed; the fallback list applies.
    Fallback { reason: String },
}

impl PrecautionOutcome {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }

    pub fn source(&self) -> PrecautionSource {
        match self {
            Self::Provided(_) => PrecautionSource::Model,
            Self::Fallback { .. } => PrecautionSource::Fallback,
        }
    }

    /// The list to store on the due vaccine.
    pub fn precautions(&self) -> Vec<String> {
        match self {
            Self::Provided(list) => list.clone(),
            Self::Fallback { .. } => fallback_precautions(),
        }
    }
}

pub struct PrecautionEnricher {
    client: Arc<dyn InferenceClient>,
}

impl PrecautionEnricher {
    pub fn new(client: Arc<dyn InferenceClient>) -> Self {
        Self { client }
    }

    /// Populate `precautions` on every due vaccine, in order.
    ///
    /// Returns one outcome per due vaccine, index-aligned with
    /// `record.due_vaccines`.
    pub fn enrich(&self, mut record: VaccinationRecord) -> (VaccinationRecord, Vec<PrecautionOutcome>) {
        let _span = tracing::info_span!(
            "precaution_enrich",
            due_vaccines = record.due_vaccines.len(),
        )
        .entered();
        let start = Instant::now();

        let mut outcomes = Vec::with_capacity(record.due_vaccines.len());
        for due in &mut record.due_vaccines {
            let outcome = self.lookup(due.name.as_deref());
            due.precautions = Some(outcome.precautions());
            due.precaution_source = Some(outcome.source());
            outcomes.push(outcome);
        }

        let fallbacks = outcomes.iter().filter(|o| o.is_fallback()).count();
        tracing::info!(
            elapsed_ms = %start.elapsed().as_millis(),
            total = outcomes.len(),
            fallbacks,
            "Precaution enrichment complete"
        );

        (record, outcomes)
    }

    /// Look up precautions for one vaccine.
    pub fn lookup(&self, vaccine_name: Option<&str>) -> PrecautionOutcome {
        let name = match vaccine_name.map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => return degraded("due vaccine has no name".into(), None),
        };

        let prompt = build_precautions_prompt(name);
        let request = InferenceRequest::text(&prompt).expecting_json();

        let raw = match self.client.generate(&request) {
            Ok(raw) => raw,
            Err(e) => return degraded(e.to_string(), Some(name)),
        };

        match normalize_response(&raw)
            .map_err(|e| e.to_string())
            .and_then(precaution_list)
        {
            Ok(list) => PrecautionOutcome::Provided(list),
            Err(reason) => degraded(reason, Some(name)),
        }
    }
}

fn degraded(reason: String, vaccine: Option<&str>) -> PrecautionOutcome {
    tracing::warn!(
        vaccine = vaccine.unwrap_or("<unnamed>"),
        reason = %reason,
        "Precaution lookup failed, using fallback list"
    );
    PrecautionOutcome::Fallback { reason }
}

/// Read the string array at `precautions`. A bare array is accepted too.
fn precaution_list(value: Value) -> Result<Vec<String>, String> {
    let items = match value {
        Value::Object(mut map) => match map.remove("precautions") {
            Some(Value::Array(items)) => items,
            Some(_) => return Err("'precautions' is not an array".into()),
            None => return Err("missing 'precautions' key".into()),
        },
        Value::Array(items) => items,
        _ => return Err("reply is neither an object nor an array".into()),
    };

    let list = items
        .into_iter()
        .map(|item| match item {
            Value::String(s) => Ok(s),
            _ => Err("'precautions' contains a non-string item".to_string()),
        })
        .collect::<Result<Vec<_>, _>>()?;

    if list.is_empty() {
        return Err("'precautions' is empty".into());
    }
    Ok(list)
}
