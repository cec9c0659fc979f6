//! Card processing: extraction followed by precaution enrichment.
//!
//! Single entry point for an uploaded card. Uses the `InferenceClient`
//! trait so the whole chain runs against a mock in tests.

use std::sync::Arc;
use std::time::Instant;

use super::extraction::CardExtractor;
use super::inference::InferenceClient;
use super::precautions::{PrecautionEnricher, PrecautionOutcome};
use super::CardError;
use crate::models::VaccinationRecord;

/// A fully processed card.
#[derive(Debug, Clone)]
pub struct ProcessedCard {
    pub record: VaccinationRecord,
    /// One entry per due vaccine, in record order.
    pub precautions: Vec<PrecautionOutcome>,
}

impl ProcessedCard {
    pub fn fallback_count(&self) -> usize {
        self.precautions.iter().filter(|o| o.is_fallback()).count()
    }
}

pub struct CardProcessor {
    extractor: CardExtractor,
    enricher: PrecautionEnricher,
}

impl CardProcessor {
    pub fn new(client: Arc<dyn InferenceClient>) -> Self {
        Self {
            extractor: CardExtractor::new(client.clone()),
            enricher: PrecautionEnricher::new(client),
        }
    }

    /// Extract then enrich. The record is only returned whole: an
    /// extraction failure leaves nothing behind.
    pub fn process(
        &self,
        declared_media_type: &str,
        image_bytes: &[u8],
    ) -> Result<ProcessedCard, CardError> {
        let _span = tracing::info_span!("card_process", image_size = image_bytes.len()).entered();
        let start = Instant::now();

        let record = self.extractor.extract(declared_media_type, image_bytes)?;
        let (record, precautions) = self.enricher.enrich(record);
        let card = ProcessedCard {
            record,
            precautions,
        };

        tracing::info!(
            elapsed_ms = %start.elapsed().as_millis(),
            due_vaccines = card.precautions.len(),
            fallbacks = card.fallback_count(),
            "Card processed"
        );
        Ok(card)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extraction::tests::{png_bytes, CARD_JSON};
    use crate::pipeline::inference::{InferenceError, MockInferenceClient, MockReply};
    use crate::pipeline::precautions::fallback_precautions;

    #[test]
    fn extraction_then_enrichment() {
        let mock = Arc::new(MockInferenceClient::scripted(vec![
            MockReply::text(CARD_JSON),
            MockReply::text(r#"{"precautions": ["Mild soreness is common", "Tell staff about allergies"]}"#),
        ]));
        let card = CardProcessor::new(mock.clone())
            .process("image/png", &png_bytes())
            .unwrap();

        assert_eq!(card.record.patient_info.name.as_deref(), Some("Jane Doe"));
        assert_eq!(card.record.due_vaccines.len(), 1);
        assert_eq!(
            card.record.due_vaccines[0].precautions.as_ref().unwrap()[0],
            "Mild soreness is common"
        );
        assert_eq!(card.fallback_count(), 0);
        assert_eq!(mock.call_count(), 2);
        assert!(!mock.calls()[1].had_image);
    }

    #[test]
    fn precaution_failure_does_not_fail_card() {
        let mock = Arc::new(MockInferenceClient::scripted(vec![
            MockReply::text(CARD_JSON),
            MockReply::Fail(InferenceError::Timeout(120)),
        ]));
        let card = CardProcessor::new(mock)
            .process("image/jpeg", &png_bytes())
            .unwrap();
        assert_eq!(card.record.due_vaccines[0].precautions, Some(fallback_precautions()));
        assert_eq!(card.fallback_count(), 1);
    }

    #[test]
    fn extraction_failure_skips_enrichment() {
        let mock = Arc::new(MockInferenceClient::scripted(vec![MockReply::transport_error()]));
        let err = CardProcessor::new(mock.clone())
            .process("image/png", &png_bytes())
            .unwrap_err();
        assert!(matches!(err, CardError::ExtractionFailed(_)));
        assert_eq!(mock.call_count(), 1);
    }
}
