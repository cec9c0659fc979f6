//! Card extraction: one image in, one `VaccinationRecord` out.

use std::sync::Arc;
use std::time::Instant;

use super::inference::{ImagePayload, InferenceClient, InferenceRequest};
use super::normalize::normalize_response;
use super::prompt::EXTRACTION_PROMPT;
use super::CardError;
use crate::models::{CardMediaType, VaccinationRecord};

/// Sends a card image to the inference service and maps the reply onto
/// a record.
pub struct CardExtractor {
    client: Arc<dyn InferenceClient>,
}

impl CardExtractor {
    pub fn new(client: Arc<dyn InferenceClient>) -> Self {
        Self { client }
    }

    /// Extract a record from `image_bytes`.
    ///
    /// The declared media type is checked first: anything but JPEG/PNG is
    /// rejected without an outbound call. Unreadable images are rejected
    /// the same way. The record carries no precautions yet.
    pub fn extract(
        &self,
        declared_media_type: &str,
        image_bytes: &[u8],
    ) -> Result<VaccinationRecord, CardError> {
        let media_type = accepted_media_type(declared_media_type)?;

        let _span = tracing::info_span!(
            "card_extract",
            model = %self.client.model(),
            media_type = media_type.as_str(),
            image_size = image_bytes.len(),
        )
        .entered();
        let start = Instant::now();

        let (width, height) = decoded_dimensions(image_bytes)?;
        tracing::debug!(width, height, "Card image decoded");

        let request = InferenceRequest::with_image(
            EXTRACTION_PROMPT,
            ImagePayload {
                media_type,
                bytes: image_bytes,
            },
        )
        .expecting_json();

        let raw = self.client.generate(&request).map_err(|e| {
            tracing::warn!(error = %e, "Card extraction request failed");
            CardError::ExtractionFailed(e.to_string())
        })?;

        let value = normalize_response(&raw).map_err(|e| {
            tracing::warn!(error = %e, response_len = raw.len(), "Card extraction reply is not JSON");
            CardError::ExtractionFailed(e.to_string())
        })?;

        let record = VaccinationRecord::from_value(value)
            .map_err(|e| CardError::ExtractionFailed(e.to_string()))?;

        tracing::info!(
            elapsed_ms = %start.elapsed().as_millis(),
            vaccines_received = record.vaccines_received.len(),
            due_vaccines = record.due_vaccines.len(),
            "Card extraction complete"
        );

        Ok(record)
    }
}

/// Parse the declared media type, accepting only JPEG and PNG.
pub fn accepted_media_type(declared: &str) -> Result<CardMediaType, CardError> {
    CardMediaType::from_declared(declared)
        .map_err(|_| CardError::UnsupportedFormat(declared.trim().to_string()))
}

fn decoded_dimensions(image_bytes: &[u8]) -> Result<(u32, u32), CardError> {
    use image::GenericImageView;

    let image = image::load_from_memory(image_bytes).map_err(|e| {
        tracing::warn!(error = %e, "Card image could not be decoded");
        CardError::ExtractionFailed(format!("unreadable image: {e}"))
    })?;
    Ok(image.dimensions())
}
