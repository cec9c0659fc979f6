//! Card pipeline: normalize, extract, enrich, answer.

pub mod answer;
pub mod extraction;
pub mod inference;
pub mod normalize;
pub mod precautions;
pub mod processor;
pub mod prompt;

pub use answer::{answer, ChatError, ChatReply, NO_RECORD_NOTICE};
pub use extraction::CardExtractor;
pub use precautions::{PrecautionEnricher, PrecautionOutcome, FALLBACK_PRECAUTIONS};
pub use processor::{CardProcessor, ProcessedCard};

use thiserror::Error;

/// Errors surfaced to the user when a card upload cannot be processed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CardError {
    #[error("Only JPEG/PNG images are supported (got '{0}')")]
    UnsupportedFormat(String),

    #[error("Failed to extract vaccination data: {0}")]
    ExtractionFailed(String),
}
