//! Inference capability: the multimodal model behind card extraction,
//! precaution lookup, and chat answers.
//!
//! Everything above this layer talks to `InferenceClient`, a blocking
//! trait with a single `generate` call. `GeminiClient` is the production
//! implementation; `MockInferenceClient` scripts replies and records calls
//! for tests.

pub mod gemini;
pub mod mock;

pub use gemini::GeminiClient;
pub use mock::{MockInferenceClient, MockReply, RecordedCall};

use thiserror::Error;

use crate::models::CardMediaType;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InferenceError {
    #[error("Inference service unreachable: {0}")]
    Transport(String),

    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    #[error("Inference service rejected the API key (HTTP {0})")]
    Unauthorized(u16),

    #[error("Inference service returned an error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Inference service returned no text: {0}")]
    EmptyResponse(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),
}

/// Output format hint passed to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFormat {
    #[default]
    Text,
    Json,
}

/// Raw image attached to a request.
#[derive(Debug, Clone, Copy)]
pub struct ImagePayload<'a> {
    pub media_type: CardMediaType,
    pub bytes: &'a [u8],
}

/// One generation request: a prompt, optionally an image, and a format hint.
#[derive(Debug, Clone, Copy)]
pub struct InferenceRequest<'a> {
    pub prompt: &'a str,
    pub image: Option<ImagePayload<'a>>,
    pub format: ResponseFormat,
}

impl<'a> InferenceRequest<'a> {
    /// Text-only request.
    pub fn text(prompt: &'a str) -> Self {
        Self {
            prompt,
            image: None,
            format: ResponseFormat::Text,
        }
    }

    /// Prompt plus one image.
    pub fn with_image(prompt: &'a str, image: ImagePayload<'a>) -> Self {
        Self {
            prompt,
            image: Some(image),
            format: ResponseFormat::Text,
        }
    }

    /// Ask the model for JSON output.
    pub fn expecting_json(mut self) -> Self {
        self.format = ResponseFormat::Json;
        self
    }
}

/// Multimodal model abstraction (allows mocking).
///
/// Calls block until the model replies or the transport gives up.
pub trait InferenceClient: Send + Sync {
    fn generate(&self, request: &InferenceRequest<'_>) -> Result<String, InferenceError>;

    /// Model identifier, for logs and health output.
    fn model(&self) -> &str;
}
