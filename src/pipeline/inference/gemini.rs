use base64::Engine as _;
use serde::{Deserialize, Serialize};

use super::{InferenceClient, InferenceError, InferenceRequest, ResponseFormat};
use crate::config::{ApiKey, Settings};

/// Longest slice of an error body kept in error messages.
const MAX_ERROR_BODY_CHARS: usize = 300;

/// Gemini `generateContent` client over blocking HTTP.
pub struct GeminiClient {
    base_url: String,
    model: String,
    api_key: ApiKey,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl GeminiClient {
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: ApiKey,
        timeout_secs: u64,
    ) -> Result<Self, InferenceError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| InferenceError::Transport(format!("HTTP client setup failed: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
            client,
            timeout_secs,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, InferenceError> {
        Self::new(
            &settings.gemini_url,
            &settings.model,
            settings.api_key.clone(),
            settings.request_timeout_secs,
        )
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

// ──────────────────────────────────────────────
// Wire types
// ──────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    Image {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: &'static str,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorPayload,
}

#[derive(Deserialize)]
struct ErrorPayload {
    message: String,
}

fn build_request_body<'a>(request: &InferenceRequest<'a>) -> GenerateContentRequest<'a> {
    let mut parts = vec![Part::Text {
        text: request.prompt,
    }];
    if let Some(image) = request.image {
        parts.push(Part::Image {
            inline_data: InlineData {
                mime_type: image.media_type.as_str(),
                data: base64::engine::general_purpose::STANDARD.encode(image.bytes),
            },
        });
    }

    let generation_config = match request.format {
        ResponseFormat::Json => Some(GenerationConfig {
            response_mime_type: "application/json",
        }),
        ResponseFormat::Text => None,
    };

    GenerateContentRequest {
        contents: vec![Content { role: "user", parts }],
        generation_config,
    }
}

/// Concatenate the text parts of the first candidate.
fn response_text(response: GenerateContentResponse) -> Result<String, InferenceError> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(InferenceError::EmptyResponse(format!("prompt blocked ({reason})")));
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| InferenceError::EmptyResponse("no candidates".into()))?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        let reason = candidate
            .finish_reason
            .unwrap_or_else(|| "empty candidate".into());
        return Err(InferenceError::EmptyResponse(reason));
    }
    Ok(text)
}

fn error_message(body: &str) -> String {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.trim().to_string());
    message.chars().take(MAX_ERROR_BODY_CHARS).collect()
}

impl InferenceClient for GeminiClient {
    fn generate(&self, request: &InferenceRequest<'_>) -> Result<String, InferenceError> {
        let body = build_request_body(request);

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.expose())
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    InferenceError::Timeout(self.timeout_secs)
                } else if e.is_connect() {
                    InferenceError::Transport(format!("cannot connect to {}", self.base_url))
                } else {
                    InferenceError::Transport(e.without_url().to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(InferenceError::Unauthorized(status.as_u16()));
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(InferenceError::Api {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let parsed: GenerateContentResponse = response
            .json()
            .map_err(|e| InferenceError::ResponseParsing(e.without_url().to_string()))?;

        response_text(parsed)
    }

    fn model(&self) -> &str {
        &self.model
    }
}
