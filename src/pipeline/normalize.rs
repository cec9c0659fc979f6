//! Response normalizer: unwrap an optional code fence, then parse JSON.
//!
//! Models asked for JSON sometimes answer with a fenced block
//! (```` ```json ... ``` ````) anyway. The fence carries no meaning, so
//! it is stripped before parsing.

use serde_json::Value;
use thiserror::Error;

const FENCE: &str = "```";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("Malformed model response: {0}")]
    MalformedResponse(String),
}

/// Parse a model's raw text output as JSON, ignoring a wrapping code fence.
pub fn normalize_response(raw: &str) -> Result<Value, NormalizeError> {
    let body = strip_code_fence(raw);
    serde_json::from_str(body).map_err(|e| NormalizeError::MalformedResponse(e.to_string()))
}

/// Remove a leading ```` ```lang ```` line and the trailing ```` ``` ````.
///
/// Text that does not start with a fence is returned trimmed, otherwise
/// untouched.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(after_open) = trimmed.strip_prefix(FENCE) else {
        return trimmed;
    };

    let inner = match after_open.find('\n') {
        Some(newline) => &after_open[newline + 1..],
        // Single-line fence: ```json{...}```
        None => after_open.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
    };

    let inner = inner.trim_end();
    inner.strip_suffix(FENCE).unwrap_or(inner).trim()
}
