//! Conversational Q&A over the extracted record.

use chrono::NaiveDate;
use thiserror::Error;

use super::inference::{InferenceClient, InferenceError, InferenceRequest};
use super::prompt::build_answer_prompt;
use crate::models::VaccinationRecord;

/// Shown instead of an answer when no card has been processed.
pub const NO_RECORD_NOTICE: &str = "Please upload your vaccination card first";

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Answer generation failed: {0}")]
    Inference(#[from] InferenceError),

    #[error("Could not serialize vaccination record: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Reply to one chat turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatReply {
    /// Model output, unmodified.
    Answer(String),
    /// Precondition notice; no model call was made.
    Notice(String),
}

impl ChatReply {
    pub fn content(&self) -> &str {
        match self {
            Self::Answer(text) | Self::Notice(text) => text,
        }
    }
}

/// Answer `question` about `record`.
///
/// Without a record this returns the upload notice and never touches
/// `client`.
pub fn answer(
    client: &dyn InferenceClient,
    question: &str,
    record: Option<&VaccinationRecord>,
    today: NaiveDate,
) -> Result<ChatReply, ChatError> {
    let Some(record) = record else {
        return Ok(ChatReply::Notice(NO_RECORD_NOTICE.to_string()));
    };

    let _span = tracing::info_span!(
        "chat_answer",
        model = %client.model(),
        question_len = question.len(),
    )
    .entered();
    let start = std::time::Instant::now();

    let record_json = record.to_pretty_json()?;
    let prompt = build_answer_prompt(&record_json, question, today);
    let reply = client.generate(&InferenceRequest::text(&prompt))?;

    tracing::info!(
        elapsed_ms = %start.elapsed().as_millis(),
        reply_len = reply.len(),
        "Chat answer generated"
    );
    Ok(ChatReply::Answer(reply))
}
