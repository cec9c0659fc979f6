//! `POST /api/sessions/:id/chat`: ask a question about the card.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{lock_session, parse_session_id, ApiContext};
use crate::pipeline::ChatReply;

const MAX_MESSAGE_CHARS: usize = 2000;

#[derive(Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyKind {
    Answer,
    Notice,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub kind: ReplyKind,
    pub content: String,
}

impl From<ChatReply> for ChatResponse {
    fn from(reply: ChatReply) -> Self {
        match reply {
            ChatReply::Answer(content) => Self {
                kind: ReplyKind::Answer,
                content,
            },
            ChatReply::Notice(content) => Self {
                kind: ReplyKind::Notice,
                content,
            },
        }
    }
}

pub async fn send(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let handle = ctx.core.session(parse_session_id(&id)?)?;
    let Json(req) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let message = req.message.trim().to_string();
    if message.is_empty() {
        return Err(ApiError::BadRequest("Message cannot be empty".into()));
    }
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ApiError::BadRequest(format!(
            "Message too long (max {MAX_MESSAGE_CHARS} chars)"
        )));
    }

    let core = ctx.core.clone();
    let reply = tokio::task::spawn_blocking(move || -> Result<ChatReply, ApiError> {
        let mut session = lock_session(&handle)?;
        let today = chrono::Local::now().date_naive();
        Ok(session.ask(&message, core.client(), today)?)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Chat task failed: {e}")))??;

    Ok(Json(reply.into()))
}
