//! Session endpoints.
//!
//! - `POST /api/sessions`: start a session
//! - `GET /api/sessions/:id`: card status, details and transcript
//! - `DELETE /api/sessions/:id`: tear the session down

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::{lock_session, parse_session_id, ApiContext};
use crate::details::CardDetails;
use crate::models::{CardStatus, ChatMessage};
use crate::session::VaccinationSession;

#[derive(Serialize)]
pub struct SessionCreated {
    pub session_id: String,
}

/// Snapshot of one session, as the front end renders it.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: String,
    pub created_at: String,
    pub status: CardStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<CardDetails>,
    pub transcript: Vec<ChatMessage>,
}

impl SessionView {
    pub fn of(session: &VaccinationSession) -> Self {
        Self {
            session_id: session.id().to_string(),
            created_at: session.created_at().to_rfc3339(),
            status: session.status(),
            file_name: session.upload_marker().map(str::to_string),
            failure_reason: session.failure_reason().map(str::to_string),
            details: session.record().map(CardDetails::from_record),
            transcript: session.transcript().to_vec(),
        }
    }
}

/// `POST /api/sessions`
pub async fn create(
    State(ctx): State<ApiContext>,
) -> Result<(StatusCode, Json<SessionCreated>), ApiError> {
    let (id, _) = ctx.core.create_session()?;
    Ok((
        StatusCode::CREATED,
        Json(SessionCreated {
            session_id: id.to_string(),
        }),
    ))
}

/// `GET /api/sessions/:id`
pub async fn view(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, ApiError> {
    let handle = ctx.core.session(parse_session_id(&id)?)?;
    let mut session = lock_session(&handle)?;
    session.touch();
    Ok(Json(SessionView::of(&session)))
}

/// `DELETE /api/sessions/:id`
pub async fn end(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    ctx.core.end_session(parse_session_id(&id)?)?;
    Ok(StatusCode::NO_CONTENT)
}
