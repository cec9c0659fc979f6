//! `POST /api/sessions/:id/card`: upload a vaccination card image.
//!
//! Multipart form with one file field named `card`. The media type comes
//! from the part's `Content-Type`, or is guessed from the file name.

use axum::extract::{Multipart, Path, State};
use axum::Json;
use serde::Serialize;

use crate::api::endpoints::sessions::SessionView;
use crate::api::error::ApiError;
use crate::api::types::{lock_session, parse_session_id, ApiContext};
use crate::pipeline::CardError;
use crate::session::UploadDecision;

const CARD_FIELD: &str = "card";
const DEFAULT_FILE_NAME: &str = "card";

#[derive(Debug, Serialize)]
pub struct CardUploadResponse {
    /// False when the same file was already processed.
    pub processed: bool,
    pub session: SessionView,
}

struct CardUpload {
    file_name: String,
    media_type: String,
    bytes: Vec<u8>,
}

pub async fn upload(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<CardUploadResponse>, ApiError> {
    let handle = ctx.core.session(parse_session_id(&id)?)?;
    let upload = read_card_field(&mut multipart).await?;

    let ticket = {
        let mut session = lock_session(&handle)?;
        match session.prepare_upload(&upload.file_name, &upload.media_type)? {
            UploadDecision::AlreadyProcessed => {
                tracing::info!(session_id = %id, "Card already processed, skipping");
                return Ok(Json(CardUploadResponse {
                    processed: false,
                    session: SessionView::of(&session),
                }));
            }
            UploadDecision::Process(ticket) => ticket,
        }
    };

    tracing::info!(
        session_id = %id,
        media_type = %upload.media_type,
        size = upload.bytes.len(),
        "Processing card upload"
    );

    // The session stays unlocked while the pipeline runs, so its
    // Processing state is visible to readers. The result is stored from
    // the blocking task, so it lands even if the client goes away.
    let core = ctx.core.clone();
    let task_handle = handle.clone();
    let fallback_ticket = ticket.clone();
    let joined = tokio::task::spawn_blocking(move || {
        let finished = ticket.process(core.processor(), &upload.media_type, &upload.bytes);
        let mut session = lock_session(&task_handle)?;
        Ok::<_, ApiError>(session.finish_upload(finished))
    })
    .await;

    let stored = match joined {
        Ok(stored) => stored?,
        Err(e) => {
            lock_session(&handle)?.complete_upload(
                fallback_ticket,
                Err(CardError::ExtractionFailed("processing was interrupted".into())),
            );
            return Err(ApiError::Internal(format!("Card processing task failed: {e}")));
        }
    };
    let processed = stored?;

    let session = lock_session(&handle)?;
    Ok(Json(CardUploadResponse {
        processed,
        session: SessionView::of(&session),
    }))
}

async fn read_card_field(multipart: &mut Multipart) -> Result<CardUpload, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {e}")))?
    {
        if field.name() != Some(CARD_FIELD) {
            continue;
        }

        let file_name = field
            .file_name()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_FILE_NAME)
            .to_string();
        let media_type = match field.content_type() {
            Some(declared) => declared.to_string(),
            None => mime_guess::from_path(&file_name)
                .first_raw()
                .unwrap_or("application/octet-stream")
                .to_string(),
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read card data: {e}")))?;

        if bytes.is_empty() {
            return Err(ApiError::BadRequest("Uploaded card is empty".into()));
        }

        return Ok(CardUpload {
            file_name,
            media_type,
            bytes: bytes.to_vec(),
        });
    }

    Err(ApiError::BadRequest(format!(
        "Missing multipart field '{CARD_FIELD}'"
    )))
}
