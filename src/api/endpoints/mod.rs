pub mod card;
pub mod chat;
pub mod health;
pub mod sessions;

use crate::api::error::ApiError;

/// Fallback for unknown routes, so clients always get a JSON error body.
pub async fn not_found() -> ApiError {
    ApiError::NotFound("No such endpoint".into())
}
