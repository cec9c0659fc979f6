//! Shared types for the API layer.

use std::sync::{Arc, MutexGuard};

use crate::api::error::ApiError;
use crate::core_state::{CoreState, SessionHandle};
use crate::session::VaccinationSession;

/// Shared context for all API routes.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self { core }
    }
}

/// Parse a session ID path segment.
pub fn parse_session_id(raw: &str) -> Result<uuid::Uuid, ApiError> {
    uuid::Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest("Invalid session ID".into()))
}

/// Lock a session for the duration of one operation.
pub fn lock_session(handle: &SessionHandle) -> Result<MutexGuard<'_, VaccinationSession>, ApiError> {
    handle
        .lock()
        .map_err(|_| ApiError::Internal("session lock poisoned".into()))
}
