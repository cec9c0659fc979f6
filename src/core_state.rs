//! Shared application state: live sessions plus the inference client.
//!
//! `CoreState` is wrapped in `Arc` at startup and handed to the API
//! layer. The session map sits behind an `RwLock` (lookups far outnumber
//! creations); each session has its own `Mutex` so one user's slow
//! upload never blocks another user's chat.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use uuid::Uuid;

use crate::pipeline::inference::InferenceClient;
use crate::pipeline::CardProcessor;
use crate::session::VaccinationSession;

/// Shared handle to one session.
pub type SessionHandle = Arc<Mutex<VaccinationSession>>;

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

pub struct CoreState {
    sessions: RwLock<HashMap<Uuid, SessionHandle>>,
    client: Arc<dyn InferenceClient>,
    processor: CardProcessor,
    /// Sessions idle at least this long are dropped.
    pub session_idle_timeout: Duration,
}

impl CoreState {
    pub fn new(client: Arc<dyn InferenceClient>, session_idle_timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            processor: CardProcessor::new(client.clone()),
            client,
            session_idle_timeout,
        }
    }

    pub fn client(&self) -> &dyn InferenceClient {
        self.client.as_ref()
    }

    pub fn processor(&self) -> &CardProcessor {
        &self.processor
    }

    // ── Session registry ────────────────────────────────────

    /// Start a new session. Idle sessions are purged first.
    pub fn create_session(&self) -> Result<(Uuid, SessionHandle), CoreError> {
        self.purge_idle()?;

        let session = VaccinationSession::new();
        let id = session.id();
        let handle = Arc::new(Mutex::new(session));
        self.write_sessions()?.insert(id, handle.clone());

        tracing::info!(session_id = %id, "Session created");
        Ok((id, handle))
    }

    /// Look up a live session. An expired session is dropped and
    /// reported as not found.
    pub fn session(&self, id: Uuid) -> Result<SessionHandle, CoreError> {
        let handle = self
            .read_sessions()?
            .get(&id)
            .cloned()
            .ok_or(CoreError::SessionNotFound(id))?;

        if self.is_expired(&handle) {
            self.write_sessions()?.remove(&id);
            tracing::info!(session_id = %id, "Session expired");
            return Err(CoreError::SessionNotFound(id));
        }
        Ok(handle)
    }

    /// Tear down a session.
    pub fn end_session(&self, id: Uuid) -> Result<(), CoreError> {
        self.write_sessions()?
            .remove(&id)
            .ok_or(CoreError::SessionNotFound(id))?;
        tracing::info!(session_id = %id, "Session ended");
        Ok(())
    }

    /// Drop every expired session. Returns how many were removed.
    pub fn purge_idle(&self) -> Result<usize, CoreError> {
        let mut sessions = self.write_sessions()?;
        let before = sessions.len();
        sessions.retain(|_, handle| !self.is_expired(handle));
        let purged = before - sessions.len();
        if purged > 0 {
            tracing::info!(purged, remaining = sessions.len(), "Purged idle sessions");
        }
        Ok(purged)
    }

    pub fn session_count(&self) -> Result<usize, CoreError> {
        Ok(self.read_sessions()?.len())
    }

    /// A session that is locked right now, or has an upload in flight,
    /// is in use and hence not idle.
    fn is_expired(&self, handle: &SessionHandle) -> bool {
        match handle.try_lock() {
            Ok(session) => {
                !session.is_busy() && session.idle_for() >= self.session_idle_timeout
            }
            Err(_) => false,
        }
    }

    fn read_sessions(
        &self,
    ) -> Result<RwLockReadGuard<'_, HashMap<Uuid, SessionHandle>>, CoreError> {
        self.sessions.read().map_err(|_| CoreError::LockPoisoned)
    }

    fn write_sessions(
        &self,
    ) -> Result<RwLockWriteGuard<'_, HashMap<Uuid, SessionHandle>>, CoreError> {
        self.sessions.write().map_err(|_| CoreError::LockPoisoned)
    }
}

// ═══════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════

/// Errors from CoreState operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),
    #[error("Internal lock error")]
    LockPoisoned,
}
