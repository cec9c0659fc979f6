//! Per-user session: transcript, card state machine, upload marker.
//!
//! Replaces process-wide state with one explicit object per user. The
//! card lifecycle is `Empty -> Processing -> Ready | Failed`. Every
//! accepted upload discards the current card and restarts the cycle.

use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::models::{CardStatus, ChatMessage, VaccinationRecord};
use crate::pipeline::extraction::accepted_media_type;
use crate::pipeline::inference::InferenceClient;
use crate::pipeline::{answer, CardError, CardProcessor, ChatError, ChatReply};

/// Where the session's card is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CardState {
    #[default]
    Empty,
    Processing,
    Ready(VaccinationRecord),
    Failed(String),
}

impl CardState {
    pub fn status(&self) -> CardStatus {
        match self {
            Self::Empty => CardStatus::Empty,
            Self::Processing => CardStatus::Processing,
            Self::Ready(_) => CardStatus::Ready,
            Self::Failed(_) => CardStatus::Failed,
        }
    }
}

/// Proof that an upload was accepted. Results are applied only if no
/// newer upload has been accepted since.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTicket {
    generation: u64,
    file_name: String,
}

impl UploadTicket {
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Run the pipeline for this upload. Needs no access to the session,
    /// so callers can release the session lock while it runs.
    pub fn process(
        self,
        processor: &CardProcessor,
        declared_media_type: &str,
        image_bytes: &[u8],
    ) -> FinishedUpload {
        let result = processor
            .process(declared_media_type, image_bytes)
            .map(|card| card.record);
        FinishedUpload {
            ticket: self,
            result,
        }
    }
}

/// Pipeline output for one accepted upload, waiting to be stored with
/// `VaccinationSession::finish_upload`.
#[derive(Debug)]
pub struct FinishedUpload {
    ticket: UploadTicket,
    result: Result<VaccinationRecord, CardError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadDecision {
    /// Same file as the marker and already Ready. Nothing to do.
    AlreadyProcessed,
    /// Run the pipeline, then hand the ticket back to `complete_upload`.
    Process(UploadTicket),
}

pub struct VaccinationSession {
    id: Uuid,
    created_at: DateTime<Utc>,
    state: CardState,
    upload_marker: Option<String>,
    transcript: Vec<ChatMessage>,
    generation: u64,
    last_activity: Instant,
}

impl Default for VaccinationSession {
    fn default() -> Self {
        Self::new()
    }
}

impl VaccinationSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            state: CardState::Empty,
            upload_marker: None,
            transcript: Vec::new(),
            generation: 0,
            last_activity: Instant::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn state(&self) -> &CardState {
        &self.state
    }

    pub fn status(&self) -> CardStatus {
        self.state.status()
    }

    /// File name of the most recently accepted upload.
    pub fn upload_marker(&self) -> Option<&str> {
        self.upload_marker.as_deref()
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    /// The stored record, present only when Ready.
    pub fn record(&self) -> Option<&VaccinationRecord> {
        match &self.state {
            CardState::Ready(record) => Some(record),
            _ => None,
        }
    }

    pub fn is_processed(&self) -> bool {
        matches!(self.state, CardState::Ready(_))
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match &self.state {
            CardState::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    /// An upload is in flight. Such a session is never idle.
    pub fn is_busy(&self) -> bool {
        matches!(self.state, CardState::Processing)
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }

    // ── Upload lifecycle ────────────────────────────────────

    /// Accept or skip an upload of `file_name`.
    ///
    /// Reprocessing happens iff the name differs from the marker or the
    /// marker's card is not Ready. An accepted upload drops the previous
    /// record, moves to Processing and supersedes any upload still in
    /// flight.
    pub fn begin_upload(&mut self, file_name: &str) -> UploadDecision {
        self.touch();
        if self.is_processed() && self.upload_marker.as_deref() == Some(file_name) {
            return UploadDecision::AlreadyProcessed;
        }

        self.generation += 1;
        self.upload_marker = Some(file_name.to_string());
        self.state = CardState::Processing;

        tracing::debug!(session_id = %self.id, generation = self.generation, "Upload accepted");
        UploadDecision::Process(UploadTicket {
            generation: self.generation,
            file_name: file_name.to_string(),
        })
    }

    /// Validate the declared media type, then `begin_upload`.
    ///
    /// An unsupported type is rejected with no state change.
    pub fn prepare_upload(
        &mut self,
        file_name: &str,
        declared_media_type: &str,
    ) -> Result<UploadDecision, CardError> {
        accepted_media_type(declared_media_type)?;
        Ok(self.begin_upload(file_name))
    }

    /// Store the pipeline result for `ticket`.
    ///
    /// Returns `false` (and changes nothing) if a newer upload was
    /// accepted in the meantime.
    pub fn complete_upload(
        &mut self,
        ticket: UploadTicket,
        result: Result<VaccinationRecord, CardError>,
    ) -> bool {
        if ticket.generation != self.generation {
            tracing::info!(
                session_id = %self.id,
                stale = ticket.generation,
                current = self.generation,
                "Discarding superseded upload result"
            );
            return false;
        }

        self.touch();
        self.state = match result {
            Ok(record) => CardState::Ready(record),
            Err(e) => CardState::Failed(e.to_string()),
        };
        true
    }

    /// Store a finished upload.
    ///
    /// `Ok(true)` means the record is stored and the card is Ready.
    /// `Ok(false)` means a newer upload superseded this one. A stored
    /// failure is returned as the error.
    pub fn finish_upload(&mut self, finished: FinishedUpload) -> Result<bool, CardError> {
        let outcome = finished.result.as_ref().map(|_| true).map_err(Clone::clone);
        if !self.complete_upload(finished.ticket, finished.result) {
            return Ok(false);
        }
        outcome
    }

    /// Run a whole upload synchronously.
    ///
    /// Returns `Ok(false)` when the file was already processed.
    pub fn handle_upload(
        &mut self,
        file_name: &str,
        declared_media_type: &str,
        image_bytes: &[u8],
        processor: &CardProcessor,
    ) -> Result<bool, CardError> {
        let ticket = match self.prepare_upload(file_name, declared_media_type)? {
            UploadDecision::AlreadyProcessed => return Ok(false),
            UploadDecision::Process(ticket) => ticket,
        };
        self.finish_upload(ticket.process(processor, declared_media_type, image_bytes))
    }

    // ── Chat ────────────────────────────────────────────────

    /// One chat turn. The question is appended before the call; an
    /// answer is appended after it. Notices are not recorded.
    pub fn ask(
        &mut self,
        question: &str,
        client: &dyn InferenceClient,
        today: NaiveDate,
    ) -> Result<ChatReply, ChatError> {
        self.touch();
        self.transcript.push(ChatMessage::user(question));

        let reply = answer(client, question, self.record(), today)?;
        if let ChatReply::Answer(text) = &reply {
            self.transcript.push(ChatMessage::assistant(text.clone()));
        }
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::models::MessageRole;
    use crate::pipeline::extraction::tests::{png_bytes, CARD_JSON};
    use crate::pipeline::inference::{InferenceError, MockInferenceClient, MockReply};
    use crate::pipeline::NO_RECORD_NOTICE;

    const PRECAUTIONS: &str = r#"{"precautions": ["Rest", "Hydrate"]}"#;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn card_client() -> Arc<MockInferenceClient> {
        Arc::new(MockInferenceClient::scripted(vec![
            MockReply::text(CARD_JSON),
            MockReply::text(PRECAUTIONS),
        ]))
    }

    fn ready_session() -> VaccinationSession {
        let mut session = VaccinationSession::new();
        let processor = CardProcessor::new(card_client());
        assert!(session
            .handle_upload("card.png", "image/png", &png_bytes(), &processor)
            .unwrap());
        session
    }

    #[test]
    fn new_session_is_empty() {
        let session = VaccinationSession::new();
        assert_eq!(session.status(), CardStatus::Empty);
        assert!(!session.is_processed());
        assert!(session.record().is_none());
        assert!(session.upload_marker().is_none());
        assert!(session.transcript().is_empty());
    }

    #[test]
    fn successful_upload_is_ready() {
        let session = ready_session();
        assert!(session.is_processed());
        assert_eq!(session.upload_marker(), Some("card.png"));
        let record = session.record().unwrap();
        assert_eq!(record.patient_info.patient_id.as_deref(), Some("X1"));
        assert_eq!(
            record.due_vaccines[0].precautions.as_deref().unwrap(),
            ["Rest", "Hydrate"]
        );
    }

    #[test]
    fn transport_error_leaves_session_unprocessed() {
        let mut session = VaccinationSession::new();
        let mock = Arc::new(MockInferenceClient::failing(InferenceError::Transport(
            "down".into(),
        )));
        let processor = CardProcessor::new(mock);

        let err = session
            .handle_upload("card.png", "image/png", &png_bytes(), &processor)
            .unwrap_err();
        assert!(matches!(err, CardError::ExtractionFailed(_)));
        assert!(!session.is_processed());
        assert!(session.record().is_none());
        assert_eq!(session.status(), CardStatus::Failed);
        assert!(session.failure_reason().is_some());
    }

    #[test]
    fn unsupported_format_changes_nothing() {
        let mut session = ready_session();
        let mock = Arc::new(MockInferenceClient::new(CARD_JSON));
        let processor = CardProcessor::new(mock.clone());

        let err = session
            .handle_upload("card.gif", "image/gif", b"GIF89a", &processor)
            .unwrap_err();
        assert!(matches!(err, CardError::UnsupportedFormat(_)));
        assert!(session.is_processed());
        assert_eq!(session.upload_marker(), Some("card.png"));
        assert_eq!(mock.call_count(), 0);
    }

    #[test]
    fn same_file_after_ready_is_not_reprocessed() {
        let mut session = ready_session();
        let mock = Arc::new(MockInferenceClient::new(CARD_JSON));
        let processor = CardProcessor::new(mock.clone());

        let processed = session
            .handle_upload("card.png", "image/png", &png_bytes(), &processor)
            .unwrap();
        assert!(!processed);
        assert_eq!(mock.call_count(), 0);
        assert!(session.is_processed());
    }

    #[test]
    fn same_file_after_failure_is_reprocessed() {
        let mut session = VaccinationSession::new();
        let failing = CardProcessor::new(Arc::new(MockInferenceClient::scripted(vec![
            MockReply::transport_error(),
        ])));
        assert!(session
            .handle_upload("card.png", "image/png", &png_bytes(), &failing)
            .is_err());

        let working = CardProcessor::new(card_client());
        assert!(session
            .handle_upload("card.png", "image/png", &png_bytes(), &working)
            .unwrap());
        assert!(session.is_processed());
    }

    #[test]
    fn new_file_resets_to_processing() {
        let mut session = ready_session();
        let decision = session.begin_upload("other.jpg");
        assert!(matches!(decision, UploadDecision::Process(_)));
        assert_eq!(session.status(), CardStatus::Processing);
        assert!(session.record().is_none());
        assert_eq!(session.upload_marker(), Some("other.jpg"));
    }

    #[test]
    fn superseded_result_is_discarded() {
        let mut session = VaccinationSession::new();
        let UploadDecision::Process(first) = session.begin_upload("a.png") else {
            panic!("expected Process");
        };
        let UploadDecision::Process(second) = session.begin_upload("b.png") else {
            panic!("expected Process");
        };

        let applied = session.complete_upload(first, Ok(VaccinationRecord::default()));
        assert!(!applied);
        assert_eq!(session.status(), CardStatus::Processing);

        assert!(session.complete_upload(second, Err(CardError::ExtractionFailed("x".into()))));
        assert_eq!(session.status(), CardStatus::Failed);
        assert_eq!(session.upload_marker(), Some("b.png"));
    }

    #[test]
    fn processing_session_is_busy_until_finished() {
        let mut session = VaccinationSession::new();
        assert!(!session.is_busy());

        let UploadDecision::Process(ticket) = session.begin_upload("card.png") else {
            panic!("expected Process");
        };
        assert!(session.is_busy());

        let finished = ticket.process(&CardProcessor::new(card_client()), "image/png", &png_bytes());
        assert!(session.finish_upload(finished).unwrap());
        assert!(!session.is_busy());
        assert!(session.is_processed());
    }

    #[test]
    fn finished_upload_after_supersede_is_dropped() {
        let mut session = VaccinationSession::new();
        let UploadDecision::Process(first) = session.begin_upload("a.png") else {
            panic!("expected Process");
        };
        let finished = first.process(&CardProcessor::new(card_client()), "image/png", &png_bytes());
        session.begin_upload("b.png");

        assert!(!session.finish_upload(finished).unwrap());
        assert_eq!(session.status(), CardStatus::Processing);
        assert_eq!(session.upload_marker(), Some("b.png"));
    }

    #[test]
    fn ask_without_record_returns_notice_and_makes_no_call() {
        let mut session = VaccinationSession::new();
        let mock = MockInferenceClient::new("unused");

        let reply = session.ask("When is my next shot?", &mock, today()).unwrap();
        assert_eq!(reply, ChatReply::Notice(NO_RECORD_NOTICE.into()));
        assert_eq!(mock.call_count(), 0);
        assert_eq!(session.transcript().len(), 1);
        assert_eq!(session.transcript()[0].role, MessageRole::User);
    }

    #[test]
    fn ask_appends_user_then_assistant() {
        let mut session = ready_session();
        let mock = MockInferenceClient::new("Tdap is due on 2025-01-01.");

        let reply = session.ask("What is due?", &mock, today()).unwrap();
        assert_eq!(reply.content(), "Tdap is due on 2025-01-01.");

        let transcript = session.transcript();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0], ChatMessage::user("What is due?"));
        assert_eq!(transcript[1], ChatMessage::assistant("Tdap is due on 2025-01-01."));
    }

    #[test]
    fn failed_answer_keeps_question_only() {
        let mut session = ready_session();
        let mock = MockInferenceClient::failing(InferenceError::Timeout(120));

        assert!(session.ask("What is due?", &mock, today()).is_err());
        assert_eq!(session.transcript(), &[ChatMessage::user("What is due?")]);
    }

    #[test]
    fn transcript_survives_new_upload() {
        let mut session = ready_session();
        let mock = MockInferenceClient::new("answer");
        session.ask("q1", &mock, today()).unwrap();
        session.begin_upload("second.png");
        assert_eq!(session.transcript().len(), 2);
    }
}
