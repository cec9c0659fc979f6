use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use super::{InferenceClient, InferenceError, InferenceRequest, ResponseFormat};

/// Scripted reply for `MockInferenceClient`.
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    Fail(InferenceError),
}

impl MockReply {
    pub fn text(text: &str) -> Self {
        Self::Text(text.to_string())
    }

    pub fn transport_error() -> Self {
        Self::Fail(InferenceError::Transport("connection refused".into()))
    }
}

/// What the mock saw for one `generate` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub prompt: String,
    pub had_image: bool,
    pub format: ResponseFormat,
}

/// Mock inference client for testing.
///
/// Replies are served from a queue in call order; once the queue is empty
/// the fallback reply (if any) is repeated, otherwise the call fails.
pub struct MockInferenceClient {
    replies: Mutex<VecDeque<MockReply>>,
    fallback: Option<MockReply>,
    calls: Mutex<Vec<RecordedCall>>,
    latency: Duration,
}

impl MockInferenceClient {
    /// Answers every call with the same text.
    pub fn new(response: &str) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: Some(MockReply::text(response)),
            calls: Mutex::new(Vec::new()),
            latency: Duration::ZERO,
        }
    }

    /// Serves `replies` in order, then fails.
    pub fn scripted(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            fallback: None,
            calls: Mutex::new(Vec::new()),
            latency: Duration::ZERO,
        }
    }

    /// Fails every call with `error`.
    pub fn failing(error: InferenceError) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: Some(MockReply::Fail(error)),
            calls: Mutex::new(Vec::new()),
            latency: Duration::ZERO,
        }
    }

    /// Sleep this long inside every call, like a slow remote model.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl InferenceClient for MockInferenceClient {
    fn generate(&self, request: &InferenceRequest<'_>) -> Result<String, InferenceError> {
        lock(&self.calls).push(RecordedCall {
            prompt: request.prompt.to_string(),
            had_image: request.image.is_some(),
            format: request.format,
        });
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }

        let reply = lock(&self.replies)
            .pop_front()
            .or_else(|| self.fallback.clone())
            .ok_or_else(|| InferenceError::EmptyResponse("mock script exhausted".into()))?;

        match reply {
            MockReply::Text(text) => Ok(text),
            MockReply::Fail(err) => Err(err),
        }
    }

    fn model(&self) -> &str {
        "mock-model"
    }
}
