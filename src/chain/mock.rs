//! Scripted chat model for tests and offline demos.
//!
//! Replies are served in order from a queue; once the queue is empty the
//! default reply is returned. Every call records the messages and options it
//! received so callers can assert on the prompts an agent produced.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::chain::provider::{AskOptions, AskResponse, ChatMessage, ChatModel, ProviderError};

/// One recorded call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub messages: Vec<ChatMessage>,
    pub options: AskOptions,
}

#[derive(Debug, Default)]
pub struct MockChatModel {
    replies: Mutex<VecDeque<String>>,
    default_reply: Option<String>,
    calls: Mutex<Vec<RecordedCall>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockChatModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// A model that answers every call with `reply`.
    pub fn always(reply: impl Into<String>) -> Self {
        Self {
            default_reply: Some(reply.into()),
            ..Self::default()
        }
    }

    /// Queues a reply for the next unanswered call.
    #[must_use]
    pub fn with_reply(self, reply: impl Into<String>) -> Self {
        lock(&self.replies).push_back(reply.into());
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }
}

#[async_trait]
impl ChatModel for MockChatModel {
    fn name(&self) -> &str {
        "mock"
    }

    async fn ask(
        &self,
        messages: &[ChatMessage],
        options: &AskOptions,
    ) -> Result<AskResponse, ProviderError> {
        lock(&self.calls).push(RecordedCall {
            messages: messages.to_vec(),
            options: *options,
        });

        let reply = lock(&self.replies)
            .pop_front()
            .or_else(|| self.default_reply.clone())
            .ok_or_else(|| ProviderError::Other("mock model has no reply queued".to_string()))?;
        Ok(AskResponse::text(reply))
    }
}
