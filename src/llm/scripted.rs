//! Scripted provider
//!
//! Replays queued completions in order, then an optional fixed reply.
//! Every request is recorded so callers can inspect what was sent.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::core::{FunctionDefinition, Message, ProviderError};
use crate::llm::traits::{Completion, Provider};

/// A request as seen by the scripted provider
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub messages: Vec<Message>,
    pub functions: Vec<String>,
}

enum Scripted {
    Reply(Completion),
    Fail(ProviderError),
}

/// Provider that answers from a script instead of a backend
pub struct ScriptedProvider {
    name: String,
    queue: Mutex<VecDeque<Scripted>>,
    fallback: Option<String>,
    requests: Mutex<Vec<RecordedRequest>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedProvider {
    /// Create an empty script
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            queue: Mutex::new(VecDeque::new()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer every request with the same text
    pub fn repeating(name: impl Into<String>, reply: impl Into<String>) -> Self {
        Self::new(name).with_fallback(reply)
    }

    /// Text returned once the queue is exhausted
    pub fn with_fallback(mut self, reply: impl Into<String>) -> Self {
        self.fallback = Some(reply.into());
        self
    }

    /// Queue a text reply
    pub fn then_text(self, reply: impl Into<String>) -> Self {
        self.push(Scripted::Reply(Completion::text(reply)));
        self
    }

    /// Queue a function call
    pub fn then_call(self, name: impl Into<String>, arguments: serde_json::Value) -> Self {
        self.push(Scripted::Reply(Completion::function_call(name, arguments)));
        self
    }

    /// Queue a failure
    pub fn then_error(self, error: ProviderError) -> Self {
        self.push(Scripted::Fail(error));
        self
    }

    /// Queue a text reply on a shared provider
    pub fn push_text(&self, reply: impl Into<String>) {
        self.push(Scripted::Reply(Completion::text(reply)));
    }

    /// Queue a failure on a shared provider
    pub fn push_error(&self, error: ProviderError) {
        self.push(Scripted::Fail(error));
    }

    fn push(&self, item: Scripted) {
        lock(&self.queue).push_back(item);
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }

    /// Number of requests received so far
    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn complete(
        &self,
        messages: &[Message],
        functions: &[FunctionDefinition],
    ) -> Result<Completion, ProviderError> {
        lock(&self.requests).push(RecordedRequest {
            messages: messages.to_vec(),
            functions: functions.iter().map(|f| f.name.clone()).collect(),
        });

        let next = lock(&self.queue).pop_front();
        match next {
            Some(Scripted::Reply(completion)) => Ok(completion),
            Some(Scripted::Fail(error)) => Err(error),
            None => match &self.fallback {
                Some(reply) => Ok(Completion::text(reply.clone())),
                None => Err(ProviderError::Other(format!(
                    "script for \"{}\" is exhausted",
                    self.name
                ))),
            },
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        "scripted"
    }
}
