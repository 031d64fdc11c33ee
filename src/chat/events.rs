//! Event notifications
//!
//! Observers are owned by one scheduler and called synchronously at the
//! point the chat log changes. An observer that needs to do slow work should
//! hand it off (spawn, channel) instead of blocking the scheduler.

use std::sync::Arc;

use crate::core::{ChatEntry, ConveneError};

/// Receives scheduler notifications; every method defaults to a no-op
pub trait ChatObserver: Send + Sync {
    /// The seed message was logged and routing is about to begin
    fn on_start(&self, _seed: &ChatEntry) {}

    /// A successful message was logged
    fn on_message(&self, _entry: &ChatEntry) {}

    /// A turn failed and an error entry was logged
    fn on_error(&self, _error: &ConveneError, _entry: &ChatEntry) {}

    /// Routing stopped for operator input
    fn on_interrupt(&self, _entry: &ChatEntry) {}

    /// The conversation ended for `node`
    fn on_terminate(&self, _node: &str) {}
}

/// Fan-out of notifications to the registered observers
#[derive(Clone, Default)]
pub struct EventBus {
    observers: Vec<Arc<dyn ChatObserver>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, observer: Arc<dyn ChatObserver>) {
        self.observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub(crate) fn start(&self, seed: &ChatEntry) {
        self.observers.iter().for_each(|o| o.on_start(seed));
    }

    pub(crate) fn message(&self, entry: &ChatEntry) {
        self.observers.iter().for_each(|o| o.on_message(entry));
    }

    pub(crate) fn error(&self, error: &ConveneError, entry: &ChatEntry) {
        self.observers.iter().for_each(|o| o.on_error(error, entry));
    }

    pub(crate) fn interrupt(&self, entry: &ChatEntry) {
        self.observers.iter().for_each(|o| o.on_interrupt(entry));
    }

    pub(crate) fn terminate(&self, node: &str) {
        self.observers.iter().for_each(|o| o.on_terminate(node));
    }
}

/// Observer that records every notification, handy for tests and tooling
#[derive(Debug, Default)]
pub struct EventRecorder {
    events: std::sync::Mutex<Vec<RecordedEvent>>,
}

/// A notification captured by [`EventRecorder`]
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedEvent {
    Start(ChatEntry),
    Message(ChatEntry),
    Error { message: String, entry: ChatEntry },
    Interrupt(ChatEntry),
    Terminate(String),
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications received so far, in order
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<RecordedEvent>> {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl ChatObserver for EventRecorder {
    fn on_start(&self, seed: &ChatEntry) {
        self.lock().push(RecordedEvent::Start(seed.clone()));
    }

    fn on_message(&self, entry: &ChatEntry) {
        self.lock().push(RecordedEvent::Message(entry.clone()));
    }

    fn on_error(&self, error: &ConveneError, entry: &ChatEntry) {
        self.lock().push(RecordedEvent::Error {
            message: error.to_string(),
            entry: entry.clone(),
        });
    }

    fn on_interrupt(&self, entry: &ChatEntry) {
        self.lock().push(RecordedEvent::Interrupt(entry.clone()));
    }

    fn on_terminate(&self, node: &str) {
        self.lock().push(RecordedEvent::Terminate(node.to_string()));
    }
}
