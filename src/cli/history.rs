//! History file
//!
//! Keeps a JSON copy of the chat log on disk, rewritten every time an entry
//! is logged, so a run that dies mid-conversation still leaves its history
//! behind.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::warn;

use crate::chat::{ChatLog, ChatObserver};
use crate::core::{ChatEntry, ConveneError, Result};

/// Observer that mirrors the chat log into a file
///
/// Observers only see appended entries. `retry` and `resume` also drop the
/// last entry, so whoever drives those calls should [`sync`](Self::sync)
/// the mirror with the real log afterwards.
#[derive(Debug)]
pub struct HistoryFile {
    path: PathBuf,
    entries: Mutex<Vec<ChatEntry>>,
}

impl HistoryFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Start the mirror from an existing log without writing it
    pub fn with_entries(self, entries: &[ChatEntry]) -> Self {
        *self.lock() = entries.to_vec();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the mirror with `log` and write it out
    pub fn sync(&self, log: &ChatLog) -> Result<()> {
        let mut entries = self.lock();
        *entries = log.entries().to_vec();
        self.write(&entries)
    }

    fn record(&self, entry: &ChatEntry) {
        let mut entries = self.lock();
        entries.push(entry.clone());
        if let Err(e) = self.write(&entries) {
            warn!(path = %self.path.display(), "failed to save history: {}", e);
        }
    }

    fn write(&self, entries: &[ChatEntry]) -> Result<()> {
        fs::write(&self.path, serde_json::to_string_pretty(entries)?)?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ChatEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ChatObserver for HistoryFile {
    fn on_message(&self, entry: &ChatEntry) {
        self.record(entry);
    }

    fn on_error(&self, _error: &ConveneError, entry: &ChatEntry) {
        self.record(entry);
    }

    fn on_interrupt(&self, entry: &ChatEntry) {
        self.record(entry);
    }
}
