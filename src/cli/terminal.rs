//! Terminal rendering of conversation events

use crate::chat::ChatObserver;
use crate::core::{ChatEntry, ConveneError};

/// Prints the conversation as it happens
#[derive(Debug, Default)]
pub struct TerminalObserver {
    /// Also print interrupts and the seed banner
    verbose: bool,
}

impl TerminalObserver {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ChatObserver for TerminalObserver {
    fn on_start(&self, seed: &ChatEntry) {
        if self.verbose {
            println!("🚀 {} started the conversation with {}\n", seed.from, seed.to);
        }
    }

    fn on_message(&self, entry: &ChatEntry) {
        println!("{}", format_message(entry));
    }

    fn on_error(&self, error: &ConveneError, entry: &ChatEntry) {
        eprintln!("❌ {} -> {} failed: {}", entry.from, entry.to, error);
        if error.is_retryable() {
            eprintln!("   The backend may recover, the turn will be retried.");
        }
    }

    fn on_interrupt(&self, entry: &ChatEntry) {
        if self.verbose {
            println!("⏸  waiting for {} before replying to {}", entry.from, entry.to);
        }
    }

    fn on_terminate(&self, node: &str) {
        println!("🏁 Conversation with {} ended.", node);
    }
}

/// One message block, sender first
pub fn format_message(entry: &ChatEntry) -> String {
    format!("{} ➜ {}\n{}\n", entry.from, entry.to, entry.content.trim())
}
