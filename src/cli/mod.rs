//! CLI module - terminal front end
//!
//! Renders the conversation and supervises interrupted or failed runs.

pub mod history;
pub mod supervisor;
pub mod terminal;

pub use history::HistoryFile;
pub use supervisor::{Feedback, FeedbackSource, StdinFeedback, Supervisor};
pub use terminal::TerminalObserver;
