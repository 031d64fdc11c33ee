//! Chat module - turn scheduling for multi-agent conversations
//!
//! The [`Scheduler`] routes messages between agents and channels, records
//! every attempt in a [`ChatLog`] and notifies [`ChatObserver`]s.

pub mod builder;
pub mod events;
pub mod log;
pub mod loop_state;
pub mod roster;
pub mod scheduler;
pub mod selector;

pub use builder::SchedulerBuilder;
pub use events::{ChatObserver, EventBus, EventRecorder, RecordedEvent};
pub use log::{ChatLog, HistoryFilter};
pub use loop_state::Outcome;
pub use roster::{NodeKind, Roster};
pub use scheduler::Scheduler;
pub use selector::{GroupSelector, Selection};
