//! Convene - turn scheduling for multi-agent LLM conversations
//!
//! Agents talk to each other or inside channels, where a selector picks the
//! next member to speak. Each agent produces its messages through a pluggable
//! completion backend and may call registered functions mid-turn.
//!
//! # Architecture
//!
//! - **Core**: Shared types, configuration, and error handling
//! - **LLM**: Provider abstraction with OpenAI, Anthropic and scripted backends
//! - **Functions**: Function registry and the mid-turn call loop
//! - **Chat**: Chat log, roster, group selection and the scheduler
//! - **CLI**: Terminal rendering and the run supervisor
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use convene::{AgentConfig, Route, Scheduler, ScriptedProvider};
//!
//! #[tokio::main]
//! async fn main() -> convene::Result<()> {
//!     let mut scheduler = Scheduler::builder()
//!         .agent("client", AgentConfig::new("You ask questions."))
//!         .agent("expert", AgentConfig::new("You answer them."))
//!         .default_instance(Arc::new(ScriptedProvider::repeating("demo", "TERMINATE")))
//!         .build()?;
//!
//!     let outcome = scheduler
//!         .start(Route::new("client", "expert"), "What is a monad?")
//!         .await?;
//!     println!("{:?}", outcome);
//!     Ok(())
//! }
//! ```

pub mod chat;
pub mod cli;
pub mod core;
pub mod functions;
pub mod llm;

// Re-export commonly used items
pub use chat::{ChatLog, ChatObserver, HistoryFilter, Outcome, Scheduler, SchedulerBuilder};
pub use core::{
    AgentConfig, ChannelConfig, ChatEntry, ChatState, Config, ConveneError, InterruptPolicy,
    ProviderError, ProviderType, Result, Route,
};
pub use functions::{FunctionRegistry, FunctionSpec};
pub use llm::{Provider, ProviderHandle, ScriptedProvider};
