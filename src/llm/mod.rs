//! LLM module - completion backend integrations
//!
//! Provides the provider abstraction, pricing, and the hosted backends.

pub mod models;
pub mod provider;
pub mod scripted;
pub mod traits;

pub use models::{estimate_cost, ModelPricing};
pub use provider::create_provider;
pub use scripted::ScriptedProvider;
pub use traits::{Completion, CompletionOutput, Provider, ProviderHandle, TokenUsage};
