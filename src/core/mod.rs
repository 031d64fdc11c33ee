//! Core module - shared infrastructure for Convene
//!
//! Configuration, error types and the chat vocabulary (routes, entries,
//! messages) used by every other module.

pub mod config;
pub mod error;
pub mod types;

pub use config::{
    AgentConfig, BackendConfig, ChannelConfig, Config, DefaultsConfig, EndpointConfig,
    ProviderType,
};
pub use error::{ConveneError, ProviderError, Result};
pub use types::*;
