//! Provider trait for abstracting completion backends
//!
//! Enables swapping between OpenAI, Anthropic, scripted replies, etc.

use async_trait::async_trait;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use crate::core::{FunctionCall, FunctionDefinition, Message, ProviderError};

/// What the backend produced for one request
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionOutput {
    /// Plain reply text
    Text(String),
    /// Request to invoke exactly one function
    FunctionCall(FunctionCall),
}

/// Response from a provider
#[derive(Debug, Clone)]
pub struct Completion {
    pub output: CompletionOutput,
    /// Estimated monetary cost, `NaN` when unknown
    pub cost: f64,
}

impl Completion {
    /// A plain text reply with unknown cost
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            output: CompletionOutput::Text(content.into()),
            cost: f64::NAN,
        }
    }

    /// A function call request with unknown cost
    pub fn function_call(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            output: CompletionOutput::FunctionCall(FunctionCall::new(name, arguments)),
            cost: f64::NAN,
        }
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }

    /// Reply text, if this is not a function call
    pub fn as_text(&self) -> Option<&str> {
        match &self.output {
            CompletionOutput::Text(text) => Some(text),
            CompletionOutput::FunctionCall(_) => None,
        }
    }
}

/// Token usage information
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// Trait for completion backends
///
/// When `functions` is non-empty the backend may answer with a single
/// function call instead of text. Failures are classified by
/// [`ProviderError::is_retryable`].
#[async_trait]
pub trait Provider: Send + Sync {
    /// Complete the conversation
    async fn complete(
        &self,
        messages: &[Message],
        functions: &[FunctionDefinition],
    ) -> Result<Completion, ProviderError>;

    /// Get the provider name
    fn name(&self) -> &str;

    /// Model used for completions
    fn model(&self) -> &str;
}

/// Shared handle to an already-built provider
#[derive(Clone)]
pub struct ProviderHandle(Arc<dyn Provider>);

impl ProviderHandle {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self(provider)
    }

    pub fn into_inner(self) -> Arc<dyn Provider> {
        self.0
    }
}

impl<P: Provider + 'static> From<Arc<P>> for ProviderHandle {
    fn from(provider: Arc<P>) -> Self {
        Self(provider)
    }
}

impl From<Arc<dyn Provider>> for ProviderHandle {
    fn from(provider: Arc<dyn Provider>) -> Self {
        Self(provider)
    }
}

impl Deref for ProviderHandle {
    type Target = dyn Provider;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl fmt::Debug for ProviderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ProviderHandle")
            .field(&format_args!("{}:{}", self.0.name(), self.0.model()))
            .finish()
    }
}
