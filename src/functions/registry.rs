//! Function registry - callable functions exposed to backends
//!
//! Maps a function name to its definition and the handler that runs it.

use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use crate::core::{FunctionDefinition, Result};

/// Runs a function with the arguments a backend supplied
#[async_trait]
pub trait FunctionHandler: Send + Sync {
    async fn call(&self, arguments: serde_json::Value) -> Result<String>;
}

/// Adapter turning an async closure into a [`FunctionHandler`]
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F, Fut> FunctionHandler for FnHandler<F>
where
    F: Fn(serde_json::Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<String>> + Send,
{
    async fn call(&self, arguments: serde_json::Value) -> Result<String> {
        (self.0)(arguments).await
    }
}

/// A registered function
#[derive(Clone)]
pub struct FunctionSpec {
    pub definition: FunctionDefinition,
    handler: Arc<dyn FunctionHandler>,
}

impl FunctionSpec {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
        handler: impl FunctionHandler + 'static,
    ) -> Self {
        Self {
            definition: FunctionDefinition::new(name, description, parameters),
            handler: Arc::new(handler),
        }
    }

    /// Register an async closure as the handler
    pub fn from_fn<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
        handler: F,
    ) -> Self
    where
        F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String>> + Send + 'static,
    {
        Self::new(name, description, parameters, FnHandler(handler))
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// Invoke the handler
    pub async fn call(&self, arguments: serde_json::Value) -> Result<String> {
        self.handler.call(arguments).await
    }
}

impl std::fmt::Debug for FunctionSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionSpec")
            .field("definition", &self.definition)
            .finish_non_exhaustive()
    }
}

/// Registry of callable functions
#[derive(Debug, Default, Clone)]
pub struct FunctionRegistry {
    functions: HashMap<String, FunctionSpec>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function, replacing any previous one with the same name
    pub fn register(&mut self, spec: FunctionSpec) {
        self.functions.insert(spec.name().to_string(), spec);
    }

    pub fn get(&self, name: &str) -> Option<&FunctionSpec> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Look up a function only if the caller is allowed to use it
    pub fn get_allowed(&self, name: &str, allowed: &[String]) -> Option<&FunctionSpec> {
        if !allowed.iter().any(|a| a == name) {
            return None;
        }
        self.get(name)
    }

    /// Definitions of the allowed functions, in the caller's order
    pub fn definitions_for(&self, allowed: &[String]) -> Vec<FunctionDefinition> {
        allowed
            .iter()
            .filter_map(|name| self.get(name))
            .map(|spec| spec.definition.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}
