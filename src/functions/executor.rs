//! Function executor
//!
//! Keeps calling the provider while it asks for function calls, feeding each
//! result back as a function-role turn, until it produces plain text.

use tracing::{debug, warn};

use crate::core::{ConveneError, Message, Result};
use crate::functions::registry::FunctionRegistry;
use crate::llm::{CompletionOutput, Provider};

/// Result of one logical turn
#[derive(Debug, Clone)]
pub struct Execution {
    /// Final reply text
    pub text: String,
    /// Sum of the known costs of every round trip
    pub cost: f64,
    /// Function calls resolved along the way
    pub function_calls: usize,
}

/// Resolves function calls for one speaker
pub struct FunctionExecutor<'a> {
    registry: &'a FunctionRegistry,
    allowed: &'a [String],
    max_iterations: usize,
}

impl<'a> FunctionExecutor<'a> {
    pub fn new(registry: &'a FunctionRegistry, allowed: &'a [String], max_iterations: usize) -> Self {
        Self {
            registry,
            allowed,
            max_iterations,
        }
    }

    /// Run the turn to completion
    ///
    /// Unknown functions and failing handlers are reported back to the
    /// provider as function turns. More than `max_iterations` calls in a
    /// row fail with [`ConveneError::FunctionLimit`].
    pub async fn run(&self, provider: &dyn Provider, mut messages: Vec<Message>) -> Result<Execution> {
        let definitions = self.registry.definitions_for(self.allowed);
        let mut cost = 0.0;
        let mut function_calls = 0;

        loop {
            let completion = provider.complete(&messages, &definitions).await?;
            if completion.cost.is_finite() {
                cost += completion.cost;
            }

            let call = match completion.output {
                CompletionOutput::Text(text) => {
                    return Ok(Execution {
                        text,
                        cost,
                        function_calls,
                    })
                }
                CompletionOutput::FunctionCall(call) => call,
            };

            if function_calls >= self.max_iterations {
                return Err(ConveneError::FunctionLimit(self.max_iterations));
            }
            function_calls += 1;

            let result = match self.registry.get_allowed(&call.name, self.allowed) {
                None => {
                    warn!(function = %call.name, "backend requested an unknown function");
                    format!("Function \"{}\" not found. Try again.", call.name)
                }
                Some(spec) => {
                    debug!(function = %call.name, "calling function");
                    match spec.call(call.arguments).await {
                        Ok(output) => output,
                        Err(e) => {
                            warn!(function = %call.name, "function failed: {}", e);
                            format!("Function \"{}\" failed: {}. Try again.", call.name, e)
                        }
                    }
                }
            };

            messages.push(Message::function(call.name, result));
        }
    }
}
