//! OpenAI provider
//!
//! Chat-completions client using the `functions` / `function_call` payload.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::config::EndpointConfig;
use crate::core::{FunctionDefinition, Message, ProviderError, Result, Role};
use crate::llm::models::estimate_cost;
use crate::llm::traits::{Completion, Provider, TokenUsage};

use super::{complete_with_recovery, http_client, read_body, Parsed};

/// OpenAI API client
pub struct OpenAiProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    functions: Option<&'a [FunctionDefinition]>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: String,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    function_call: Option<WireFunctionCall>,
}

#[derive(Debug, Deserialize)]
struct WireFunctionCall {
    name: String,
    /// JSON text produced by the model, not guaranteed to parse
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

impl OpenAiProvider {
    pub fn new(endpoint: &EndpointConfig, model: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: http_client(endpoint)?,
            base_url: endpoint.base_url.trim_end_matches('/').to_string(),
            api_key: endpoint.api_key.clone(),
            model: model.into(),
        })
    }

    fn to_wire_message(msg: &Message) -> WireMessage<'_> {
        WireMessage {
            role: msg.role.to_string(),
            content: &msg.content,
            name: match msg.role {
                Role::Function => msg.name.as_deref(),
                _ => None,
            },
        }
    }

    async fn send(
        &self,
        messages: &[Message],
        functions: &[FunctionDefinition],
    ) -> std::result::Result<ChatResponse, ProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::Auth("OPENAI_API_KEY not set".to_string()))?;

        let request = ChatRequest {
            model: &self.model,
            messages: messages.iter().map(Self::to_wire_message).collect(),
            functions: (!functions.is_empty()).then_some(functions),
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let body = read_body(response).await?;
        serde_json::from_str(&body)
            .map_err(|e| ProviderError::Malformed(format!("Failed to parse response: {}", e)))
    }

    /// Function arguments are JSON text written by the model; when they do
    /// not parse, the parser error goes back as the function's result
    fn interpret(&self, response: ChatResponse) -> std::result::Result<Parsed, ProviderError> {
        let usage = response.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
        });
        let cost = estimate_cost(&self.model, usage);
        debug!(model = %self.model, cost, "openai completion");

        let message = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Malformed("response has no choices".to_string()))?
            .message;

        let Some(call) = message.function_call else {
            return Ok(Parsed::Done(
                Completion::text(message.content.unwrap_or_default()).with_cost(cost),
            ));
        };

        Ok(match serde_json::from_str(&call.arguments) {
            Ok(arguments) => {
                Parsed::Done(Completion::function_call(call.name, arguments).with_cost(cost))
            }
            Err(e) => Parsed::Unparseable {
                feedback: Message::function(&call.name, e.to_string()),
                error: format!("{}: {}", call.name, e),
            },
        })
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn complete(
        &self,
        messages: &[Message],
        functions: &[FunctionDefinition],
    ) -> std::result::Result<Completion, ProviderError> {
        complete_with_recovery(messages, move |conversation| async move {
            let response = self.send(&conversation, functions).await?;
            self.interpret(response)
        })
        .await
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }
}
