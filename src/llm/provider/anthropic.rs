//! Anthropic provider
//!
//! Messages API client. The API has no function-calling payload of the
//! shape we need, so available functions are described in the system prompt
//! and the model is asked to answer with a JSON call object.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::config::EndpointConfig;
use crate::core::{FunctionDefinition, Message, ProviderError, Result, Role};
use crate::llm::models::estimate_cost;
use crate::llm::traits::{Completion, Provider, TokenUsage};

use super::{complete_with_recovery, http_client, read_body, Parsed};

const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 3000;

/// Anthropic API client
pub struct AnthropicProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<WireMessage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

/// Call object the model is instructed to reply with
#[derive(Debug, Deserialize)]
struct PromptedCall {
    function_name: String,
    #[serde(default)]
    parameters: serde_json::Value,
}

impl AnthropicProvider {
    pub fn new(endpoint: &EndpointConfig, model: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: http_client(endpoint)?,
            base_url: endpoint.base_url.trim_end_matches('/').to_string(),
            api_key: endpoint.api_key.clone(),
            model: model.into(),
        })
    }

    /// Instruction listing the callable functions
    fn function_prompt(functions: &[FunctionDefinition]) -> String {
        let listing = serde_json::to_string_pretty(functions).unwrap_or_default();
        format!(
            "<functions>You may call one of the functions below by replying with JSON \
             that matches its parameter schema. The function returns text you can use \
             to keep chatting.\n\n\
             Available functions:\n{}\n\n\
             When calling a function, reply with exactly this JSON and nothing else:\n\
             {{\"function_name\": \"<name>\", \"parameters\": {{}}}}\n</functions>",
            listing
        )
    }

    /// Fold the neutral conversation into a system prompt and alternating turns
    fn to_wire(
        messages: &[Message],
        functions: &[FunctionDefinition],
    ) -> (Option<String>, Vec<WireMessage>) {
        let mut system: Vec<String> = messages
            .iter()
            .filter(|m| m.role == Role::System && !m.content.trim().is_empty())
            .map(|m| m.content.clone())
            .collect();
        if !functions.is_empty() {
            system.push(Self::function_prompt(functions));
        }

        let mut turns: Vec<WireMessage> = Vec::new();
        for msg in messages.iter().filter(|m| m.role != Role::System) {
            let role = match msg.role {
                Role::Assistant => "assistant",
                _ => "user",
            };
            match turns.last_mut() {
                Some(last) if last.role == role => {
                    last.content.push_str("\n\n");
                    last.content.push_str(&msg.content);
                }
                _ => turns.push(WireMessage {
                    role,
                    content: msg.content.clone(),
                }),
            }
        }

        // The API requires the first turn to come from the user
        if turns.first().is_none_or(|t| t.role != "user") {
            turns.insert(
                0,
                WireMessage {
                    role: "user",
                    content: "Continue the conversation.".to_string(),
                },
            );
        }

        let system = (!system.is_empty()).then(|| system.join("\n\n"));
        (system, turns)
    }

    /// Parse the JSON call object out of a reply
    fn parse_call(text: &str) -> std::result::Result<PromptedCall, String> {
        let start = text.find('{').ok_or("no JSON object found")?;
        let end = text.rfind('}').ok_or("no JSON object found")?;
        if end < start {
            return Err("no JSON object found".to_string());
        }
        serde_json::from_str(&text[start..=end]).map_err(|e| e.to_string())
    }

    async fn send(
        &self,
        messages: &[Message],
        functions: &[FunctionDefinition],
    ) -> std::result::Result<MessagesResponse, ProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::Auth("ANTHROPIC_API_KEY not set".to_string()))?;

        let (system, turns) = Self::to_wire(messages, functions);
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            system,
            messages: turns,
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await?;

        let body = read_body(response).await?;
        serde_json::from_str(&body)
            .map_err(|e| ProviderError::Malformed(format!("Failed to parse response: {}", e)))
    }

    fn interpret(&self, response: MessagesResponse, functions: &[FunctionDefinition]) -> Parsed {
        let usage = response.usage.map(|u| TokenUsage {
            prompt_tokens: u.input_tokens,
            completion_tokens: u.output_tokens,
        });
        let cost = estimate_cost(&self.model, usage);
        debug!(model = %self.model, cost, "anthropic completion");

        let text: String = response
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("")
            .trim()
            .to_string();

        if functions.is_empty() || !text.contains("function_name") {
            return Parsed::Done(Completion::text(text).with_cost(cost));
        }

        match Self::parse_call(&text) {
            Ok(call) => Parsed::Done(
                Completion::function_call(call.function_name, call.parameters).with_cost(cost),
            ),
            Err(e) => Parsed::Unparseable {
                feedback: Message::function(
                    "function_call",
                    format!(
                        "You gave me this function call: {} but I couldn't parse it.\n{}\n\nPlease try again.",
                        text, e
                    ),
                ),
                error: e,
            },
        }
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    async fn complete(
        &self,
        messages: &[Message],
        functions: &[FunctionDefinition],
    ) -> std::result::Result<Completion, ProviderError> {
        complete_with_recovery(messages, move |conversation| async move {
            let response = self.send(&conversation, functions).await?;
            Ok(self.interpret(response, functions))
        })
        .await
    }

    fn name(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Config;
    use crate::llm::traits::CompletionOutput;
    use serde_json::json;

    fn reply(text: &str) -> MessagesResponse {
        serde_json::from_value(json!({ "content": [{ "type": "text", "text": text }] })).unwrap()
    }

    fn search() -> Vec<FunctionDefinition> {
        vec![FunctionDefinition::new(
            "search",
            "Search the web",
            json!({"type": "object"}),
        )]
    }

    #[test]
    fn test_to_wire_merges_roles() {
        let messages = vec![
            Message::system("Be brief."),
            Message::user("What is 2 + 2?"),
            Message::function("calculator", "4"),
            Message::assistant("4"),
        ];
        let (system, turns) = AnthropicProvider::to_wire(&messages, &[]);

        assert_eq!(system.as_deref(), Some("Be brief."));
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, "user");
        assert_eq!(turns[0].content, "What is 2 + 2?\n\n4");
        assert_eq!(turns[1].role, "assistant");
    }

    #[test]
    fn test_to_wire_starts_with_user() {
        let messages = vec![Message::system("x"), Message::assistant("hello")];
        let (_, turns) = AnthropicProvider::to_wire(&messages, &[]);
        assert_eq!(turns[0].role, "user");
        assert_eq!(turns[1].role, "assistant");
    }

    #[test]
    fn test_function_prompt_in_system() {
        let (system, _) = AnthropicProvider::to_wire(&[Message::user("hi")], &search());
        let system = system.unwrap();
        assert!(system.contains("<functions>"));
        assert!(system.contains("\"search\""));
    }

    #[test]
    fn test_parse_call() {
        let call = AnthropicProvider::parse_call(
            r#"Sure: {"function_name": "search", "parameters": {"query": "rust"}}"#,
        )
        .unwrap();
        assert_eq!(call.function_name, "search");
        assert_eq!(call.parameters["query"], "rust");

        assert!(AnthropicProvider::parse_call("function_name: search").is_err());
    }

    #[tokio::test]
    async fn test_unparseable_call_is_retried() {
        let provider = AnthropicProvider::new(&Config::default().anthropic, "claude-2").unwrap();
        let functions = search();
        let mut replies = vec![
            reply(r#"{"function_name": "search", "parameters": {"query": }"#),
            reply(r#"{"function_name": "search", "parameters": {"query": "rust"}}"#),
        ]
        .into_iter();
        let mut requests = Vec::new();

        let completion = complete_with_recovery(&[Message::user("look it up")], |conversation| {
            requests.push(conversation);
            let response = replies.next();
            let (provider, functions) = (&provider, &functions);
            async move {
                let response = response.ok_or_else(|| ProviderError::Other("no reply".into()))?;
                Ok(provider.interpret(response, functions))
            }
        })
        .await
        .unwrap();

        assert!(matches!(
            completion.output,
            CompletionOutput::FunctionCall(call) if call.name == "search" && call.arguments["query"] == "rust"
        ));
        assert_eq!(requests.len(), 2);
        let feedback = requests[1].last().unwrap();
        assert_eq!(feedback.role, Role::Function);
        assert!(feedback.content.contains("couldn't parse it"));
    }

    #[tokio::test]
    async fn test_call_that_never_parses_is_malformed() {
        let provider = AnthropicProvider::new(&Config::default().anthropic, "claude-2").unwrap();
        let functions = search();
        let mut requests = 0;

        let err = complete_with_recovery(&[Message::user("look it up")], |_| {
            requests += 1;
            let (provider, functions) = (&provider, &functions);
            async move { Ok(provider.interpret(reply("function_name: search"), functions)) }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, ProviderError::Malformed(_)));
        assert_eq!(requests, 3);
    }

    #[test]
    fn test_text_without_functions_is_final() {
        let provider = AnthropicProvider::new(&Config::default().anthropic, "claude-2").unwrap();
        let parsed = provider.interpret(reply(r#"{"function_name": "search"}"#), &[]);
        assert!(matches!(
            parsed,
            Parsed::Done(Completion { output: CompletionOutput::Text(_), .. })
        ));
    }
}
