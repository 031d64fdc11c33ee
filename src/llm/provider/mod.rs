//! Provider implementations and factory
//!
//! Submodules implement the hosted backends; `create_provider` picks one
//! from a resolved [`BackendConfig`].

pub mod anthropic;
pub mod openai;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tracing::warn;

use crate::core::config::{BackendConfig, Config, EndpointConfig, ProviderType};
use crate::core::{ConveneError, Message, ProviderError, Result};
use crate::llm::traits::{Completion, Provider};

use self::anthropic::AnthropicProvider;
use self::openai::OpenAiProvider;

/// Requests issued for one completion while the backend keeps sending
/// function calls we cannot parse
pub const MAX_PARSE_ATTEMPTS: usize = 3;

/// One backend round trip after function-call parsing
pub(crate) enum Parsed {
    Done(Completion),
    /// The reply asked for a function but could not be parsed. `feedback`
    /// tells the model what went wrong.
    Unparseable { feedback: Message, error: String },
}

/// Issue requests until one parses, at most [`MAX_PARSE_ATTEMPTS`] times.
/// Each failed parse is appended to the conversation before the next request.
pub(crate) async fn complete_with_recovery<F, Fut>(
    messages: &[Message],
    mut request: F,
) -> std::result::Result<Completion, ProviderError>
where
    F: FnMut(Vec<Message>) -> Fut,
    Fut: Future<Output = std::result::Result<Parsed, ProviderError>>,
{
    let mut conversation = messages.to_vec();

    for attempt in 1..=MAX_PARSE_ATTEMPTS {
        match request(conversation.clone()).await? {
            Parsed::Done(completion) => return Ok(completion),
            Parsed::Unparseable { feedback, error } => {
                warn!(attempt, "unparseable function call: {}", error);
                conversation.push(feedback);
            }
        }
    }

    Err(ProviderError::Malformed(format!(
        "function call still unparseable after {} attempts",
        MAX_PARSE_ATTEMPTS
    )))
}

/// Create a new provider based on configuration
pub fn create_provider(backend: &BackendConfig, config: &Config) -> Result<Arc<dyn Provider>> {
    let endpoint = config.endpoint(backend.provider);
    let provider: Arc<dyn Provider> = match backend.provider {
        ProviderType::OpenAi => Arc::new(OpenAiProvider::new(endpoint, &backend.model)?),
        ProviderType::Anthropic => Arc::new(AnthropicProvider::new(endpoint, &backend.model)?),
    };
    Ok(provider)
}

fn http_client(endpoint: &EndpointConfig) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(endpoint.timeout_secs))
        .build()
        .map_err(|e| ConveneError::config(format!("Failed to create HTTP client: {}", e)))
}

/// Read the body of a response, classifying unsuccessful statuses
async fn read_body(response: reqwest::Response) -> std::result::Result<String, ProviderError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ProviderError::from_status(status.as_u16(), &body));
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::traits::CompletionOutput;
    use serde_json::json;

    fn unparseable() -> Parsed {
        Parsed::Unparseable {
            feedback: Message::function("add", "EOF while parsing an object"),
            error: "EOF while parsing an object".into(),
        }
    }

    #[tokio::test]
    async fn test_recovery_retries_with_feedback() {
        let mut seen = Vec::new();
        let completion = complete_with_recovery(&[Message::user("add 2 and 3")], |conversation| {
            let first = seen.is_empty();
            seen.push(conversation);
            async move {
                if first {
                    Ok(unparseable())
                } else {
                    Ok(Parsed::Done(Completion::function_call("add", json!({"a": 2, "b": 3}))))
                }
            }
        })
        .await
        .unwrap();

        assert!(matches!(completion.output, CompletionOutput::FunctionCall(call) if call.name == "add"));
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].len(), 2);
        assert_eq!(seen[1][1], Message::function("add", "EOF while parsing an object"));
    }

    #[tokio::test]
    async fn test_recovery_gives_up_after_max_attempts() {
        let mut requests = 0;
        let err = complete_with_recovery(&[Message::user("add")], |_| {
            requests += 1;
            async { Ok(unparseable()) }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, ProviderError::Malformed(_)));
        assert!(!err.is_retryable());
        assert_eq!(requests, MAX_PARSE_ATTEMPTS);
    }

    #[tokio::test]
    async fn test_recovery_stops_on_backend_error() {
        let mut requests = 0;
        let err = complete_with_recovery(&[Message::user("add")], |_| {
            requests += 1;
            async { Err(ProviderError::RateLimited("slow down".into())) }
        })
        .await
        .unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(requests, 1);
    }

    #[test]
    fn test_factory_builds_each_backend() {
        let config = Config::default();
        for provider in [ProviderType::OpenAi, ProviderType::Anthropic] {
            let backend = BackendConfig {
                provider,
                model: provider.default_model().to_string(),
            };
            let built = create_provider(&backend, &config).unwrap();
            assert_eq!(built.name(), provider.to_string());
            assert_eq!(built.model(), provider.default_model());
        }
    }
}
