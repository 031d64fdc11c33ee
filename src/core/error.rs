//! Custom error types for Convene
//!
//! `ConveneError` is the error every public operation returns. Backend
//! failures are described separately by `ProviderError`, which knows whether
//! a failure is worth retrying.

use thiserror::Error;

/// Failure reported by a completion backend
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The backend asked us to slow down (HTTP 429)
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Transient server-side failure (HTTP 5xx, overloaded)
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Any other API rejection (bad request, unknown model, ...)
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Missing or rejected credentials
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered but the payload could not be understood
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// Anything else
    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    /// Classify an unsuccessful HTTP status and its body
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = extract_error_message(body);
        match status {
            429 => Self::RateLimited(message),
            401 | 403 => Self::Auth(message),
            s if s >= 500 => Self::Server { status, message },
            _ => Self::Api { status, message },
        }
    }

    /// Whether an external supervisor may retry the failed turn later
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited(_) | Self::Server { .. } => true,
            Self::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|s| {
                        s == reqwest::StatusCode::TOO_MANY_REQUESTS || s.is_server_error()
                    })
            }
            Self::Api { .. } | Self::Auth(_) | Self::Malformed(_) | Self::Other(_) => false,
        }
    }
}

/// Pull a readable message out of the usual `{"error": {"message": ..}}` envelopes.
fn extract_error_message(body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(msg) = json["error"]["message"].as_str() {
            return msg.to_string();
        }
        if let Some(msg) = json["message"].as_str() {
            return msg.to_string();
        }
    }
    body.trim().to_string()
}

/// Main error type for Convene operations
#[derive(Error, Debug)]
pub enum ConveneError {
    /// No agent registered under this name
    #[error("Agent configuration \"{0}\" not found")]
    UnknownAgent(String),

    /// No channel registered under this name
    #[error("Channel configuration \"{0}\" not found")]
    UnknownChannel(String),

    /// Route endpoint that is neither an agent nor a channel
    #[error("\"{0}\" is neither an agent nor a channel")]
    UnknownNode(String),

    /// Unknown backend discriminator
    #[error("Unknown provider: {0}. Use \"openai\" or \"anthropic\"")]
    UnknownProvider(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A completion backend failed
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The backend kept requesting functions past the configured bound
    #[error("Function call limit of {0} iterations reached without a reply")]
    FunctionLimit(usize),

    /// `resume` called while the last entry is not an interrupt
    #[error("No chat to continue")]
    NothingToContinue,

    /// `retry` called while the last entry is not an error
    #[error("No chat to retry")]
    NothingToRetry,

    /// Resuming a pair whose round budget is spent
    #[error("Maximum rounds reached between \"{from}\" and \"{to}\"")]
    MaxRoundsReached { from: String, to: String },

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error for other cases
    #[error("{0}")]
    Other(String),
}

/// Convenience Result type for Convene operations
pub type Result<T> = std::result::Result<T, ConveneError>;

impl ConveneError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Errors that end a single turn as an `error` chat entry instead of
    /// aborting the whole operation.
    pub fn is_reply_failure(&self) -> bool {
        matches!(self, Self::Provider(_) | Self::FunctionLimit(_))
    }

    /// Whether the failed turn may succeed if retried later
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Provider(e) => e.is_retryable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(ProviderError::from_status(429, "slow down").is_retryable());
        assert!(ProviderError::from_status(503, "").is_retryable());
        assert!(ProviderError::from_status(529, "overloaded").is_retryable());
        assert!(!ProviderError::from_status(400, "bad").is_retryable());
        assert!(matches!(
            ProviderError::from_status(401, "nope"),
            ProviderError::Auth(_)
        ));
    }

    #[test]
    fn test_error_envelope_message() {
        let body = r#"{"error": {"message": "model overloaded", "type": "overloaded_error"}}"#;
        match ProviderError::from_status(529, body) {
            ProviderError::Server { message, .. } => assert_eq!(message, "model overloaded"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_reply_failures() {
        let retryable = ConveneError::from(ProviderError::RateLimited("x".into()));
        assert!(retryable.is_reply_failure());
        assert!(retryable.is_retryable());

        assert!(ConveneError::FunctionLimit(3).is_reply_failure());
        assert!(!ConveneError::FunctionLimit(3).is_retryable());
        assert!(!ConveneError::UnknownAgent("a".into()).is_reply_failure());
    }
}
