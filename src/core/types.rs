//! Shared types used across Convene modules
//!
//! Contains the neutral message model sent to backends, function definitions,
//! and the chat-entry records kept in the chat log.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reply text that ends the conversation for the addressed node
pub const TERMINATE: &str = "TERMINATE";

/// Reply text that hands control back to the operator
pub const INTERRUPT: &str = "INTERRUPT";

/// Role of a conversation turn sent to a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    /// Synthetic turn carrying a function result
    Function,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Function => write!(f, "function"),
        }
    }
}

/// A message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender
    pub role: Role,
    /// Content of the message
    pub content: String,
    /// Function name, set on function-role turns
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            name: None,
        }
    }

    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a function-role message reporting on `name`
    pub fn function(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Function,
            content: content.into(),
            name: Some(name.into()),
        }
    }
}

/// A function call requested by a backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Name of the function to invoke
    pub name: String,
    /// JSON arguments for the function
    pub arguments: serde_json::Value,
}

impl FunctionCall {
    /// Create a new function call
    pub fn new(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// Definition of a function a backend may call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// Name of the function
    pub name: String,
    /// Description of what the function does
    pub description: String,
    /// JSON Schema for the parameters
    pub parameters: serde_json::Value,
}

impl FunctionDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// Whether a node hands control to the operator before speaking
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterruptPolicy {
    #[default]
    Never,
    Always,
}

/// Outcome recorded on a chat entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatState {
    Success,
    Error,
    Interrupt,
}

/// A directed exchange between two nodes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Route {
    pub from: String,
    pub to: String,
}

impl Route {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    /// The same pair, with sender and recipient swapped
    pub fn reversed(&self) -> Self {
        Self {
            from: self.to.clone(),
            to: self.from.clone(),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// One exchange attempt in the chat log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub from: String,
    pub to: String,
    /// Reply text, error description, or empty for interrupts
    #[serde(default)]
    pub content: String,
    pub state: ChatState,
}

impl ChatEntry {
    /// A successful message
    pub fn success(route: &Route, content: impl Into<String>) -> Self {
        Self::with_state(route, content, ChatState::Success)
    }

    /// A failed turn carrying the error description
    pub fn error(route: &Route, content: impl Into<String>) -> Self {
        Self::with_state(route, content, ChatState::Error)
    }

    /// A turn suspended for operator input
    pub fn interrupt(route: &Route) -> Self {
        Self::with_state(route, String::new(), ChatState::Interrupt)
    }

    fn with_state(route: &Route, content: impl Into<String>, state: ChatState) -> Self {
        Self {
            from: route.from.clone(),
            to: route.to.clone(),
            content: content.into(),
            state,
        }
    }

    /// The route this entry travelled
    pub fn route(&self) -> Route {
        Route::new(&self.from, &self.to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_serialization_shape() {
        let entry = ChatEntry::success(&Route::new("a", "b"), "hi");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"from": "a", "to": "b", "content": "hi", "state": "success"})
        );
    }

    #[test]
    fn test_function_message_keeps_name() {
        let msg = Message::function("search", "no results");
        assert_eq!(msg.role, Role::Function);
        assert_eq!(msg.name.as_deref(), Some("search"));
    }

    #[test]
    fn test_route_reversed() {
        let route = Route::new("client", "manager");
        assert_eq!(route.reversed(), Route::new("manager", "client"));
        assert_eq!(route.to_string(), "client -> manager");
    }

    #[test]
    fn test_interrupt_policy_parses_lowercase() {
        let policy: InterruptPolicy = serde_json::from_str("\"always\"").unwrap();
        assert_eq!(policy, InterruptPolicy::Always);
        assert_eq!(InterruptPolicy::default(), InterruptPolicy::Never);
    }
}
