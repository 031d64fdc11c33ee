//! Configuration management for Convene
//!
//! Supports environment variables, config files, and runtime overrides.
//! A config file may also declare the whole roster of agents and channels.
//!
//! Config file location: ~/.config/convene/config.toml

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::core::error::{ConveneError, Result};
use crate::core::types::InterruptPolicy;
use crate::llm::ProviderHandle;

/// Completion backends that can be built from configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderType {
    #[default]
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "anthropic")]
    Anthropic,
}

impl ProviderType {
    /// Model used when neither the node nor the defaults name one
    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderType::OpenAi => "gpt-4-1106-preview",
            ProviderType::Anthropic => "claude-2",
        }
    }

    /// Environment variable holding the API key
    pub fn key_var(&self) -> &'static str {
        match self {
            ProviderType::OpenAi => "OPENAI_API_KEY",
            ProviderType::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderType::OpenAi => "https://api.openai.com/v1",
            ProviderType::Anthropic => "https://api.anthropic.com",
        }
    }
}

impl FromStr for ProviderType {
    type Err = ConveneError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(ProviderType::OpenAi),
            "anthropic" => Ok(ProviderType::Anthropic),
            other => Err(ConveneError::UnknownProvider(other.to_string())),
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderType::OpenAi => write!(f, "openai"),
            ProviderType::Anthropic => write!(f, "anthropic"),
        }
    }
}

/// Provider selection after merging a node override over the defaults
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BackendConfig {
    pub provider: ProviderType,
    pub model: String,
}

/// A conversational participant
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Role instruction sent as the system turn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Whether to hand control to the operator before this agent speaks
    #[serde(default)]
    pub interrupt: InterruptPolicy,
    /// Names of registered functions this agent may call
    #[serde(default)]
    pub functions: Vec<String>,
    /// Backend override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderType>,
    /// Model override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Ready-made backend, takes precedence over `provider`/`model`
    #[serde(skip)]
    pub instance: Option<ProviderHandle>,
}

impl AgentConfig {
    /// Create an agent with the given role instruction
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            role: Some(role.into()),
            ..Default::default()
        }
    }

    pub fn with_interrupt(mut self, interrupt: InterruptPolicy) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn with_functions<I, S>(mut self, functions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.functions = functions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_backend(mut self, provider: ProviderType, model: Option<String>) -> Self {
        self.provider = Some(provider);
        self.model = model;
        self
    }

    pub fn with_instance(mut self, instance: impl Into<ProviderHandle>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    /// Role instruction, or the generic assistant role when unset
    pub fn role_or_default(&self) -> &str {
        match self.role.as_deref() {
            Some(role) if !role.trim().is_empty() => role,
            _ => "You are a helpful AI assistant.",
        }
    }
}

fn default_channel_rounds() -> usize {
    10
}

/// A named group of agents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Member names, in registration order
    pub members: Vec<String>,
    /// Role instruction for the member selection prompt
    #[serde(default)]
    pub role: String,
    /// Successful member messages allowed into the channel
    #[serde(default = "default_channel_rounds")]
    pub max_rounds: usize,
    /// Backend override for member selection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderType>,
    /// Model override for member selection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Ready-made backend for member selection
    #[serde(skip)]
    pub instance: Option<ProviderHandle>,
}

impl ChannelConfig {
    /// Create a channel over the given members
    pub fn new<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            members: members.into_iter().map(Into::into).collect(),
            role: String::new(),
            max_rounds: default_channel_rounds(),
            provider: None,
            model: None,
            instance: None,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn with_backend(mut self, provider: ProviderType, model: Option<String>) -> Self {
        self.provider = Some(provider);
        self.model = model;
        self
    }

    pub fn with_instance(mut self, instance: impl Into<ProviderHandle>) -> Self {
        self.instance = Some(instance.into());
        self
    }
}

/// Scheduler-wide defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Backend used by nodes without an override
    pub provider: ProviderType,
    /// Model used by nodes without an override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Interrupt policy applied to every agent
    pub interrupt: InterruptPolicy,
    /// Successful messages allowed between any pair of nodes
    /// Default: 100
    pub max_rounds: usize,
    /// Function round trips allowed inside one turn
    /// Default: 10
    pub max_function_iterations: usize,
    /// Whether to log routing decisions
    pub debug: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            provider: env::var("CONVENE_PROVIDER")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or_default(),
            model: env::var("CONVENE_MODEL").ok(),
            interrupt: InterruptPolicy::Never,
            max_rounds: 100,
            max_function_iterations: 10,
            debug: env::var("CONVENE_DEBUG")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        }
    }
}

/// HTTP endpoint settings shared by the hosted backends
///
/// Any field may be left out of a config file. Missing values are filled in
/// for the backend the section belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// API key; falls back to the backend's environment variable.
    /// Read but never written back out.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Base URL of the API
    pub base_url: String,
    /// Request timeout in seconds
    /// Default: 120
    pub timeout_secs: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: String::new(),
            timeout_secs: 120,
        }
    }
}

impl EndpointConfig {
    fn for_backend(provider: ProviderType) -> Self {
        let mut endpoint = Self::default();
        endpoint.fill_missing(provider);
        endpoint
    }

    fn fill_missing(&mut self, provider: ProviderType) {
        if self.base_url.is_empty() {
            self.base_url = provider.default_base_url().to_string();
        }
        if self.api_key.is_none() {
            self.api_key = env::var(provider.key_var()).ok();
        }
    }
}

/// Main configuration for Convene
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: DefaultsConfig,
    /// OpenAI endpoint
    #[serde(default = "default_openai")]
    pub openai: EndpointConfig,
    /// Anthropic endpoint
    #[serde(default = "default_anthropic")]
    pub anthropic: EndpointConfig,
    /// Agents declared in the file
    #[serde(default)]
    pub agents: BTreeMap<String, AgentConfig>,
    /// Channels declared in the file
    #[serde(default)]
    pub channels: BTreeMap<String, ChannelConfig>,
}

fn default_openai() -> EndpointConfig {
    EndpointConfig::for_backend(ProviderType::OpenAi)
}

fn default_anthropic() -> EndpointConfig {
    EndpointConfig::for_backend(ProviderType::Anthropic)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            defaults: DefaultsConfig::default(),
            openai: default_openai(),
            anthropic: default_anthropic(),
            agents: BTreeMap::new(),
            channels: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("convene")
    }

    /// Get the config file path
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from file, environment, and defaults
    /// Priority: CLI args > config file > env vars > defaults
    pub fn load() -> Self {
        let _ = dotenvy::dotenv();

        if let Ok(config) = Self::load_from_file(&Self::config_file()) {
            return config;
        }

        Self::default()
    }

    /// Load configuration from a specific file
    ///
    /// Keys in `.env` are picked up here too, so an explicit file sees the
    /// same environment as [`Config::load`].
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let _ = dotenvy::dotenv();

        if !path.exists() {
            return Err(ConveneError::config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        let content = fs::read_to_string(path)
            .map_err(|e| ConveneError::config(format!("Failed to read config: {}", e)))?;

        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content)
            .map_err(|e| ConveneError::config(format!("Failed to parse config: {}", e)))?;
        config.openai.fill_missing(ProviderType::OpenAi);
        config.anthropic.fill_missing(ProviderType::Anthropic);
        Ok(config)
    }

    /// Save configuration to the given file, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir).map_err(|e| {
                    ConveneError::config(format!("Failed to create config dir: {}", e))
                })?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ConveneError::config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, content)
            .map_err(|e| ConveneError::config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Endpoint settings for a backend
    pub fn endpoint(&self, provider: ProviderType) -> &EndpointConfig {
        match provider {
            ProviderType::OpenAi => &self.openai,
            ProviderType::Anthropic => &self.anthropic,
        }
    }

    /// Merge a node's provider/model override over the defaults
    pub fn backend_for(
        &self,
        provider: Option<ProviderType>,
        model: Option<&str>,
    ) -> BackendConfig {
        let provider = provider.unwrap_or(self.defaults.provider);
        // A default model only applies when the node keeps the default backend
        let model = model
            .map(str::to_string)
            .or_else(|| {
                (provider == self.defaults.provider)
                    .then(|| self.defaults.model.clone())
                    .flatten()
            })
            .unwrap_or_else(|| provider.default_model().to_string());
        BackendConfig { provider, model }
    }

    /// Generate a default config file content for display
    pub fn default_config_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config)
            .unwrap_or_else(|_| String::from("# Error generating config"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[defaults]
provider = "anthropic"
max_rounds = 20
max_function_iterations = 4

[agents.client]
interrupt = "always"

[agents.mathematician]
role = "You only solve math problems."
functions = ["calculator"]
provider = "openai"
model = "gpt-4"

[channels.manager]
members = ["mathematician", "reviewer", "client"]
max_rounds = 5
"#;

    #[test]
    fn test_parse_roster() {
        let config = Config::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.defaults.provider, ProviderType::Anthropic);
        assert_eq!(config.defaults.max_rounds, 20);
        assert_eq!(config.agents["client"].interrupt, InterruptPolicy::Always);
        assert_eq!(config.agents["mathematician"].functions, vec!["calculator"]);
        assert_eq!(config.channels["manager"].members.len(), 3);
        assert_eq!(config.channels["manager"].max_rounds, 5);
        assert!(config.channels["manager"].role.is_empty());
    }

    #[test]
    fn test_backend_merge() {
        let config = Config::from_toml_str(SAMPLE).unwrap();
        let math = &config.agents["mathematician"];
        let backend = config.backend_for(math.provider, math.model.as_deref());
        assert_eq!(backend.provider, ProviderType::OpenAi);
        assert_eq!(backend.model, "gpt-4");

        let fallback = config.backend_for(None, None);
        assert_eq!(fallback.provider, ProviderType::Anthropic);
    }

    #[test]
    fn test_unknown_provider() {
        let err = "cohere".parse::<ProviderType>().unwrap_err();
        assert!(matches!(err, ConveneError::UnknownProvider(p) if p == "cohere"));
        assert!(Config::from_toml_str("[defaults]\nprovider = \"cohere\"").is_err());
    }

    #[test]
    fn test_default_roles() {
        assert_eq!(
            AgentConfig::default().role_or_default(),
            "You are a helpful AI assistant."
        );
        assert_eq!(ChannelConfig::new(["a", "b"]).max_rounds, 10);
    }

    #[test]
    fn test_partial_endpoint_section() {
        let config = Config::from_toml_str("[openai]\napi_key = \"k\"\n").unwrap();
        assert_eq!(config.openai.api_key.as_deref(), Some("k"));
        assert_eq!(config.openai.base_url, "https://api.openai.com/v1");
        assert_eq!(config.openai.timeout_secs, 120);

        let config = Config::from_toml_str("[anthropic]\ntimeout_secs = 30\n").unwrap();
        assert_eq!(config.anthropic.base_url, "https://api.anthropic.com");
        assert_eq!(config.anthropic.timeout_secs, 30);
    }

    #[test]
    fn test_api_keys_are_not_serialized() {
        std::env::set_var("ANTHROPIC_API_KEY", "sk-ant-from-env");
        let printed = Config::default_config_toml();
        assert!(!printed.contains("sk-ant-from-env"));
        assert!(!printed.contains("api_key"));
        assert!(printed.contains("https://api.anthropic.com"));

        let mut config = Config::from_toml_str(SAMPLE).unwrap();
        config.openai.api_key = Some("sk-from-file".into());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        config.save(&path).unwrap();
        let saved = fs::read_to_string(&path).unwrap();
        assert!(!saved.contains("sk-from-file"));
    }

    #[test]
    fn test_config_dir() {
        let dir = Config::config_dir();
        assert!(dir.to_string_lossy().contains("convene"));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::from_toml_str(SAMPLE).unwrap();
        config.save(&path).unwrap();

        let reloaded = Config::load_from_file(&path).unwrap();
        assert_eq!(reloaded.agents.len(), 2);
        assert_eq!(reloaded.channels["manager"].max_rounds, 5);
    }
}
