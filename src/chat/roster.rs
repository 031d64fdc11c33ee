//! Roster of agents and channels
//!
//! Filled during configuration and read-only once scheduling starts.

use std::collections::HashMap;

use crate::core::{AgentConfig, ChannelConfig, ConveneError, Result};
use crate::functions::FunctionRegistry;

/// What a route endpoint refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Agent,
    Channel,
}

#[derive(Debug, Clone, Default)]
pub struct Roster {
    agents: HashMap<String, AgentConfig>,
    channels: HashMap<String, ChannelConfig>,
}

impl Roster {
    pub(crate) fn insert_agent(&mut self, name: String, config: AgentConfig) {
        self.agents.insert(name, config);
    }

    pub(crate) fn insert_channel(&mut self, name: String, config: ChannelConfig) {
        self.channels.insert(name, config);
    }

    pub fn agent(&self, name: &str) -> Result<&AgentConfig> {
        self.agents
            .get(name)
            .ok_or_else(|| ConveneError::UnknownAgent(name.to_string()))
    }

    pub fn channel(&self, name: &str) -> Result<&ChannelConfig> {
        self.channels
            .get(name)
            .ok_or_else(|| ConveneError::UnknownChannel(name.to_string()))
    }

    pub fn is_agent(&self, name: &str) -> bool {
        self.agents.contains_key(name)
    }

    pub fn is_channel(&self, name: &str) -> bool {
        self.channels.contains_key(name)
    }

    /// Resolve a route endpoint
    pub fn kind(&self, name: &str) -> Result<NodeKind> {
        if self.is_channel(name) {
            Ok(NodeKind::Channel)
        } else if self.is_agent(name) {
            Ok(NodeKind::Agent)
        } else {
            Err(ConveneError::UnknownNode(name.to_string()))
        }
    }

    /// Role text describing a node to a selector
    pub fn role_of(&self, name: &str) -> Result<&str> {
        match self.kind(name)? {
            NodeKind::Agent => Ok(self.agent(name)?.role_or_default()),
            NodeKind::Channel => Ok(&self.channel(name)?.role),
        }
    }

    pub fn agents(&self) -> impl Iterator<Item = (&String, &AgentConfig)> {
        self.agents.iter()
    }

    pub fn channels(&self) -> impl Iterator<Item = (&String, &ChannelConfig)> {
        self.channels.iter()
    }

    /// Check cross references before scheduling
    pub fn validate(&self, functions: &FunctionRegistry) -> Result<()> {
        for (name, agent) in &self.agents {
            if self.channels.contains_key(name) {
                return Err(ConveneError::config(format!(
                    "\"{}\" is registered both as an agent and a channel",
                    name
                )));
            }
            if let Some(missing) = agent.functions.iter().find(|f| !functions.contains(f)) {
                return Err(ConveneError::config(format!(
                    "Agent \"{}\" uses unregistered function \"{}\"",
                    name, missing
                )));
            }
        }

        for (name, channel) in &self.channels {
            if channel.members.iter().any(|m| m == name) {
                return Err(ConveneError::config(format!(
                    "Channel \"{}\" cannot be its own member",
                    name
                )));
            }
            for member in &channel.members {
                if self.is_channel(member) {
                    return Err(ConveneError::config(format!(
                        "Channel \"{}\" lists channel \"{}\"; members must be agents",
                        name, member
                    )));
                }
                self.agent(member)?;
            }
        }

        Ok(())
    }
}
