//! Scheduler configuration
//!
//! Everything is registered on the builder; `build()` validates the roster
//! and resolves a backend per node. The result cannot be reconfigured.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::chat::events::{ChatObserver, EventBus};
use crate::chat::log::ChatLog;
use crate::chat::roster::Roster;
use crate::chat::scheduler::Scheduler;
use crate::core::{
    AgentConfig, BackendConfig, ChannelConfig, ChatEntry, Config, InterruptPolicy, ProviderType,
    Result,
};
use crate::functions::{FunctionRegistry, FunctionSpec};
use crate::llm::{create_provider, Provider, ProviderHandle};

pub struct SchedulerBuilder {
    config: Config,
    roster: Roster,
    functions: FunctionRegistry,
    events: EventBus,
    default_instance: Option<ProviderHandle>,
    history: Vec<ChatEntry>,
}

impl Default for SchedulerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulerBuilder {
    /// Empty roster with default settings
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Empty roster using the settings and endpoints of `config`
    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            roster: Roster::default(),
            functions: FunctionRegistry::new(),
            events: EventBus::new(),
            default_instance: None,
            history: Vec::new(),
        }
    }

    /// Settings, endpoints and the agents and channels declared in `config`
    pub fn from_config(config: &Config) -> Self {
        let mut builder = Self::with_config(config.clone());
        for (name, agent) in &config.agents {
            builder.roster.insert_agent(name.clone(), agent.clone());
        }
        for (name, channel) in &config.channels {
            builder.roster.insert_channel(name.clone(), channel.clone());
        }
        builder
    }

    /// Register an agent, replacing any earlier one with the same name
    pub fn agent(mut self, name: impl Into<String>, config: AgentConfig) -> Self {
        self.roster.insert_agent(name.into(), config);
        self
    }

    /// Register a channel, replacing any earlier one with the same name
    pub fn channel(mut self, name: impl Into<String>, config: ChannelConfig) -> Self {
        self.roster.insert_channel(name.into(), config);
        self
    }

    pub fn function(mut self, spec: FunctionSpec) -> Self {
        self.functions.register(spec);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn ChatObserver>) -> Self {
        self.events.subscribe(observer);
        self
    }

    /// Backend for nodes without an override
    pub fn default_backend(mut self, provider: ProviderType, model: Option<String>) -> Self {
        self.config.defaults.provider = provider;
        self.config.defaults.model = model;
        self
    }

    /// Ready-made backend for nodes without an override
    pub fn default_instance(mut self, instance: impl Into<ProviderHandle>) -> Self {
        self.default_instance = Some(instance.into());
        self
    }

    /// Interrupt policy applied on top of each agent's own
    pub fn interrupt(mut self, policy: InterruptPolicy) -> Self {
        self.config.defaults.interrupt = policy;
        self
    }

    /// Successful messages allowed between any pair of nodes
    pub fn max_rounds(mut self, max_rounds: usize) -> Self {
        self.config.defaults.max_rounds = max_rounds;
        self
    }

    /// Function round trips allowed inside one turn
    pub fn max_function_iterations(mut self, max: usize) -> Self {
        self.config.defaults.max_function_iterations = max;
        self
    }

    /// Start from previously recorded entries
    pub fn history(mut self, entries: Vec<ChatEntry>) -> Self {
        self.history = entries;
        self
    }

    pub fn build(self) -> Result<Scheduler> {
        self.roster.validate(&self.functions)?;
        for entry in &self.history {
            self.roster.kind(&entry.from)?;
            self.roster.kind(&entry.to)?;
        }

        let mut resolver = Resolver {
            config: &self.config,
            default_instance: self.default_instance.as_ref(),
            built: HashMap::new(),
        };
        let mut providers = HashMap::new();
        for (name, agent) in self.roster.agents() {
            let provider =
                resolver.resolve(agent.instance.as_ref(), agent.provider, agent.model.as_deref())?;
            providers.insert(name.clone(), provider);
        }
        for (name, channel) in self.roster.channels() {
            let provider = resolver.resolve(
                channel.instance.as_ref(),
                channel.provider,
                channel.model.as_deref(),
            )?;
            providers.insert(name.clone(), provider);
        }
        debug!(
            nodes = providers.len(),
            backends = resolver.built.len(),
            functions = self.functions.len(),
            "scheduler configured"
        );

        Ok(Scheduler {
            roster: self.roster,
            functions: self.functions,
            providers,
            log: ChatLog::from_entries(self.history),
            events: self.events,
            interrupt: self.config.defaults.interrupt,
            max_rounds: self.config.defaults.max_rounds,
            max_function_iterations: self.config.defaults.max_function_iterations,
            total_cost: 0.0,
        })
    }
}

/// Picks a backend per node, building each distinct configuration once
struct Resolver<'a> {
    config: &'a Config,
    default_instance: Option<&'a ProviderHandle>,
    built: HashMap<BackendConfig, Arc<dyn Provider>>,
}

impl Resolver<'_> {
    fn resolve(
        &mut self,
        instance: Option<&ProviderHandle>,
        provider: Option<ProviderType>,
        model: Option<&str>,
    ) -> Result<Arc<dyn Provider>> {
        if let Some(instance) = instance {
            return Ok(instance.clone().into_inner());
        }
        if provider.is_none() && model.is_none() {
            if let Some(instance) = self.default_instance {
                return Ok(instance.clone().into_inner());
            }
        }

        let backend = self.config.backend_for(provider, model);
        if let Some(built) = self.built.get(&backend) {
            return Ok(built.clone());
        }
        let built = create_provider(&backend, self.config)?;
        self.built.insert(backend, built.clone());
        Ok(built)
    }
}
