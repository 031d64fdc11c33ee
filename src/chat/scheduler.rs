//! Turn scheduler
//!
//! Decides who speaks next and records every outcome in the chat log.
//! A routing run walks [`RoutingState`]s until it reaches a terminal
//! [`Outcome`]:
//!
//! - a route *from* a channel asks the [`GroupSelector`] for the member that
//!   replies into the channel
//! - a route from an agent asks that agent's provider for a reply, resolving
//!   any function calls on the way
//!
//! Runs stop on an explicit terminate signal, an exhausted round budget, an
//! interrupt or a failed turn. Interrupted and failed runs are picked up
//! again with [`Scheduler::resume`] and [`Scheduler::retry`].

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::chat::builder::SchedulerBuilder;
use crate::chat::events::EventBus;
use crate::chat::log::{ChatLog, HistoryFilter};
use crate::chat::loop_state::{LoopCounter, Outcome, RoutingState};
use crate::chat::roster::Roster;
use crate::chat::selector::{transcript, GroupSelector};
use crate::core::{
    ChatEntry, ChatState, ConveneError, InterruptPolicy, Message, Result, Route, INTERRUPT,
    TERMINATE,
};
use crate::functions::{FunctionExecutor, FunctionRegistry};
use crate::llm::Provider;

pub struct Scheduler {
    pub(crate) roster: Roster,
    pub(crate) functions: FunctionRegistry,
    /// Resolved backend for every agent and channel
    pub(crate) providers: HashMap<String, Arc<dyn Provider>>,
    pub(crate) log: ChatLog,
    pub(crate) events: EventBus,
    pub(crate) interrupt: InterruptPolicy,
    pub(crate) max_rounds: usize,
    pub(crate) max_function_iterations: usize,
    pub(crate) total_cost: f64,
}

impl Scheduler {
    pub fn builder() -> SchedulerBuilder {
        SchedulerBuilder::new()
    }

    /// Log the seed message and route the conversation from its recipient
    pub async fn start(&mut self, route: Route, content: impl Into<String>) -> Result<Outcome> {
        self.roster.kind(&route.from)?;
        self.roster.kind(&route.to)?;

        info!(route = %route, "starting conversation");
        let seed = self.record_message(&route, content);
        self.events.start(&seed);

        self.chat(route.reversed()).await
    }

    /// Route the conversation until a terminal outcome
    pub async fn chat(&mut self, route: Route) -> Result<Outcome> {
        self.run(route, true).await
    }

    /// Route a single reply and stop
    ///
    /// Channel selections along the way do not count as replies.
    pub async fn chat_once(&mut self, route: Route) -> Result<Outcome> {
        self.run(route, false).await
    }

    /// Continue after an interrupt
    ///
    /// With feedback the operator speaks as the interrupted node and the
    /// other side replies. Without feedback the interrupted node replies
    /// automatically.
    pub async fn resume(&mut self, feedback: Option<&str>) -> Result<Outcome> {
        let route = match self.log.last() {
            Some(last) if last.state == ChatState::Interrupt => last.route(),
            _ => return Err(ConveneError::NothingToContinue),
        };
        self.log.pop_last();

        if self.has_reached_max_rounds(&route.from, &route.to) {
            return Err(ConveneError::MaxRoundsReached {
                from: route.from,
                to: route.to,
            });
        }

        match feedback {
            Some(feedback) => {
                info!(route = %route, "resuming with operator feedback");
                self.record_message(&route, feedback);
                self.chat(route.reversed()).await
            }
            None => {
                info!(route = %route, "resuming with an automatic reply");
                self.chat(route).await
            }
        }
    }

    /// Give the route of the last failed turn another chance
    pub async fn retry(&mut self) -> Result<Outcome> {
        let route = match self.log.last() {
            Some(last) if last.state == ChatState::Error => last.route(),
            _ => return Err(ConveneError::NothingToRetry),
        };
        self.log.pop_last();

        info!(route = %route, "retrying failed turn");
        self.chat(route).await
    }

    async fn run(&mut self, route: Route, keep_alive: bool) -> Result<Outcome> {
        self.roster.kind(&route.from)?;
        self.roster.kind(&route.to)?;

        let mut counter = LoopCounter::default();
        let mut state = RoutingState::Routing(route);
        loop {
            counter.observe(&state);
            state = match state {
                RoutingState::Routing(route) => self.route_step(route).await?,
                RoutingState::AwaitingReply(route) => self.reply_step(route, keep_alive).await?,
                RoutingState::Terminal(outcome) => {
                    debug!(
                        steps = counter.steps,
                        replies = counter.replies,
                        ?outcome,
                        "routing finished"
                    );
                    return Ok(outcome);
                }
            };
        }
    }

    async fn route_step(&mut self, route: Route) -> Result<RoutingState> {
        if !self.roster.is_channel(&route.from) {
            return Ok(RoutingState::AwaitingReply(route));
        }

        let channel = route.from.clone();
        let provider = self.provider_for(&channel)?;
        let selection = GroupSelector::new(&self.roster, &self.log, self.max_rounds)
            .select(&channel, provider.as_ref())
            .await;
        let selection = match selection {
            Ok(selection) => selection,
            Err(e) if e.is_reply_failure() => return Ok(self.record_error(&route, e)),
            Err(e) => return Err(e),
        };
        self.add_cost(selection.cost);

        let Some(next) = selection.next else {
            return Ok(self.terminate(&channel));
        };

        let next_route = Route::new(next, channel.as_str());
        if self.should_interrupt(&next_route.from)? {
            return Ok(self.interrupt(next_route));
        }

        let max_rounds = self.roster.channel(&channel)?.max_rounds;
        let rounds = self.channel_rounds(&channel)?;
        if rounds >= max_rounds {
            debug!(channel = %channel, rounds, max_rounds, "channel round budget spent");
            return Ok(self.terminate(&route.to));
        }

        debug!(route = %next_route, rounds, "member takes the turn");
        Ok(RoutingState::Routing(next_route))
    }

    async fn reply_step(&mut self, route: Route, keep_alive: bool) -> Result<RoutingState> {
        let reply = match self.reply(&route).await {
            Ok(reply) => reply,
            Err(e) if e.is_reply_failure() => return Ok(self.record_error(&route, e)),
            Err(e) => return Err(e),
        };

        if signals(&reply, TERMINATE) || self.has_reached_max_rounds(&route.from, &route.to) {
            return Ok(self.terminate(&route.to));
        }

        let next = route.reversed();
        if signals(&reply, INTERRUPT) || self.should_interrupt(&route.to)? {
            return Ok(self.interrupt(next));
        }

        if keep_alive {
            Ok(RoutingState::Routing(next))
        } else {
            Ok(RoutingState::Terminal(Outcome::Yielded { next }))
        }
    }

    /// Ask `route.from` for its next message to `route.to` and log it
    async fn reply(&mut self, route: &Route) -> Result<String> {
        let execution = {
            let agent = self.roster.agent(&route.from)?;
            let provider = self.provider_for(&route.from)?;
            let messages = self.reply_messages(route)?;
            debug!(route = %route, model = provider.model(), turns = messages.len(), "requesting reply");

            FunctionExecutor::new(&self.functions, &agent.functions, self.max_function_iterations)
                .run(provider.as_ref(), messages)
                .await?
        };
        self.add_cost(execution.cost);

        self.record_message(route, execution.text.as_str());
        Ok(execution.text)
    }

    /// Conversation sent to the speaker's backend
    fn reply_messages(&self, route: &Route) -> Result<Vec<Message>> {
        let agent = self.roster.agent(&route.from)?;
        let mut messages = vec![Message::system(agent.role_or_default())];

        if self.roster.is_channel(&route.to) {
            messages.push(Message::user(format!(
                "You are in a chat room. Read the following conversation (if there is one) and then reply.\n\
                 Do not add introduction or conclusion to your reply because this will be a continuous conversation. \
                 Don't introduce yourself.\n\n\
                 CHAT HISTORY\n\
                 {}\n\n\
                 @{}:",
                transcript(&self.log, &route.to),
                route.from
            )));
        } else {
            messages.extend(
                self.log
                    .history(HistoryFilter::between(&route.from, &route.to))
                    .into_iter()
                    .map(|entry| {
                        if entry.from == route.to {
                            Message::user(entry.content.clone())
                        } else {
                            Message::assistant(entry.content.clone())
                        }
                    }),
            );
        }

        Ok(messages)
    }

    fn record_message(&mut self, route: &Route, content: impl Into<String>) -> ChatEntry {
        let entry = ChatEntry::success(route, content);
        self.log.append(entry.clone());
        self.events.message(&entry);
        entry
    }

    fn record_error(&mut self, route: &Route, error: ConveneError) -> RoutingState {
        let retryable = error.is_retryable();
        warn!(route = %route, retryable, error = %error, "turn failed");

        let entry = ChatEntry::error(route, error.to_string());
        self.log.append(entry.clone());
        self.events.error(&error, &entry);

        RoutingState::Terminal(Outcome::Failed {
            route: route.clone(),
            retryable,
        })
    }

    fn interrupt(&mut self, route: Route) -> RoutingState {
        info!(route = %route, "interrupted for operator input");
        let entry = ChatEntry::interrupt(&route);
        self.log.append(entry.clone());
        self.events.interrupt(&entry);
        RoutingState::Terminal(Outcome::Interrupted { route })
    }

    fn terminate(&mut self, node: &str) -> RoutingState {
        info!(node, "conversation terminated");
        self.events.terminate(node);
        RoutingState::Terminal(Outcome::Terminated {
            node: node.to_string(),
        })
    }

    /// Whether the operator takes over before `node` speaks
    fn should_interrupt(&self, node: &str) -> Result<bool> {
        if !self.roster.is_agent(node) {
            return Ok(false);
        }
        let agent = self.roster.agent(node)?;
        Ok(self.interrupt == InterruptPolicy::Always || agent.interrupt == InterruptPolicy::Always)
    }

    fn has_reached_max_rounds(&self, from: &str, to: &str) -> bool {
        self.log.round_count(from, to) >= self.max_rounds
    }

    /// Successful member messages addressed to the channel
    fn channel_rounds(&self, channel: &str) -> Result<usize> {
        let members = &self.roster.channel(channel)?.members;
        Ok(self
            .log
            .history(HistoryFilter::to(channel))
            .iter()
            .filter(|e| members.contains(&e.from))
            .count())
    }

    fn provider_for(&self, node: &str) -> Result<Arc<dyn Provider>> {
        self.providers
            .get(node)
            .cloned()
            .ok_or_else(|| ConveneError::UnknownNode(node.to_string()))
    }

    fn add_cost(&mut self, cost: f64) {
        if cost.is_finite() {
            self.total_cost += cost;
        }
    }

    /// Every entry so far
    pub fn log(&self) -> &ChatLog {
        &self.log
    }

    /// Successful entries matching the filter
    pub fn history(&self, filter: HistoryFilter<'_>) -> Vec<&ChatEntry> {
        self.log.history(filter)
    }

    pub fn round_count(&self, from: &str, to: &str) -> usize {
        self.log.round_count(from, to)
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Sum of the known costs of every backend request
    pub fn total_cost(&self) -> f64 {
        self.total_cost
    }
}

/// Whether a reply carries a control word
fn signals(reply: &str, word: &str) -> bool {
    let text = reply.trim().trim_end_matches(['.', '!']);
    match text.strip_suffix(word) {
        Some(before) => before.chars().next_back().is_none_or(char::is_whitespace),
        None => false,
    }
}
