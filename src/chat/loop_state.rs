//! Routing loop state
//!
//! The scheduler walks these states instead of recursing once per turn.
//! Function-call resolution inside a turn is handled by the executor.

use serde::{Deserialize, Serialize};

use crate::core::Route;

/// How a routing run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// The conversation ended for `node`
    Terminated { node: String },
    /// Waiting for operator input on this route; see `Scheduler::resume`
    Interrupted { route: Route },
    /// The turn on `route` failed; see `Scheduler::retry`
    Failed { route: Route, retryable: bool },
    /// Stopped after one reply; `next` is the route that would follow
    Yielded { next: Route },
}

impl Outcome {
    pub fn is_terminated(&self) -> bool {
        matches!(self, Outcome::Terminated { .. })
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, Outcome::Interrupted { .. })
    }

    /// Failed with an error an external supervisor may retry
    pub fn is_retryable(&self) -> bool {
        matches!(self, Outcome::Failed { retryable: true, .. })
    }
}

/// Where the routing loop is
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RoutingState {
    /// Decide who speaks on this route
    Routing(Route),
    /// `route.from` is an agent; ask it for a reply to `route.to`
    AwaitingReply(Route),
    /// Done
    Terminal(Outcome),
}

/// Counts steps taken by one routing run, for logging
#[derive(Debug, Clone, Default)]
pub(crate) struct LoopCounter {
    pub steps: usize,
    pub replies: usize,
}

impl LoopCounter {
    pub fn observe(&mut self, state: &RoutingState) {
        self.steps += 1;
        if matches!(state, RoutingState::AwaitingReply(_)) {
            self.replies += 1;
        }
    }
}
