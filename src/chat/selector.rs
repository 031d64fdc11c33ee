//! Group selector
//!
//! Picks the next member to speak inside a channel. The backend is asked for
//! a name, but its answer is free text and only used when it names an
//! eligible member; otherwise a random eligible member speaks.

use rand::seq::IndexedRandom;
use tracing::{debug, warn};

use crate::chat::log::{ChatLog, HistoryFilter};
use crate::chat::roster::Roster;
use crate::core::{Message, Result};
use crate::llm::Provider;

/// Channels smaller than this work better as direct conversations
const MIN_USEFUL_MEMBERS: usize = 3;

/// Result of one selection
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Member chosen to speak, `None` when nobody is eligible
    pub next: Option<String>,
    /// Cost of the selection request, `NaN` when unknown or not issued
    pub cost: f64,
}

pub struct GroupSelector<'a> {
    roster: &'a Roster,
    log: &'a ChatLog,
    max_rounds: usize,
}

impl<'a> GroupSelector<'a> {
    /// `max_rounds` is the pairwise budget between a member and the channel
    pub fn new(roster: &'a Roster, log: &'a ChatLog, max_rounds: usize) -> Self {
        Self {
            roster,
            log,
            max_rounds,
        }
    }

    /// Members that may speak next, in registration order
    pub fn eligible(&self, channel: &str) -> Result<Vec<String>> {
        let config = self.roster.channel(channel)?;
        if config.members.len() < MIN_USEFUL_MEMBERS {
            warn!(
                channel,
                members = config.members.len(),
                "channel is underpopulated, direct communication would be more efficient"
            );
        }

        let last_speaker = self.log.last_to(channel).map(|e| e.from.as_str());
        Ok(config
            .members
            .iter()
            .filter(|m| self.log.round_count(channel, m) < self.max_rounds)
            .filter(|m| Some(m.as_str()) != last_speaker)
            .cloned()
            .collect())
    }

    /// Conversation asking the backend to name the next speaker
    pub fn prompt(&self, channel: &str, eligible: &[String]) -> Result<Vec<Message>> {
        let config = self.roster.channel(channel)?;

        let mut roles = Vec::with_capacity(eligible.len());
        for member in eligible {
            roles.push(format!("@{}: {}", member, self.roster.role_of(member)?));
        }
        let transcript = transcript(self.log, channel);

        Ok(vec![
            Message::system(config.role.clone()),
            Message::user(format!(
                "You are in a role play game. The following roles are available:\n\
                 {}\n\n\
                 Read the following conversation.\n\n\
                 CHAT HISTORY\n\
                 {}\n\n\
                 Then select the next role that is going to speak next.\n\
                 Only return the role.",
                roles.join("\n"),
                transcript
            )),
        ])
    }

    /// Choose the next speaker for `channel`
    ///
    /// No request is issued when nobody is eligible.
    pub async fn select(&self, channel: &str, provider: &dyn Provider) -> Result<Selection> {
        let eligible = self.eligible(channel)?;
        if eligible.is_empty() {
            debug!(channel, "no eligible member left");
            return Ok(Selection {
                next: None,
                cost: f64::NAN,
            });
        }

        let messages = self.prompt(channel, &eligible)?;
        let completion = provider.complete(&messages, &[]).await?;
        let answer = completion.as_text().unwrap_or_default();

        let next = match validate_choice(answer, &eligible) {
            Some(name) => name,
            None => {
                warn!(channel, answer, "selection did not name an eligible member, picking one at random");
                random_member(&eligible)
            }
        };
        debug!(channel, next = %next, "selected next speaker");

        Ok(Selection {
            next: Some(next),
            cost: completion.cost,
        })
    }
}

/// `@from: content` lines of every successful message into `node`
pub(crate) fn transcript(log: &ChatLog, node: &str) -> String {
    log.history(HistoryFilter::to(node))
        .iter()
        .map(|e| format!("@{}: {}", e.from, e.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Map the backend's answer onto an eligible member name
fn validate_choice(answer: &str, eligible: &[String]) -> Option<String> {
    let name = answer.trim();
    let name = name.strip_prefix('@').unwrap_or(name).trim();
    let name = name.trim_end_matches(['.', ':', ',']);
    eligible.iter().find(|m| m.as_str() == name).cloned()
}

fn random_member(eligible: &[String]) -> String {
    eligible
        .choose(&mut rand::rng())
        .cloned()
        .unwrap_or_default()
}
