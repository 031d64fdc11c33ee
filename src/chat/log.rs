//! Chat log
//!
//! Append-only record of every exchange attempt. Entry order is the only
//! clock: it defines display order and round counting. Only successful
//! entries count as history.

use crate::core::{ChatEntry, ChatState, Result};

/// Selects successful entries by sender and/or recipient
///
/// With both sides set the filter matches the pair in either direction.
#[derive(Debug, Clone, Copy, Default)]
pub struct HistoryFilter<'a> {
    pub from: Option<&'a str>,
    pub to: Option<&'a str>,
}

impl<'a> HistoryFilter<'a> {
    /// Every successful entry
    pub fn all() -> Self {
        Self::default()
    }

    /// Entries sent by `from`
    pub fn from(from: &'a str) -> Self {
        Self {
            from: Some(from),
            to: None,
        }
    }

    /// Entries addressed to `to`
    pub fn to(to: &'a str) -> Self {
        Self {
            from: None,
            to: Some(to),
        }
    }

    /// Exchanges between `a` and `b`, in either direction
    pub fn between(a: &'a str, b: &'a str) -> Self {
        Self {
            from: Some(a),
            to: Some(b),
        }
    }

    fn matches(&self, entry: &ChatEntry) -> bool {
        match (self.from, self.to) {
            (None, None) => true,
            (Some(from), None) => entry.from == from,
            (None, Some(to)) => entry.to == to,
            (Some(a), Some(b)) => {
                (entry.from == a && entry.to == b) || (entry.from == b && entry.to == a)
            }
        }
    }
}

/// Ordered record of chat entries
#[derive(Debug, Clone, Default)]
pub struct ChatLog {
    entries: Vec<ChatEntry>,
}

impl ChatLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume from previously recorded entries
    pub fn from_entries(entries: Vec<ChatEntry>) -> Self {
        Self { entries }
    }

    /// Append an entry
    pub fn append(&mut self, entry: ChatEntry) {
        self.entries.push(entry);
    }

    /// Remove and return the last entry
    pub(crate) fn pop_last(&mut self) -> Option<ChatEntry> {
        self.entries.pop()
    }

    /// The most recent entry, whatever its state
    pub fn last(&self) -> Option<&ChatEntry> {
        self.entries.last()
    }

    /// The most recent entry addressed to `node`, whatever its state
    pub fn last_to(&self, node: &str) -> Option<&ChatEntry> {
        self.entries.iter().rev().find(|e| e.to == node)
    }

    /// All entries in order
    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Successful entries matching the filter, in order
    pub fn history(&self, filter: HistoryFilter<'_>) -> Vec<&ChatEntry> {
        self.entries
            .iter()
            .filter(|e| e.state == ChatState::Success && filter.matches(e))
            .collect()
    }

    /// Successful exchanges between a pair, in either direction
    pub fn round_count(&self, from: &str, to: &str) -> usize {
        self.history(HistoryFilter::between(from, to)).len()
    }

    /// Serialize the log as a JSON array of `{from, to, content, state}`
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.entries)?)
    }

    /// Load a log written by [`ChatLog::to_json`]
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self::from_entries(serde_json::from_str(json)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Route;

    fn sample() -> ChatLog {
        let ab = Route::new("a", "b");
        let mut log = ChatLog::new();
        log.append(ChatEntry::success(&ab, "hi"));
        log.append(ChatEntry::success(&ab.reversed(), "hello"));
        log.append(ChatEntry::error(&ab, "rate limited"));
        log.append(ChatEntry::success(&Route::new("c", "b"), "hey b"));
        log.append(ChatEntry::interrupt(&ab));
        log
    }

    #[test]
    fn test_only_success_counts() {
        let log = sample();
        assert_eq!(log.len(), 5);
        assert_eq!(log.round_count("a", "b"), 2);
        assert_eq!(log.round_count("b", "a"), 2);
        assert_eq!(log.history(HistoryFilter::all()).len(), 3);
    }

    #[test]
    fn test_one_sided_filters() {
        let log = sample();
        let to_b: Vec<_> = log
            .history(HistoryFilter::to("b"))
            .iter()
            .map(|e| e.content.as_str())
            .collect();
        assert_eq!(to_b, vec!["hi", "hey b"]);
        assert_eq!(log.history(HistoryFilter::from("b")).len(), 1);
    }

    #[test]
    fn test_last_to_ignores_state() {
        let log = sample();
        assert_eq!(log.last_to("b").unwrap().state, ChatState::Interrupt);
        assert!(log.last_to("z").is_none());
    }

    #[test]
    fn test_json_round_trip() {
        let log = sample();
        let restored = ChatLog::from_json(&log.to_json().unwrap()).unwrap();
        assert_eq!(restored.entries(), log.entries());
    }
}
