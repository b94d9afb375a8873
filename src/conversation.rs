//! Conversation turns and the append-only log

use serde::{Deserialize, Serialize};

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Wire-format role name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message in the conversation
///
/// Immutable once appended to the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Who said it
    pub role: Role,

    /// What was said
    pub content: String,
}

impl Turn {
    /// Create a user turn
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant turn
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Append-only ordered log of conversation turns
///
/// Insertion order is causal conversation order and is never reordered or
/// truncated. Only the interaction controller writes to it.
#[derive(Debug, Clone, Default)]
pub struct ConversationLog {
    turns: Vec<Turn>,
}

impl ConversationLog {
    /// Create an empty log
    #[must_use]
    pub const fn new() -> Self {
        Self { turns: Vec::new() }
    }

    /// Append a turn
    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Read-only view of all turns in order
    #[must_use]
    pub fn all(&self) -> &[Turn] {
        &self.turns
    }

    /// Owned snapshot of all turns in order
    #[must_use]
    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns.clone()
    }

    /// Most recent turn, if any
    #[must_use]
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Number of turns
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether the log is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_preserves_order() {
        let mut log = ConversationLog::new();
        log.append(Turn::assistant("hello"));
        log.append(Turn::user("status report"));
        log.append(Turn::assistant("nominal"));

        let all = log.all();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0], Turn::assistant("hello"));
        assert_eq!(all[1], Turn::user("status report"));
        assert_eq!(all[2], Turn::assistant("nominal"));
    }

    #[test]
    fn roundtrip_n_turns() {
        let mut log = ConversationLog::new();
        let turns: Vec<Turn> = (0..10)
            .map(|i| {
                if i % 2 == 0 {
                    Turn::user(format!("question {i}"))
                } else {
                    Turn::assistant(format!("answer {i}"))
                }
            })
            .collect();

        for turn in &turns {
            log.append(turn.clone());
        }

        assert_eq!(log.all(), turns.as_slice());
        assert_eq!(log.len(), 10);
    }

    #[test]
    fn snapshot_is_independent() {
        let mut log = ConversationLog::new();
        log.append(Turn::user("first"));

        let snapshot = log.snapshot();
        log.append(Turn::assistant("second"));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn role_wire_names() {
        assert_eq!(Role::User.as_str(), "user");
        assert_eq!(Role::Assistant.as_str(), "assistant");

        let json = serde_json::to_string(&Turn::user("hi")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hi"}"#);
    }

    #[test]
    fn last_and_empty() {
        let mut log = ConversationLog::new();
        assert!(log.is_empty());
        assert!(log.last().is_none());

        log.append(Turn::assistant("greeting"));
        assert_eq!(log.last().unwrap().content, "greeting");
    }
}
