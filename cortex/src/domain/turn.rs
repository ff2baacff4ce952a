// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Conversation turns and per-user sessions
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Bounded, append-only per-user turn log

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use super::tool::ToolId;

/// Number of turns a session keeps before evicting the oldest.
pub const DEFAULT_SESSION_WINDOW: usize = 50;

/// Pseudonymous user identifier (`user_<16 hex>` when derived).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message in a conversation. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_used: Option<ToolId>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
            tool_used: None,
            metadata: HashMap::new(),
        }
    }

    pub fn assistant(content: impl Into<String>, tool_used: Option<ToolId>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
            tool_used,
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }

    /// The tool that produced this turn, for assistant turns only.
    pub fn produced_by(&self) -> Option<&ToolId> {
        if self.is_assistant() {
            self.tool_used.as_ref()
        } else {
            None
        }
    }
}

/// Per-user turn log capped at a window of the most recent turns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: UserId,
    turns: Vec<Turn>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    /// Lifetime count; eviction does not reduce it.
    #[serde(default)]
    pub total_turns: u64,
}

impl Session {
    pub fn new(user_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            turns: Vec::new(),
            created_at: now,
            last_activity: now,
            total_turns: 0,
        }
    }

    /// Append then evict so exactly the newest `window` turns remain.
    pub fn append(&mut self, turn: Turn, window: usize) {
        self.turns.push(turn);
        self.total_turns = self.total_turns.saturating_add(1);
        self.last_activity = Utc::now();

        if self.turns.len() > window {
            let overflow = self.turns.len() - window;
            self.turns.drain(..overflow);
        }
    }

    /// The most recent `min(k, len)` turns, oldest first.
    pub fn recent(&self, k: usize) -> Vec<Turn> {
        let start = self.turns.len().saturating_sub(k);
        self.turns[start..].to_vec()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            total_turns: self.total_turns,
            created_at: Some(self.created_at),
            last_activity: Some(self.last_activity),
            current_window: self.turns.len(),
        }
    }

    pub fn last_user_message(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role == Role::User)
            .map(|t| t.content.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub total_turns: u64,
    pub created_at: Option<DateTime<Utc>>,
    pub last_activity: Option<DateTime<Utc>>,
    pub current_window: usize,
}
