// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use concierge_cortex::application::FeedbackKind;
use concierge_cortex::domain::{ToolId, UserId};
use serde::{Deserialize, Serialize};

use crate::domain::dispatch::DecisionSource;
use crate::domain::reference::ReferenceType;

/// Dispatch lifecycle events, one stream per engine instance
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DispatchEvent {
    MessageRouted {
        user_id: UserId,
        tool_id: ToolId,
        source: DecisionSource,
        confidence: f64,
        reference_type: Option<ReferenceType>,
        context_found: bool,
        routed_at: DateTime<Utc>,
    },
    TurnCompleted {
        user_id: UserId,
        tool_id: ToolId,
        success: bool,
        completed_at: DateTime<Utc>,
    },
    FeedbackReceived {
        user_id: UserId,
        tool_id: ToolId,
        kind: FeedbackKind,
        alternative: Option<ToolId>,
        received_at: DateTime<Utc>,
    },
    /// Vector recall was skipped; routing continued lexical-only
    VectorRecallDegraded {
        user_id: UserId,
        reason: String,
        degraded_at: DateTime<Utc>,
    },
}

impl DispatchEvent {
    pub fn user_id(&self) -> &UserId {
        match self {
            DispatchEvent::MessageRouted { user_id, .. }
            | DispatchEvent::TurnCompleted { user_id, .. }
            | DispatchEvent::FeedbackReceived { user_id, .. }
            | DispatchEvent::VectorRecallDegraded { user_id, .. } => user_id,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            DispatchEvent::MessageRouted { routed_at, .. } => *routed_at,
            DispatchEvent::TurnCompleted { completed_at, .. } => *completed_at,
            DispatchEvent::FeedbackReceived { received_at, .. } => *received_at,
            DispatchEvent::VectorRecallDegraded { degraded_at, .. } => *degraded_at,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            DispatchEvent::MessageRouted { .. } => "message_routed",
            DispatchEvent::TurnCompleted { .. } => "turn_completed",
            DispatchEvent::FeedbackReceived { .. } => "feedback_received",
            DispatchEvent::VectorRecallDegraded { .. } => "vector_recall_degraded",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = DispatchEvent::TurnCompleted {
            user_id: UserId::new("u1"),
            tool_id: ToolId::new("search_videos"),
            success: true,
            completed_at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "turn_completed");
        assert_eq!(json["tool_id"], "search_videos");
        assert_eq!(event.event_type(), "turn_completed");
        assert_eq!(event.user_id().as_str(), "u1");
    }
}
