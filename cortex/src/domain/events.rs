// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Domain events for the learning layer
//! Published to the EventBus whenever routing rules or counters change

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::tool::ToolId;

/// Cortex domain events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CortexEvent {
    /// A keyword was added to a tool's learned set
    KeywordLearned {
        tool_id: ToolId,
        keyword: String,
        source: LearningSource,
        timestamp: DateTime<Utc>,
    },

    /// An outcome counter was incremented
    OutcomeRecorded {
        tool_id: ToolId,
        success: bool,
        success_count: u64,
        failure_count: u64,
        timestamp: DateTime<Utc>,
    },

    /// Explicit user feedback was applied
    FeedbackApplied {
        selected_tool: ToolId,
        negative: bool,
        alternative: Option<ToolId>,
        keywords_learned: usize,
        timestamp: DateTime<Utc>,
    },

    /// A batch pass over conversation history finished
    HistoryAnalyzed {
        turns_analyzed: usize,
        keywords_added: usize,
        timestamp: DateTime<Utc>,
    },

    /// Unused learned keywords were removed from a tool
    KeywordsPruned {
        tool_id: ToolId,
        keywords: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    /// A pruning cycle completed
    PruneCycleCompleted {
        count: usize,
        min_hits: u64,
        max_age_days: i64,
        pruned_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningSource {
    Feedback,
    History,
    /// A failed execution taught the other tools
    FailedExecution,
}

impl CortexEvent {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            CortexEvent::KeywordLearned { timestamp, .. } => *timestamp,
            CortexEvent::OutcomeRecorded { timestamp, .. } => *timestamp,
            CortexEvent::FeedbackApplied { timestamp, .. } => *timestamp,
            CortexEvent::HistoryAnalyzed { timestamp, .. } => *timestamp,
            CortexEvent::KeywordsPruned { timestamp, .. } => *timestamp,
            CortexEvent::PruneCycleCompleted { pruned_at, .. } => *pruned_at,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            CortexEvent::KeywordLearned { .. } => "keyword_learned",
            CortexEvent::OutcomeRecorded { .. } => "outcome_recorded",
            CortexEvent::FeedbackApplied { .. } => "feedback_applied",
            CortexEvent::HistoryAnalyzed { .. } => "history_analyzed",
            CortexEvent::KeywordsPruned { .. } => "keywords_pruned",
            CortexEvent::PruneCycleCompleted { .. } => "prune_cycle_completed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = CortexEvent::KeywordLearned {
            tool_id: ToolId::from("search_videos"),
            keyword: "주식".to_string(),
            source: LearningSource::Feedback,
            timestamp: Utc::now(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "keyword_learned");
        assert_eq!(json["source"], "feedback");
        assert_eq!(event.event_type(), "keyword_learned");
    }
}
