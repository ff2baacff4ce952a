// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Dispatch Orchestrator
//!
//! Composes reference resolution, lexical scoring, pattern overrides and
//! argument extraction into `route`, the single per-message entry point, and
//! writes outcomes and feedback back into memory and the learning layer.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Implements the dispatch call surface exposed to hosts
//! - **Related:** `concierge_cortex::application` (scoring, patterns, memory, learning)
//!
//! Routing reads shared state through snapshots and only commits the user
//! turn once the decision is final, so a cancelled `route` persists nothing.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use concierge_cortex::application::{
    FeedbackLearner, FeedbackOutcome, LearningAnalytics, LexicalIntentScorer, PatternStore, PatternSuggestion,
    SessionMemory, VectorMemory,
};
use concierge_cortex::domain::{
    Effectiveness, EmbeddingRecord, ScoredRecord, SessionStats, ToolId, ToolRegistry, Turn, UserId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::application::argument_extractor::ArgumentExtractor;
use crate::application::reference_resolver::ReferenceResolver;
use crate::domain::dispatch::{DecisionSource, RoutingDecision};
use crate::domain::events::DispatchEvent;
use crate::domain::reference::ReferenceAnalysis;
use crate::infrastructure::event_bus::EventBus;

/// Records inspected for `recent_topics`
const INSIGHT_RECORDS: usize = 10;

/// Per-user summary for hosts and the CLI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInsights {
    pub user_id: UserId,
    pub session: SessionStats,
    pub tool_usage: BTreeMap<ToolId, usize>,
    pub recent_topics: Vec<String>,
}

#[async_trait]
pub trait DispatchService: Send + Sync {
    /// Always returns a usable decision
    async fn route(&self, user_id: &UserId, message: &str) -> RoutingDecision;

    async fn record_outcome(&self, tool_id: &ToolId, success: bool) -> Result<Effectiveness>;

    /// Append the assistant turn and record the outcome of the executed tool
    async fn complete_turn(&self, user_id: &UserId, tool_id: &ToolId, result: &str, success: bool) -> Result<()>;

    async fn submit_feedback(
        &self,
        user_id: &UserId,
        message: &str,
        tool_id: &ToolId,
        feedback: &str,
    ) -> Result<FeedbackOutcome>;

    /// Weak supervision over the user's session. Returns keywords added.
    async fn learn_from_history(&self, user_id: &UserId) -> Result<usize>;

    async fn prune_learned_keywords(&self, min_hits: u64, max_age_days: i64) -> Result<usize>;

    async fn cleanup_sessions(&self, days: i64) -> Result<usize>;

    async fn user_insights(&self, user_id: &UserId) -> UserInsights;

    async fn export_analytics(&self) -> LearningAnalytics;

    fn suggest_patterns(&self, message: &str) -> Vec<PatternSuggestion>;

    /// Session turns, oldest first
    async fn recent_turns(&self, user_id: &UserId, k: usize) -> Vec<Turn>;

    /// Vector memory records, newest first
    async fn history(&self, user_id: &UserId, limit: usize) -> Result<Vec<EmbeddingRecord>>;

    async fn search_similar(&self, user_id: &UserId, query: &str, k: usize) -> Result<Vec<ScoredRecord>>;
}

/// Collaborators of the orchestrator, constructed once by the host
pub struct DispatchComponents {
    pub registry: Arc<ToolRegistry>,
    pub resolver: Arc<ReferenceResolver>,
    pub arguments: Arc<ArgumentExtractor>,
    pub scorer: Arc<LexicalIntentScorer>,
    pub patterns: Arc<PatternStore>,
    pub learner: Arc<dyn FeedbackLearner>,
    pub sessions: Arc<SessionMemory>,
    pub vectors: Arc<VectorMemory>,
    pub event_bus: EventBus,
}

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub fallback_tool: ToolId,
    /// Recent turns handed to the resolver
    pub context_window: usize,
    /// Records recalled from vector memory
    pub recall_k: usize,
    pub topic_cues: Vec<String>,
}

pub struct DispatchOrchestrator {
    components: DispatchComponents,
    settings: DispatchSettings,
}

impl DispatchOrchestrator {
    pub fn new(components: DispatchComponents, mut settings: DispatchSettings) -> Self {
        settings.topic_cues = settings
            .topic_cues
            .iter()
            .map(|cue| cue.trim().to_lowercase())
            .filter(|cue| !cue.is_empty())
            .collect();
        Self { components, settings }
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    /// Tool the raw message points at before any rewrite; used as the
    /// resolver's relevance hint.
    fn provisional_tool(&self, message: &str) -> Option<ToolId> {
        if let Some(tool) = self.components.patterns.match_pattern(message) {
            return Some(tool);
        }
        let (tool, confidence) = self.components.scorer.select_tool(message);
        (confidence > 0.0).then_some(tool)
    }

    /// Older records from vector memory, oldest first. None when nothing was
    /// recalled or the backend is degraded.
    async fn recall(&self, user_id: &UserId, message: &str) -> Option<Vec<Turn>> {
        match self
            .components
            .vectors
            .search_similar(user_id, message, self.settings.recall_k)
            .await
        {
            Ok(hits) if hits.is_empty() => None,
            Ok(hits) => {
                let mut turns: Vec<Turn> = hits.iter().map(|hit| hit.record.to_turn()).collect();
                turns.sort_by_key(|turn| turn.timestamp);
                debug!(user_id = %user_id, recalled = turns.len(), "Recalled turns from vector memory");
                Some(turns)
            }
            Err(e) => {
                warn!(user_id = %user_id, "Vector recall unavailable, routing lexical-only: {}", e);
                metrics::counter!("concierge_vector_degraded_total", "op" => "recall").increment(1);
                self.components
                    .event_bus
                    .publish_dispatch_event(DispatchEvent::VectorRecallDegraded {
                        user_id: user_id.clone(),
                        reason: e.to_string(),
                        degraded_at: Utc::now(),
                    });
                None
            }
        }
    }

    async fn resolve_reference(&self, user_id: &UserId, message: &str) -> ReferenceAnalysis {
        let history = self
            .components
            .sessions
            .get_recent(user_id, self.settings.context_window)
            .await;
        let hint = self.provisional_tool(message);
        let analysis = self.components.resolver.resolve(message, &history, hint.as_ref());

        if !analysis.has_reference || analysis.context_found {
            return analysis;
        }

        match self.recall(user_id, message).await {
            Some(recalled) => self.components.resolver.resolve(message, &recalled, hint.as_ref()),
            None => analysis,
        }
    }

    fn decide(&self, message: &str) -> (ToolId, DecisionSource, f64) {
        let (scored, confidence) = self.components.scorer.select_tool(message);
        match self.components.patterns.match_pattern(message) {
            Some(pattern) if pattern != scored => (pattern, DecisionSource::Pattern, confidence),
            Some(pattern) => (pattern, DecisionSource::Agreed, confidence),
            None if confidence <= 0.0 => (self.settings.fallback_tool.clone(), DecisionSource::Fallback, confidence),
            None => (scored, DecisionSource::Scorer, confidence),
        }
    }

    fn fallback_decision(&self, message: &str) -> RoutingDecision {
        let tool = self.settings.fallback_tool.clone();
        RoutingDecision {
            arguments: self.components.arguments.extract(&tool, message),
            tool,
            reference: None,
            source: DecisionSource::Fallback,
            confidence: 0.0,
        }
    }

    fn announce(&self, user_id: &UserId, decision: &RoutingDecision) {
        metrics::counter!(
            "concierge_routes_total",
            "tool" => decision.tool.to_string(),
            "source" => decision.source.as_str()
        )
        .increment(1);

        let reference = decision.reference.as_ref();
        info!(
            user_id = %user_id,
            tool_id = %decision.tool,
            source = decision.source.as_str(),
            confidence = decision.confidence,
            reference = reference.and_then(|r| r.reference_type).map(|t| t.as_str()),
            "Routed message"
        );

        self.components
            .event_bus
            .publish_dispatch_event(DispatchEvent::MessageRouted {
                user_id: user_id.clone(),
                tool_id: decision.tool.clone(),
                source: decision.source,
                confidence: decision.confidence,
                reference_type: reference.and_then(|r| r.reference_type),
                context_found: reference.is_some_and(|r| r.context_found),
                routed_at: Utc::now(),
            });
    }

    async fn append(&self, user_id: &UserId, turn: Turn) {
        self.components.sessions.append_turn(user_id, turn.clone()).await;
        self.components.vectors.spawn_add_turn(user_id.clone(), turn);
    }
}

#[async_trait]
impl DispatchService for DispatchOrchestrator {
    async fn route(&self, user_id: &UserId, message: &str) -> RoutingDecision {
        if message.trim().is_empty() {
            let decision = self.fallback_decision(message);
            self.announce(user_id, &decision);
            return decision;
        }

        let analysis = self.resolve_reference(user_id, message).await;
        let effective = analysis.resolved_message.clone();
        let (tool, source, confidence) = self.decide(&effective);

        let decision = RoutingDecision {
            arguments: self.components.arguments.extract(&tool, &effective),
            tool,
            reference: analysis.has_reference.then_some(analysis),
            source,
            confidence,
        };

        // Commit point
        self.append(user_id, Turn::user(message)).await;
        self.announce(user_id, &decision);
        decision
    }

    async fn record_outcome(&self, tool_id: &ToolId, success: bool) -> Result<Effectiveness> {
        self.components.learner.record_outcome(tool_id, success).await
    }

    async fn complete_turn(&self, user_id: &UserId, tool_id: &ToolId, result: &str, success: bool) -> Result<()> {
        self.components.registry.require(tool_id)?;

        let message = self.components.sessions.last_user_message(user_id).await;
        self.append(user_id, Turn::assistant(result, Some(tool_id.clone()))).await;

        let effectiveness = match message {
            Some(message) => self.components.learner.record_usage(&message, tool_id, success).await?,
            None => self.components.learner.record_outcome(tool_id, success).await?,
        };
        debug!(
            user_id = %user_id,
            tool_id = %tool_id,
            success,
            weight = effectiveness.weight(),
            "Completed turn"
        );

        self.components
            .event_bus
            .publish_dispatch_event(DispatchEvent::TurnCompleted {
                user_id: user_id.clone(),
                tool_id: tool_id.clone(),
                success,
                completed_at: Utc::now(),
            });
        Ok(())
    }

    async fn submit_feedback(
        &self,
        user_id: &UserId,
        message: &str,
        tool_id: &ToolId,
        feedback: &str,
    ) -> Result<FeedbackOutcome> {
        let outcome = self.components.learner.on_feedback(message, tool_id, feedback).await?;

        info!(
            user_id = %user_id,
            tool_id = %tool_id,
            kind = ?outcome.kind,
            alternative = outcome.alternative.as_ref().map(|t| t.as_str()),
            learned = outcome.learned_keywords.len(),
            "Applied feedback"
        );
        self.components
            .event_bus
            .publish_dispatch_event(DispatchEvent::FeedbackReceived {
                user_id: user_id.clone(),
                tool_id: tool_id.clone(),
                kind: outcome.kind,
                alternative: outcome.alternative.clone(),
                received_at: Utc::now(),
            });
        Ok(outcome)
    }

    async fn learn_from_history(&self, user_id: &UserId) -> Result<usize> {
        let turns = self
            .components
            .sessions
            .get_recent(user_id, self.components.sessions.window())
            .await;
        self.components.learner.analyze_history(&turns).await
    }

    async fn prune_learned_keywords(&self, min_hits: u64, max_age_days: i64) -> Result<usize> {
        self.components.learner.prune_learned_keywords(min_hits, max_age_days).await
    }

    async fn cleanup_sessions(&self, days: i64) -> Result<usize> {
        let removed = self.components.sessions.cleanup_older_than(days).await?;
        info!(removed, days, "Cleaned up idle sessions");
        Ok(removed)
    }

    async fn user_insights(&self, user_id: &UserId) -> UserInsights {
        let session = self.components.sessions.stats(user_id).await;

        let tool_usage = match self.components.vectors.tool_usage_stats(user_id).await {
            Ok(usage) => usage.into_iter().collect(),
            Err(e) => {
                warn!(user_id = %user_id, "Tool usage unavailable: {}", e);
                BTreeMap::new()
            }
        };

        let contents: Vec<String> = match self.components.vectors.get_history(user_id, INSIGHT_RECORDS).await {
            Ok(records) => records.into_iter().map(|r| r.content).collect(),
            Err(e) => {
                warn!(user_id = %user_id, "Vector history unavailable, using session: {}", e);
                self.components
                    .sessions
                    .get_recent(user_id, INSIGHT_RECORDS)
                    .await
                    .into_iter()
                    .map(|t| t.content)
                    .collect()
            }
        };
        let lowered: Vec<String> = contents.iter().map(|c| c.to_lowercase()).collect();
        let recent_topics = self
            .settings
            .topic_cues
            .iter()
            .filter(|cue| lowered.iter().any(|content| content.contains(cue.as_str())))
            .cloned()
            .collect();

        UserInsights {
            user_id: user_id.clone(),
            session,
            tool_usage,
            recent_topics,
        }
    }

    async fn export_analytics(&self) -> LearningAnalytics {
        self.components.learner.export_analytics().await
    }

    fn suggest_patterns(&self, message: &str) -> Vec<PatternSuggestion> {
        self.components.learner.suggest_patterns(message)
    }

    async fn recent_turns(&self, user_id: &UserId, k: usize) -> Vec<Turn> {
        self.components.sessions.get_recent(user_id, k).await
    }

    async fn history(&self, user_id: &UserId, limit: usize) -> Result<Vec<EmbeddingRecord>> {
        Ok(self.components.vectors.get_history(user_id, limit).await?)
    }

    async fn search_similar(&self, user_id: &UserId, query: &str, k: usize) -> Result<Vec<ScoredRecord>> {
        Ok(self.components.vectors.search_similar(user_id, query, k).await?)
    }
}
