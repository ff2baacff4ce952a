// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Keyword Pruner - opt-in background maintenance of learned keywords
//!
//! Periodically removes learned keywords that never registered a usage hit.
//! Routing itself never prunes; this task and the CLI `prune` command are the
//! only callers of `prune_learned_keywords`.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Interval loop with graceful shutdown via `CancellationToken`

use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::feedback_learner::{EventBus, FeedbackLearner};
use crate::domain::CortexEvent;

/// Configuration for the keyword pruner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordPrunerConfig {
    /// Keywords with fewer hits than this are candidates for pruning
    #[serde(default = "default_min_hits")]
    pub min_hits: u64,

    /// Only keywords learned more than this many days ago are pruned
    #[serde(default = "default_max_age_days")]
    pub max_age_days: i64,

    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,

    /// Off unless explicitly enabled
    #[serde(default)]
    pub enabled: bool,
}

fn default_min_hits() -> u64 {
    1
}

fn default_max_age_days() -> i64 {
    30
}

fn default_interval_seconds() -> u64 {
    86_400
}

impl Default for KeywordPrunerConfig {
    fn default() -> Self {
        Self {
            min_hits: default_min_hits(),
            max_age_days: default_max_age_days(),
            interval_seconds: default_interval_seconds(),
            enabled: false,
        }
    }
}

pub struct KeywordPruner {
    learner: Arc<dyn FeedbackLearner>,
    event_bus: Arc<dyn EventBus>,
    config: KeywordPrunerConfig,
    shutdown_token: CancellationToken,
}

impl KeywordPruner {
    pub fn new(
        learner: Arc<dyn FeedbackLearner>,
        event_bus: Arc<dyn EventBus>,
        config: KeywordPrunerConfig,
    ) -> Self {
        Self {
            learner,
            event_bus,
            config,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Get a handle to trigger shutdown
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        if !self.config.enabled {
            info!("Keyword pruner is disabled");
            return;
        }

        info!(
            interval_seconds = self.config.interval_seconds,
            min_hits = self.config.min_hits,
            max_age_days = self.config.max_age_days,
            "Starting keyword pruner background task"
        );

        let mut tick = interval(Duration::from_secs(self.config.interval_seconds.max(1)));

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    debug!("Running keyword pruner cycle");
                    match self.prune_cycle().await {
                        Ok(pruned_count) => info!(pruned_count, "Keyword pruner cycle completed"),
                        Err(e) => warn!("Keyword pruner cycle failed: {}", e),
                    }
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("Shutdown signal received, stopping keyword pruner");
                    break;
                }
            }
        }

        info!("Keyword pruner background task stopped");
    }

    /// Execute a single pruning cycle
    pub async fn prune_cycle(&self) -> Result<usize> {
        let started = Utc::now();
        let count = self
            .learner
            .prune_learned_keywords(self.config.min_hits, self.config.max_age_days)
            .await?;

        self.event_bus
            .publish(CortexEvent::PruneCycleCompleted {
                count,
                min_hits: self.config.min_hits,
                max_age_days: self.config.max_age_days,
                pruned_at: started,
            })
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::feedback_learner::{FeedbackKind, FeedbackOutcome, LearningAnalytics, PatternSuggestion};
    use crate::domain::{Effectiveness, ToolId, Turn};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockLearner {
        prune_count: usize,
        prune_calls: AtomicUsize,
    }

    impl MockLearner {
        fn new(prune_count: usize) -> Self {
            Self { prune_count, prune_calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl FeedbackLearner for MockLearner {
        async fn record_outcome(&self, _tool_id: &ToolId, _success: bool) -> Result<Effectiveness> {
            Ok(Effectiveness::default())
        }

        async fn record_usage(&self, _message: &str, _tool_id: &ToolId, _success: bool) -> Result<Effectiveness> {
            Ok(Effectiveness::default())
        }

        async fn on_feedback(&self, _message: &str, selected_tool: &ToolId, _feedback: &str) -> Result<FeedbackOutcome> {
            Ok(FeedbackOutcome {
                kind: FeedbackKind::Positive,
                selected_tool: selected_tool.clone(),
                alternative: None,
                learned_keywords: vec![],
            })
        }

        async fn analyze_history(&self, _turns: &[Turn]) -> Result<usize> {
            Ok(0)
        }

        async fn prune_learned_keywords(&self, _min_hits: u64, _max_age_days: i64) -> Result<usize> {
            self.prune_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.prune_count)
        }

        fn suggest_patterns(&self, _message: &str) -> Vec<PatternSuggestion> {
            vec![]
        }

        async fn export_analytics(&self) -> LearningAnalytics {
            LearningAnalytics {
                learned_keywords: vec![],
                effectiveness: vec![],
                keyword_frequency: HashMap::new(),
                top_keywords: vec![],
                generated_at: Utc::now(),
            }
        }
    }

    struct MockEventBus;

    #[async_trait]
    impl EventBus for MockEventBus {
        async fn publish(&self, _event: CortexEvent) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_pruner_is_disabled_by_default() {
        let config = KeywordPrunerConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.min_hits, 1);
        assert_eq!(config.max_age_days, 30);
    }

    #[tokio::test]
    async fn test_prune_cycle() {
        let learner = Arc::new(MockLearner::new(42));
        let pruner = KeywordPruner::new(learner.clone(), Arc::new(MockEventBus), KeywordPrunerConfig::default());

        assert_eq!(pruner.prune_cycle().await.unwrap(), 42);
        assert_eq!(learner.prune_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_disabled_pruner_never_prunes() {
        let learner = Arc::new(MockLearner::new(0));
        let pruner = Arc::new(KeywordPruner::new(
            learner.clone(),
            Arc::new(MockEventBus),
            KeywordPrunerConfig::default(),
        ));

        pruner.start().await.unwrap();
        assert_eq!(learner.prune_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_enabled_pruner_stops_on_cancel() {
        let learner = Arc::new(MockLearner::new(3));
        let config = KeywordPrunerConfig {
            enabled: true,
            interval_seconds: 3600,
            ..Default::default()
        };
        let pruner = Arc::new(KeywordPruner::new(learner.clone(), Arc::new(MockEventBus), config));
        let token = pruner.shutdown_token();

        let handle = pruner.start();
        // The first interval tick fires immediately.
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
        handle.await.unwrap();

        assert_eq!(learner.prune_calls.load(Ordering::SeqCst), 1);
    }
}
