// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Runtime bootstrap
//!
//! Builds every dispatch service exactly once from a validated manifest and
//! hands out shared handles. Hosts keep the [`DispatchRuntime`] for the
//! process lifetime.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Composition root for the dispatch engine

use anyhow::{Context, Result};
use concierge_cortex::application::{
    EffectivenessTracker, EventBus as CortexEventBus, FeedbackLearner, KeywordPruner, LexicalIntentScorer,
    PatternStore, SessionMemory, StandardFeedbackLearner, VectorMemory,
};
use concierge_cortex::domain::ToolRegistry;
use concierge_cortex::infrastructure::HashEmbeddingClient;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::application::argument_extractor::ArgumentExtractor;
use crate::application::dispatch_service::{DispatchComponents, DispatchOrchestrator, DispatchSettings};
use crate::application::reference_resolver::ReferenceResolver;
use crate::application::repository_factory::{create_repositories, Repositories};
use crate::application::tool_invocation_service::ToolInvocationService;
use crate::domain::dispatch::ToolExecutor;
use crate::domain::dispatch_config::DispatchConfigManifest;
use crate::domain::identity::UserIdentityResolver;
use crate::infrastructure::event_bus::EventBus;

pub struct DispatchRuntime {
    pub config: DispatchConfigManifest,
    pub registry: Arc<ToolRegistry>,
    pub event_bus: EventBus,
    pub patterns: Arc<PatternStore>,
    pub effectiveness: Arc<EffectivenessTracker>,
    pub scorer: Arc<LexicalIntentScorer>,
    pub learner: Arc<dyn FeedbackLearner>,
    pub sessions: Arc<SessionMemory>,
    pub vectors: Arc<VectorMemory>,
    pub dispatch: Arc<DispatchOrchestrator>,
    pub pruner: Arc<KeywordPruner>,
    pub identity: UserIdentityResolver,
    repositories: Repositories,
}

impl DispatchRuntime {
    /// Validate the manifest, open its storage backend and build the services
    pub async fn build(config: DispatchConfigManifest) -> Result<Self> {
        config.validate().context("Invalid dispatch configuration")?;
        let repositories = create_repositories(&config.spec.storage)?;
        Self::with_repositories(config, repositories).await
    }

    pub async fn with_repositories(config: DispatchConfigManifest, repositories: Repositories) -> Result<Self> {
        config.validate().context("Invalid dispatch configuration")?;
        let spec = &config.spec;

        let registry = Arc::new(config.registry()?);

        let patterns = Arc::new(PatternStore::new(
            registry.clone(),
            &config.base_patterns(),
            repositories.profiles.clone(),
        )?);
        let profiles = patterns.load().await.context("Failed to load tool profiles")?;

        let effectiveness = Arc::new(EffectivenessTracker::with_repository(repositories.profiles.clone()));
        effectiveness.restore(&profiles);

        let scorer = Arc::new(LexicalIntentScorer::new(
            registry.clone(),
            Arc::new(config.keyword_extractor()),
            patterns.clone(),
            effectiveness.clone(),
        ));

        let event_bus = EventBus::with_default_capacity();
        let cortex_bus: Arc<dyn CortexEventBus> = Arc::new(event_bus.clone());

        let learner: Arc<dyn FeedbackLearner> = Arc::new(
            StandardFeedbackLearner::new(
                registry.clone(),
                scorer.clone(),
                patterns.clone(),
                effectiveness.clone(),
                cortex_bus.clone(),
            )
            .with_negation_words(spec.feedback.negation_words.clone()),
        );

        let sessions = Arc::new(SessionMemory::with_window(
            repositories.sessions.clone(),
            spec.memory.session_window,
        ));
        let vectors = Arc::new(
            VectorMemory::new(
                Arc::new(HashEmbeddingClient::new(spec.memory.embedding_dimensions)),
                repositories.vectors.clone(),
            )
            .with_timeout(spec.memory.embedding_timeout()),
        );

        let components = DispatchComponents {
            registry: registry.clone(),
            resolver: Arc::new(ReferenceResolver::from_config(spec)),
            arguments: Arc::new(ArgumentExtractor::from_config(spec)?),
            scorer: scorer.clone(),
            patterns: patterns.clone(),
            learner: learner.clone(),
            sessions: sessions.clone(),
            vectors: vectors.clone(),
            event_bus: event_bus.clone(),
        };
        let settings = DispatchSettings {
            fallback_tool: spec.fallback_tool.clone(),
            context_window: spec.memory.context_window,
            recall_k: spec.memory.recall_k,
            topic_cues: spec.topic_cues.clone(),
        };
        let dispatch = Arc::new(DispatchOrchestrator::new(components, settings));

        let pruner = Arc::new(KeywordPruner::new(learner.clone(), cortex_bus, spec.pruner.clone()));
        let identity = UserIdentityResolver::new(spec.identity.salt.clone());

        info!(
            config = %config.metadata.name,
            tools = registry.tools().len(),
            restored_profiles = profiles.len(),
            durable = repositories.store.is_some(),
            "Dispatch runtime ready"
        );

        Ok(Self {
            config,
            registry,
            event_bus,
            patterns,
            effectiveness,
            scorer,
            learner,
            sessions,
            vectors,
            dispatch,
            pruner,
            identity,
            repositories,
        })
    }

    pub fn invocation_service(&self, executor: Arc<dyn ToolExecutor>) -> ToolInvocationService {
        ToolInvocationService::new(executor, self.dispatch.clone())
    }

    /// Spawn the background keyword pruner. Returns `None` when the pruner is
    /// disabled; stop it through `pruner.shutdown_token()`.
    pub fn start_pruner(&self) -> Option<JoinHandle<()>> {
        if !self.config.spec.pruner.enabled {
            return None;
        }
        Some(self.pruner.clone().start())
    }

    /// Flush the durable backend, if any
    pub async fn flush(&self) -> Result<()> {
        if let Some(store) = &self.repositories.store {
            let bytes = store.flush().await.context("Failed to flush sled store")?;
            info!(bytes, "Flushed storage");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::dispatch_service::DispatchService;
    use crate::infrastructure::event_bus::DomainEvent;
    use concierge_cortex::domain::{CortexEvent, UserId};
    use std::time::Duration;

    #[tokio::test]
    async fn test_default_runtime_routes() {
        let runtime = DispatchRuntime::build(DispatchConfigManifest::default()).await.unwrap();
        let decision = runtime.dispatch.route(&UserId::new("u1"), "find me videos about Q").await;
        assert_eq!(decision.tool.as_str(), "search_videos");
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let mut config = DispatchConfigManifest::default();
        config.spec.fallback_tool = concierge_cortex::domain::ToolId::new("missing");
        assert!(DispatchRuntime::build(config).await.is_err());
    }

    #[tokio::test]
    async fn test_pruner_disabled_by_default() {
        let runtime = DispatchRuntime::build(DispatchConfigManifest::default()).await.unwrap();
        assert!(runtime.start_pruner().is_none());
    }

    #[tokio::test]
    async fn test_enabled_pruner_runs_cycle_and_stops() {
        let mut config = DispatchConfigManifest::default();
        config.spec.pruner.enabled = true;
        config.spec.pruner.interval_seconds = 3600;
        let runtime = DispatchRuntime::build(config).await.unwrap();
        let mut events = runtime.event_bus.subscribe();

        let handle = runtime.start_pruner().unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap();
        match event {
            DomainEvent::Cortex(CortexEvent::PruneCycleCompleted { count, .. }) => assert_eq!(count, 0),
            other => panic!("unexpected event: {}", other.event_type()),
        }

        runtime.pruner.shutdown_token().cancel();
        tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    }
}
