// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use concierge_core::application::{DispatchRuntime, DispatchService, Repositories};
use concierge_core::domain::dispatch::{DecisionSource, ToolExecutionError, ToolExecutor};
use concierge_core::domain::dispatch_config::DispatchConfigManifest;
use concierge_cortex::application::FeedbackKind;
use concierge_cortex::domain::{ToolId, UserId};
use concierge_cortex::infrastructure::SledStore;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

async fn runtime() -> DispatchRuntime {
    DispatchRuntime::build(DispatchConfigManifest::default())
        .await
        .expect("default runtime")
}

async fn wait_for_records(runtime: &DispatchRuntime, user: &UserId, count: usize) {
    for _ in 0..100 {
        let history = runtime.dispatch.history(user, usize::MAX).await.unwrap();
        if history.len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("vector memory never reached {} records", count);
}

struct FailingExecutor;

#[async_trait]
impl ToolExecutor for FailingExecutor {
    async fn execute(&self, tool_id: &ToolId, _arguments: &Map<String, Value>) -> Result<String, ToolExecutionError> {
        Err(ToolExecutionError::Failed {
            tool_id: tool_id.clone(),
            message: "quota exceeded".to_string(),
        })
    }
}

#[tokio::test]
async fn test_negative_feedback_reclassifies_toward_alternative() {
    let runtime = runtime().await;
    let user = UserId::new("alice");
    let trending = ToolId::new("trending_videos");
    let search = ToolId::new("search_videos");
    let message = "popular stock clips";

    let before = runtime.dispatch.route(&user, message).await;
    assert_eq!(before.tool, trending);
    let search_before = runtime
        .scorer
        .score(message)
        .into_iter()
        .find(|s| s.tool_id == search)
        .unwrap()
        .score;

    let outcome = runtime
        .dispatch
        .submit_feedback(&user, message, &trending, "wrong")
        .await
        .unwrap();

    assert_eq!(outcome.kind, FeedbackKind::Negative);
    assert_eq!(outcome.alternative, Some(search.clone()));
    assert_eq!(outcome.learned_keywords, vec!["stock".to_string()]);

    assert_eq!(runtime.effectiveness.get(&trending).failure, 1);
    assert_eq!(runtime.effectiveness.get(&trending).success, 0);
    assert_eq!(runtime.effectiveness.get(&search).success, 1);

    let search_after = runtime
        .scorer
        .score(message)
        .into_iter()
        .find(|s| s.tool_id == search)
        .unwrap()
        .score;
    assert!(search_after >= search_before);

    // The learned literal now matches ahead of the trending pattern
    let after = runtime.dispatch.route(&user, message).await;
    assert_eq!(after.tool, search);
    assert_eq!(after.source, DecisionSource::Agreed);
}

#[tokio::test]
async fn test_positive_feedback_counts_success_only() {
    let runtime = runtime().await;
    let search = ToolId::new("search_videos");

    let outcome = runtime
        .dispatch
        .submit_feedback(&UserId::new("alice"), "find me videos about Q", &search, "great, thanks")
        .await
        .unwrap();

    assert_eq!(outcome.kind, FeedbackKind::Positive);
    assert!(outcome.alternative.is_none());
    assert_eq!(runtime.effectiveness.get(&search).success, 1);
    assert_eq!(runtime.effectiveness.get(&search).failure, 0);
}

#[tokio::test]
async fn test_record_outcome_counts_exactly() {
    let runtime = runtime().await;
    let tool = ToolId::new("tell_joke");

    for _ in 0..5 {
        runtime.dispatch.record_outcome(&tool, true).await.unwrap();
    }
    let effectiveness = runtime.effectiveness.get(&tool);
    assert_eq!(effectiveness.success, 5);
    assert_eq!(effectiveness.failure, 0);

    assert!(runtime
        .dispatch
        .record_outcome(&ToolId::new("not_registered"), true)
        .await
        .is_err());
}

#[tokio::test]
async fn test_completed_turns_feed_insights() {
    let runtime = runtime().await;
    let user = UserId::new("alice");
    let search = ToolId::new("search_videos");

    runtime.dispatch.route(&user, "주식 유튜브 검색해줘").await;
    runtime
        .dispatch
        .complete_turn(&user, &search, "📺 삼성전자 주가 전망", true)
        .await
        .unwrap();
    wait_for_records(&runtime, &user, 2).await;

    let insights = runtime.dispatch.user_insights(&user).await;
    assert_eq!(insights.session.total_turns, 2);
    assert_eq!(insights.session.current_window, 2);
    assert_eq!(insights.tool_usage.get(&search), Some(&1));
    assert_eq!(insights.recent_topics, vec!["주식".to_string()]);
    assert_eq!(runtime.effectiveness.get(&search).success, 1);
}

#[tokio::test]
async fn test_failed_execution_records_failure() {
    let runtime = runtime().await;
    let user = UserId::new("alice");

    let decision = runtime.dispatch.route(&user, "find me videos about Q").await;
    let invocation = runtime
        .invocation_service(Arc::new(FailingExecutor))
        .invoke(&user, &decision)
        .await
        .unwrap();

    assert!(!invocation.success);
    assert!(invocation.output.starts_with("Error: "));
    assert_eq!(runtime.effectiveness.get(&decision.tool).failure, 1);

    let turns = runtime.dispatch.recent_turns(&user, 10).await;
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[1].tool_used, Some(decision.tool.clone()));
}

#[tokio::test]
async fn test_failed_execution_teaches_other_tools() {
    let runtime = runtime().await;
    let user = UserId::new("alice");
    let search = ToolId::new("search_videos");
    let trending = ToolId::new("trending_videos");

    let decision = runtime.dispatch.route(&user, "popular stock clips").await;
    assert_eq!(decision.tool, trending);

    runtime
        .invocation_service(Arc::new(FailingExecutor))
        .invoke(&user, &decision)
        .await
        .unwrap();

    let snapshot = runtime.patterns.snapshot();
    assert!(snapshot.is_learned(&search, "stock"));
    assert!(!snapshot.is_learned(&trending, "stock"));
    assert_eq!(runtime.effectiveness.get(&trending).failure, 1);
}

#[tokio::test]
async fn test_learn_from_history_adds_keywords() {
    let runtime = runtime().await;
    let user = UserId::new("alice");

    runtime.dispatch.route(&user, "stock market clips").await;
    let added = runtime.dispatch.learn_from_history(&user).await.unwrap();
    assert!(added >= 1);

    let snapshot = runtime.patterns.snapshot();
    assert!(snapshot.is_learned(&ToolId::new("search_videos"), "stock"));
}

#[tokio::test]
async fn test_learned_state_survives_restart_on_sled() {
    let dir = tempfile::tempdir().unwrap();
    let store = SledStore::open(dir.path().join("concierge.db")).unwrap();
    let user = UserId::new("alice");
    let trending = ToolId::new("trending_videos");
    let search = ToolId::new("search_videos");

    {
        let runtime = DispatchRuntime::with_repositories(
            DispatchConfigManifest::default(),
            Repositories::sled(store.clone()).unwrap(),
        )
        .await
        .unwrap();

        runtime.dispatch.route(&user, "popular stock clips").await;
        runtime
            .dispatch
            .submit_feedback(&user, "popular stock clips", &trending, "no")
            .await
            .unwrap();
        runtime.flush().await.unwrap();
    }

    let restarted = DispatchRuntime::with_repositories(
        DispatchConfigManifest::default(),
        Repositories::sled(store).unwrap(),
    )
    .await
    .unwrap();

    assert!(restarted.patterns.snapshot().is_learned(&search, "stock"));
    assert_eq!(restarted.effectiveness.get(&trending).failure, 1);
    assert_eq!(restarted.effectiveness.get(&search).success, 1);

    let turns = restarted.dispatch.recent_turns(&user, 10).await;
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].content, "popular stock clips");

    let decision = restarted.dispatch.route(&user, "popular stock clips").await;
    assert_eq!(decision.tool, search);
}
