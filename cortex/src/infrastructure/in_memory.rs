// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-memory repositories for development and tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::{
    cosine_distance, Effectiveness, EmbeddingRecord, LearnedKeyword, ScoredRecord, Session,
    ToolId, ToolProfile, UserId,
};
use crate::infrastructure::repository::{
    RepositoryError, SessionRepository, ToolProfileRepository, VectorIndex,
};

#[derive(Default)]
pub struct InMemorySessionRepository {
    sessions: Arc<RwLock<HashMap<UserId, Session>>>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn load(&self, user_id: &UserId) -> Result<Option<Session>, RepositoryError> {
        Ok(self.sessions.read().await.get(user_id).cloned())
    }

    async fn save(&self, session: &Session) -> Result<(), RepositoryError> {
        self.sessions
            .write()
            .await
            .insert(session.user_id.clone(), session.clone());
        Ok(())
    }

    async fn delete(&self, user_id: &UserId) -> Result<(), RepositoryError> {
        self.sessions.write().await.remove(user_id);
        Ok(())
    }

    async fn list_user_ids(&self) -> Result<Vec<UserId>, RepositoryError> {
        let mut ids: Vec<UserId> = self.sessions.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

#[derive(Default)]
pub struct InMemoryToolProfileRepository {
    profiles: Arc<RwLock<HashMap<ToolId, ToolProfile>>>,
}

impl InMemoryToolProfileRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ToolProfileRepository for InMemoryToolProfileRepository {
    async fn load_all(&self) -> Result<Vec<ToolProfile>, RepositoryError> {
        let mut profiles: Vec<ToolProfile> = self.profiles.read().await.values().cloned().collect();
        profiles.sort_by(|a, b| a.tool_id.cmp(&b.tool_id));
        Ok(profiles)
    }

    async fn save_learned(
        &self,
        tool_id: &ToolId,
        keywords: &[LearnedKeyword],
    ) -> Result<(), RepositoryError> {
        let mut profiles = self.profiles.write().await;
        let profile = profiles
            .entry(tool_id.clone())
            .or_insert_with(|| ToolProfile::new(tool_id.clone()));
        profile.learned_keywords = keywords.to_vec();
        profile.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn save_effectiveness(
        &self,
        tool_id: &ToolId,
        effectiveness: Effectiveness,
    ) -> Result<(), RepositoryError> {
        let mut profiles = self.profiles.write().await;
        let profile = profiles
            .entry(tool_id.clone())
            .or_insert_with(|| ToolProfile::new(tool_id.clone()));
        profile.effectiveness = effectiveness;
        profile.updated_at = chrono::Utc::now();
        Ok(())
    }
}

/// Brute-force cosine index, one bucket per user
#[derive(Default)]
pub struct InMemoryVectorIndex {
    records: Arc<RwLock<HashMap<UserId, Vec<EmbeddingRecord>>>>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn insert(&self, record: EmbeddingRecord) -> Result<(), RepositoryError> {
        self.records
            .write()
            .await
            .entry(record.user_id.clone())
            .or_default()
            .push(record);
        Ok(())
    }

    async fn search(
        &self,
        user_id: &UserId,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredRecord>, RepositoryError> {
        let records = self.records.read().await;
        let Some(bucket) = records.get(user_id) else {
            return Ok(Vec::new());
        };

        Ok(rank_by_distance(bucket.iter(), query, limit))
    }

    async fn history(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<EmbeddingRecord>, RepositoryError> {
        let records = self.records.read().await;
        let mut history: Vec<EmbeddingRecord> = records.get(user_id).cloned().unwrap_or_default();
        history.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        history.truncate(limit);
        Ok(history)
    }
}

/// Ascending distance; equal distances keep insertion order.
pub(crate) fn rank_by_distance<'a>(
    records: impl Iterator<Item = &'a EmbeddingRecord>,
    query: &[f32],
    limit: usize,
) -> Vec<ScoredRecord> {
    let mut scored: Vec<ScoredRecord> = records
        .map(|record| ScoredRecord {
            distance: cosine_distance(query, &record.embedding),
            record: record.clone(),
        })
        .collect();

    scored.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(limit);
    scored
}
