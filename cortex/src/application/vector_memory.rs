// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Vector Memory
//!
//! Unbounded per-user similarity index over embedded turns.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Embedding with a bounded timeout, user-scoped search and history
//!
//! Writes are fire-and-forget: an unavailable or slow embedding backend skips
//! the write and logs it. Reads report failures so callers can fall back to
//! lexical-only routing.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::{EmbeddingRecord, ScoredRecord, ToolId, Turn, UserId};
use crate::infrastructure::{EmbeddingError, EmbeddingProvider, RepositoryError, VectorIndex};

pub const DEFAULT_EMBEDDING_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Storage(#[from] RepositoryError),
}

pub struct VectorMemory {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    timeout: Duration,
}

impl VectorMemory {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            embedder,
            index,
            timeout: DEFAULT_EMBEDDING_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        match tokio::time::timeout(self.timeout, self.embedder.embed(text)).await {
            Ok(result) => result,
            Err(_) => Err(EmbeddingError::Timeout(self.timeout.as_millis() as u64)),
        }
    }

    /// Embed and store one turn. Returns whether the record was written.
    pub async fn add_turn(&self, user_id: &UserId, turn: &Turn) -> bool {
        let embedding = match self.embed(&turn.content).await {
            Ok(embedding) => embedding,
            Err(e) => {
                warn!(user_id = %user_id, "Skipping vector write: {}", e);
                metrics::counter!("concierge_vector_degraded_total", "op" => "write").increment(1);
                return false;
            }
        };

        let record = EmbeddingRecord::from_turn(user_id.clone(), turn, embedding);
        match self.index.insert(record).await {
            Ok(()) => {
                debug!(user_id = %user_id, "Stored turn embedding");
                true
            }
            Err(e) => {
                warn!(user_id = %user_id, "Vector index write failed: {}", e);
                metrics::counter!("concierge_vector_degraded_total", "op" => "write").increment(1);
                false
            }
        }
    }

    /// Spawn `add_turn` on the runtime so the caller never waits on it
    pub fn spawn_add_turn(self: &Arc<Self>, user_id: UserId, turn: Turn) -> JoinHandle<bool> {
        let memory = Arc::clone(self);
        tokio::spawn(async move { memory.add_turn(&user_id, &turn).await })
    }

    /// Up to `k` of the user's records closest to `query`, ascending distance
    pub async fn search_similar(
        &self,
        user_id: &UserId,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredRecord>, MemoryError> {
        let embedding = self.embed(query).await?;
        let search = self.index.search(user_id, &embedding, k);
        let hits = match tokio::time::timeout(self.timeout, search).await {
            Ok(result) => result?,
            Err(_) => return Err(EmbeddingError::Timeout(self.timeout.as_millis() as u64).into()),
        };
        Ok(hits)
    }

    /// Up to `limit` of the user's records, newest first
    pub async fn get_history(&self, user_id: &UserId, limit: usize) -> Result<Vec<EmbeddingRecord>, MemoryError> {
        Ok(self.index.history(user_id, limit).await?)
    }

    /// Number of stored records per tool for one user
    pub async fn tool_usage_stats(&self, user_id: &UserId) -> Result<HashMap<ToolId, usize>, MemoryError> {
        let records = self.index.history(user_id, usize::MAX).await?;
        let mut usage = HashMap::new();
        for tool in records.into_iter().filter_map(|r| r.tool_used) {
            *usage.entry(tool).or_insert(0) += 1;
        }
        Ok(usage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::{HashEmbeddingClient, InMemoryVectorIndex};
    use async_trait::async_trait;

    struct StalledEmbedder;

    #[async_trait]
    impl EmbeddingProvider for StalledEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(vec![1.0])
        }

        fn dimensions(&self) -> usize {
            1
        }
    }

    fn memory() -> VectorMemory {
        VectorMemory::new(
            Arc::new(HashEmbeddingClient::new(128)),
            Arc::new(InMemoryVectorIndex::new()),
        )
    }

    #[tokio::test]
    async fn test_search_never_crosses_users() {
        let memory = memory();
        let u1 = UserId::new("u1");
        let u2 = UserId::new("u2");
        memory.add_turn(&u1, &Turn::user("rust async runtime")).await;
        memory.add_turn(&u2, &Turn::user("rust async runtime")).await;
        memory.add_turn(&u2, &Turn::user("rust tokio")).await;

        let hits = memory.search_similar(&u1, "rust runtime", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits.iter().all(|h| h.record.user_id == u1));
    }

    #[tokio::test]
    async fn test_timeout_skips_write_and_fails_search() {
        let memory = VectorMemory::new(Arc::new(StalledEmbedder), Arc::new(InMemoryVectorIndex::new()))
            .with_timeout(Duration::from_millis(20));
        let user = UserId::new("u");

        assert!(!memory.add_turn(&user, &Turn::user("hello")).await);
        let result = memory.search_similar(&user, "hello", 3).await;
        assert!(matches!(result, Err(MemoryError::Embedding(EmbeddingError::Timeout(20)))));
        assert!(memory.get_history(&user, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tool_usage_counts_assistant_records() {
        let memory = Arc::new(memory());
        let user = UserId::new("u");
        let search = ToolId::from("search_videos");
        memory
            .spawn_add_turn(user.clone(), Turn::assistant("📺 a", Some(search.clone())))
            .await
            .unwrap();
        memory
            .spawn_add_turn(user.clone(), Turn::assistant("📺 b", Some(search.clone())))
            .await
            .unwrap();
        memory.spawn_add_turn(user.clone(), Turn::user("hi")).await.unwrap();

        let usage = memory.tool_usage_stats(&user).await.unwrap();
        assert_eq!(usage.get(&search), Some(&2));
        assert_eq!(usage.len(), 1);
    }
}
