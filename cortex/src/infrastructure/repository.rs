// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository interfaces for the learning and memory layer
//! Defines the contracts for session, tool-profile and vector storage

use async_trait::async_trait;

use crate::domain::{
    Effectiveness, EmbeddingRecord, LearnedKeyword, ScoredRecord, Session, ToolId, ToolProfile,
    UserId,
};

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}

impl From<sled::Error> for RepositoryError {
    fn from(err: sled::Error) -> Self {
        RepositoryError::Database(err.to_string())
    }
}

/// Embedding backend errors
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("Embedding backend unavailable: {0}")]
    Unavailable(String),

    #[error("Embedding call timed out after {0} ms")]
    Timeout(u64),

    #[error("Embedding backend error: {0}")]
    Backend(String),
}

/// One durable record per user
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn load(&self, user_id: &UserId) -> Result<Option<Session>, RepositoryError>;

    /// Save session (create or replace)
    async fn save(&self, session: &Session) -> Result<(), RepositoryError>;

    async fn delete(&self, user_id: &UserId) -> Result<(), RepositoryError>;

    async fn list_user_ids(&self) -> Result<Vec<UserId>, RepositoryError>;
}

/// One durable record per tool
#[async_trait]
pub trait ToolProfileRepository: Send + Sync {
    /// All stored profiles (learned keywords and counters merged per tool)
    async fn load_all(&self) -> Result<Vec<ToolProfile>, RepositoryError>;

    async fn save_learned(
        &self,
        tool_id: &ToolId,
        keywords: &[LearnedKeyword],
    ) -> Result<(), RepositoryError>;

    async fn save_effectiveness(
        &self,
        tool_id: &ToolId,
        effectiveness: Effectiveness,
    ) -> Result<(), RepositoryError>;
}

/// Nearest-neighbour index over turn embeddings, filtered by user
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn insert(&self, record: EmbeddingRecord) -> Result<(), RepositoryError>;

    /// Up to `limit` of `user_id`'s records, ascending cosine distance
    async fn search(
        &self,
        user_id: &UserId,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredRecord>, RepositoryError>;

    /// Up to `limit` of `user_id`'s records, newest first
    async fn history(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<EmbeddingRecord>, RepositoryError>;
}

/// Turns text into a fixed-size vector
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    fn dimensions(&self) -> usize;
}
