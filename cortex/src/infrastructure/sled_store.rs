// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Sled Store
//!
//! Provides durable session, tool-profile and embedding storage on an embedded
//! `sled` database.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** One JSON record per user (`sessions`), one per tool
//!   (`tool_profiles`), and per-user prefixed embedding records (`embeddings`)
//!
//! sled calls block on disk I/O, so every operation runs on the blocking pool.

use async_trait::async_trait;
use chrono::Utc;
use std::path::Path;
use tracing::{debug, warn};

use crate::domain::{
    Effectiveness, EmbeddingRecord, LearnedKeyword, ScoredRecord, Session, ToolId, ToolProfile,
    UserId,
};
use crate::infrastructure::in_memory::rank_by_distance;
use crate::infrastructure::repository::{
    RepositoryError, SessionRepository, ToolProfileRepository, VectorIndex,
};

const SESSIONS_TREE: &str = "sessions";
const TOOL_PROFILES_TREE: &str = "tool_profiles";
const EMBEDDINGS_TREE: &str = "embeddings";

/// Handle to the embedded database. Cheap to clone.
#[derive(Clone)]
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let db = sled::open(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "Opened sled store");
        Ok(Self { db })
    }

    /// Database removed when the last handle drops
    pub fn temporary() -> Result<Self, RepositoryError> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    pub fn session_repository(&self) -> Result<SledSessionRepository, RepositoryError> {
        Ok(SledSessionRepository {
            tree: self.db.open_tree(SESSIONS_TREE)?,
        })
    }

    pub fn tool_profile_repository(&self) -> Result<SledToolProfileRepository, RepositoryError> {
        Ok(SledToolProfileRepository {
            tree: self.db.open_tree(TOOL_PROFILES_TREE)?,
        })
    }

    pub fn vector_index(&self) -> Result<SledVectorIndex, RepositoryError> {
        Ok(SledVectorIndex {
            tree: self.db.open_tree(EMBEDDINGS_TREE)?,
        })
    }

    pub async fn flush(&self) -> Result<usize, RepositoryError> {
        Ok(self.db.flush_async().await?)
    }
}

async fn blocking<T, F>(f: F) -> Result<T, RepositoryError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, RepositoryError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| RepositoryError::Unavailable(e.to_string()))?
}

pub struct SledSessionRepository {
    tree: sled::Tree,
}

#[async_trait]
impl SessionRepository for SledSessionRepository {
    async fn load(&self, user_id: &UserId) -> Result<Option<Session>, RepositoryError> {
        let tree = self.tree.clone();
        let key = user_id.as_str().to_owned();
        blocking(move || match tree.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        })
        .await
    }

    async fn save(&self, session: &Session) -> Result<(), RepositoryError> {
        let tree = self.tree.clone();
        let key = session.user_id.as_str().to_owned();
        let value = serde_json::to_vec(session)?;
        blocking(move || {
            tree.insert(key.as_bytes(), value)?;
            tree.flush()?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, user_id: &UserId) -> Result<(), RepositoryError> {
        let tree = self.tree.clone();
        let key = user_id.as_str().to_owned();
        blocking(move || {
            tree.remove(key.as_bytes())?;
            Ok(())
        })
        .await
    }

    async fn list_user_ids(&self) -> Result<Vec<UserId>, RepositoryError> {
        let tree = self.tree.clone();
        blocking(move || {
            tree.iter()
                .keys()
                .map(|key| {
                    let key = key?;
                    Ok(UserId::new(String::from_utf8_lossy(&key).into_owned()))
                })
                .collect()
        })
        .await
    }
}

pub struct SledToolProfileRepository {
    tree: sled::Tree,
}

impl SledToolProfileRepository {
    /// Atomic read-modify-write of one tool's record
    async fn update<F>(&self, tool_id: &ToolId, apply: F) -> Result<(), RepositoryError>
    where
        F: Fn(&mut ToolProfile) + Send + 'static,
    {
        let tree = self.tree.clone();
        let tool_id = tool_id.clone();
        blocking(move || {
            tree.update_and_fetch(tool_id.as_str().as_bytes(), |old| {
                let mut profile = old
                    .and_then(|bytes| match serde_json::from_slice::<ToolProfile>(bytes) {
                        Ok(profile) => Some(profile),
                        Err(e) => {
                            warn!(tool_id = %tool_id, "Discarding unreadable tool profile: {}", e);
                            None
                        }
                    })
                    .unwrap_or_else(|| ToolProfile::new(tool_id.clone()));
                apply(&mut profile);
                profile.updated_at = Utc::now();
                serde_json::to_vec(&profile)
                    .ok()
                    .or_else(|| old.map(|bytes| bytes.to_vec()))
            })?;
            tree.flush()?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl ToolProfileRepository for SledToolProfileRepository {
    async fn load_all(&self) -> Result<Vec<ToolProfile>, RepositoryError> {
        let tree = self.tree.clone();
        blocking(move || {
            tree.iter()
                .values()
                .map(|value| Ok(serde_json::from_slice(&value?)?))
                .collect()
        })
        .await
    }

    async fn save_learned(
        &self,
        tool_id: &ToolId,
        keywords: &[LearnedKeyword],
    ) -> Result<(), RepositoryError> {
        let keywords = keywords.to_vec();
        self.update(tool_id, move |profile| {
            profile.learned_keywords = keywords.clone();
        })
        .await
    }

    async fn save_effectiveness(
        &self,
        tool_id: &ToolId,
        effectiveness: Effectiveness,
    ) -> Result<(), RepositoryError> {
        self.update(tool_id, move |profile| {
            profile.effectiveness = effectiveness;
        })
        .await
    }
}

/// Embedding records keyed `user_id \0 timestamp_be \0 record_id`, so a
/// prefix scan stays inside one user and reverse iteration is newest first.
pub struct SledVectorIndex {
    tree: sled::Tree,
}

fn user_prefix(user_id: &UserId) -> Vec<u8> {
    let mut prefix = user_id.as_str().as_bytes().to_vec();
    prefix.push(0);
    prefix
}

fn record_key(record: &EmbeddingRecord) -> Vec<u8> {
    let mut key = user_prefix(&record.user_id);
    let nanos = record
        .timestamp
        .timestamp_nanos_opt()
        .unwrap_or_else(|| record.timestamp.timestamp_micros().saturating_mul(1000));
    // Offset so pre-epoch timestamps still sort before later ones.
    key.extend_from_slice(&((nanos as i128 - i64::MIN as i128) as u64).to_be_bytes());
    key.push(0);
    key.extend_from_slice(record.id.as_bytes());
    key
}

#[async_trait]
impl VectorIndex for SledVectorIndex {
    async fn insert(&self, record: EmbeddingRecord) -> Result<(), RepositoryError> {
        let tree = self.tree.clone();
        let key = record_key(&record);
        let value = serde_json::to_vec(&record)?;
        blocking(move || {
            tree.insert(key, value)?;
            Ok(())
        })
        .await
    }

    async fn search(
        &self,
        user_id: &UserId,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredRecord>, RepositoryError> {
        let tree = self.tree.clone();
        let prefix = user_prefix(user_id);
        let query = query.to_vec();
        blocking(move || {
            let records = tree
                .scan_prefix(prefix)
                .values()
                .map(|value| Ok(serde_json::from_slice::<EmbeddingRecord>(&value?)?))
                .collect::<Result<Vec<_>, RepositoryError>>()?;
            Ok(rank_by_distance(records.iter(), &query, limit))
        })
        .await
    }

    async fn history(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<EmbeddingRecord>, RepositoryError> {
        let tree = self.tree.clone();
        let prefix = user_prefix(user_id);
        blocking(move || {
            tree.scan_prefix(prefix)
                .values()
                .rev()
                .take(limit)
                .map(|value| Ok(serde_json::from_slice(&value?)?))
                .collect()
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Turn, DEFAULT_SESSION_WINDOW};
    use chrono::Duration;

    #[tokio::test]
    async fn test_session_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let user = UserId::new("user_0123456789abcdef");

        {
            let store = SledStore::open(dir.path()).unwrap();
            let repo = store.session_repository().unwrap();
            let mut session = Session::new(user.clone());
            session.append(Turn::user("안녕"), DEFAULT_SESSION_WINDOW);
            repo.save(&session).await.unwrap();
            store.flush().await.unwrap();
        }

        let store = SledStore::open(dir.path()).unwrap();
        let repo = store.session_repository().unwrap();
        let loaded = repo.load(&user).await.unwrap().unwrap();
        assert_eq!(loaded.turns()[0].content, "안녕");
        assert_eq!(repo.list_user_ids().await.unwrap(), vec![user]);
    }

    #[tokio::test]
    async fn test_tool_profile_fields_merge_into_one_record() {
        let store = SledStore::temporary().unwrap();
        let repo = store.tool_profile_repository().unwrap();
        let tool = ToolId::from("explain_concept");

        repo.save_effectiveness(&tool, Effectiveness { success: 3, failure: 0 })
            .await
            .unwrap();
        repo.save_learned(&tool, &[LearnedKeyword::new("개념")]).await.unwrap();

        let profiles = repo.load_all().await.unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].effectiveness.success, 3);
        assert_eq!(profiles[0].learned_keywords[0].keyword, "개념");
    }

    #[tokio::test]
    async fn test_vector_index_prefix_scoping_and_order() {
        let store = SledStore::temporary().unwrap();
        let index = store.vector_index().unwrap();
        let now = Utc::now();

        let mut first = EmbeddingRecord::from_turn(UserId::new("u1"), &Turn::user("first"), vec![1.0, 0.0]);
        first.timestamp = now - Duration::seconds(10);
        let second = EmbeddingRecord::from_turn(UserId::new("u1"), &Turn::user("second"), vec![0.0, 1.0]);
        // "u1" is a byte prefix of "u10"; the separator must keep them apart.
        let other = EmbeddingRecord::from_turn(UserId::new("u10"), &Turn::user("other"), vec![1.0, 0.0]);

        index.insert(first).await.unwrap();
        index.insert(second).await.unwrap();
        index.insert(other).await.unwrap();

        let history = index.history(&UserId::new("u1"), 10).await.unwrap();
        let contents: Vec<_> = history.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(contents, vec!["second", "first"]);

        let hits = index.search(&UserId::new("u1"), &[1.0, 0.0], 1).await.unwrap();
        assert_eq!(hits[0].record.content, "first");
    }
}
