// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Session Memory
//!
//! Bounded per-user turn log backed by a `SessionRepository`.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Per-user async lock (single writer per key), write-through persistence
//!
//! Each user's session sits behind its own `tokio::sync::Mutex`. The mutex
//! is FIFO, so appends for one user land in arrival order while different
//! users never contend. Only writers cache sessions. When the store fails
//! the first load, turns are kept in memory and replayed onto the stored
//! history once the store answers again.

use chrono::{Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::domain::{Session, SessionStats, Turn, UserId, DEFAULT_SESSION_WINDOW};
use crate::infrastructure::{RepositoryError, SessionRepository};

pub struct SessionMemory {
    repository: Arc<dyn SessionRepository>,
    sessions: DashMap<UserId, Arc<Mutex<CachedSession>>>,
    window: usize,
}

/// A session written by this process. `synced` is false while the store was
/// unreachable at first load; such a session is never saved until it has been
/// merged onto the stored one.
struct CachedSession {
    session: Session,
    synced: bool,
}

impl SessionMemory {
    pub fn new(repository: Arc<dyn SessionRepository>) -> Self {
        Self::with_window(repository, DEFAULT_SESSION_WINDOW)
    }

    pub fn with_window(repository: Arc<dyn SessionRepository>, window: usize) -> Self {
        Self {
            repository,
            sessions: DashMap::new(),
            window: window.max(1),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    fn cached(&self, user_id: &UserId) -> Option<Arc<Mutex<CachedSession>>> {
        self.sessions.get(user_id).map(|entry| entry.clone())
    }

    /// Handle for writers. Only writers populate the cache.
    async fn writable(&self, user_id: &UserId) -> Arc<Mutex<CachedSession>> {
        if let Some(existing) = self.cached(user_id) {
            return existing;
        }

        let cached = match self.repository.load(user_id).await {
            Ok(Some(session)) => CachedSession { session, synced: true },
            Ok(None) => CachedSession {
                session: Session::new(user_id.clone()),
                synced: true,
            },
            Err(e) => {
                warn!(user_id = %user_id, "Session store unavailable, keeping turns in memory: {}", e);
                CachedSession {
                    session: Session::new(user_id.clone()),
                    synced: false,
                }
            }
        };

        // A concurrent loader may have won; keep whichever handle landed first.
        self.sessions
            .entry(user_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(cached)))
            .clone()
    }

    /// Retry the load for an unsynced session and replay its turns onto the
    /// stored history.
    async fn resync(&self, user_id: &UserId, cached: &mut CachedSession) {
        if cached.synced {
            return;
        }

        let stored = match self.repository.load(user_id).await {
            Ok(stored) => stored,
            Err(e) => {
                debug!(user_id = %user_id, "Session store still unavailable: {}", e);
                return;
            }
        };

        let mut merged = stored.unwrap_or_else(|| Session::new(user_id.clone()));
        let pending = cached.session.turns().len();
        for turn in cached.session.turns() {
            merged.append(turn.clone(), self.window);
        }
        cached.session = merged;
        cached.synced = true;

        if let Err(e) = self.repository.save(&cached.session).await {
            warn!(user_id = %user_id, "Failed to persist resynced session: {}", e);
        }
        info!(user_id = %user_id, pending, "Session resynced with store");
    }

    /// Run `read` against the user's session without caching it.
    /// An unreachable store reads as an empty session for this call only.
    async fn read<T>(&self, user_id: &UserId, read: impl FnOnce(&Session) -> T) -> T {
        if let Some(handle) = self.cached(user_id) {
            let mut cached = handle.lock().await;
            self.resync(user_id, &mut cached).await;
            return read(&cached.session);
        }

        match self.repository.load(user_id).await {
            Ok(Some(session)) => read(&session),
            Ok(None) => read(&Session::new(user_id.clone())),
            Err(e) => {
                warn!(user_id = %user_id, "Session store unavailable, reading empty session: {}", e);
                read(&Session::new(user_id.clone()))
            }
        }
    }

    /// Append then evict down to the window; persisted before returning
    pub async fn append_turn(&self, user_id: &UserId, turn: Turn) {
        let handle = self.writable(user_id).await;
        let mut cached = handle.lock().await;
        self.resync(user_id, &mut cached).await;
        cached.session.append(turn, self.window);

        if !cached.synced {
            debug!(user_id = %user_id, turns = cached.session.len(), "Appended turn in memory only");
            return;
        }
        if let Err(e) = self.repository.save(&cached.session).await {
            warn!(user_id = %user_id, "Failed to persist session: {}", e);
        }
        debug!(user_id = %user_id, turns = cached.session.len(), "Appended turn");
    }

    /// The most recent `min(k, len)` turns, oldest first
    pub async fn get_recent(&self, user_id: &UserId, k: usize) -> Vec<Turn> {
        self.read(user_id, |session| session.recent(k)).await
    }

    pub async fn stats(&self, user_id: &UserId) -> SessionStats {
        self.read(user_id, |session| {
            if session.total_turns == 0 {
                SessionStats::default()
            } else {
                session.stats()
            }
        })
        .await
    }

    pub async fn last_user_message(&self, user_id: &UserId) -> Option<String> {
        self.read(user_id, |session| session.last_user_message().map(str::to_string))
            .await
    }

    pub async fn user_ids(&self) -> Result<Vec<UserId>, RepositoryError> {
        let mut ids = self.repository.list_user_ids().await?;
        for entry in self.sessions.iter() {
            if !ids.contains(entry.key()) {
                ids.push(entry.key().clone());
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Number of sessions held in memory
    pub fn cached_len(&self) -> usize {
        self.sessions.len()
    }

    /// Delete sessions idle for more than `days`. Returns the number removed.
    pub async fn cleanup_older_than(&self, days: i64) -> Result<usize, RepositoryError> {
        let cutoff = Utc::now() - Duration::days(days);
        let mut removed = 0;

        for user_id in self.user_ids().await? {
            let last_activity = self.read(&user_id, |session| session.last_activity).await;
            if last_activity >= cutoff {
                continue;
            }
            self.repository.delete(&user_id).await?;
            self.sessions.remove(&user_id);
            removed += 1;
        }

        info!(removed, days, "Cleaned up idle sessions");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::InMemorySessionRepository;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct UnavailableSessionRepository;

    #[async_trait]
    impl SessionRepository for UnavailableSessionRepository {
        async fn load(&self, _user_id: &UserId) -> Result<Option<Session>, RepositoryError> {
            Err(RepositoryError::Unavailable("down".into()))
        }

        async fn save(&self, _session: &Session) -> Result<(), RepositoryError> {
            Err(RepositoryError::Unavailable("down".into()))
        }

        async fn delete(&self, _user_id: &UserId) -> Result<(), RepositoryError> {
            Err(RepositoryError::Unavailable("down".into()))
        }

        async fn list_user_ids(&self) -> Result<Vec<UserId>, RepositoryError> {
            Err(RepositoryError::Unavailable("down".into()))
        }
    }

    /// Fails the first `failures` loads, then delegates.
    struct FlakySessionRepository {
        inner: InMemorySessionRepository,
        failures: AtomicUsize,
    }

    impl FlakySessionRepository {
        fn new(failures: usize) -> Self {
            Self {
                inner: InMemorySessionRepository::new(),
                failures: AtomicUsize::new(failures),
            }
        }
    }

    #[async_trait]
    impl SessionRepository for FlakySessionRepository {
        async fn load(&self, user_id: &UserId) -> Result<Option<Session>, RepositoryError> {
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(RepositoryError::Unavailable("flaky".into()));
            }
            self.inner.load(user_id).await
        }

        async fn save(&self, session: &Session) -> Result<(), RepositoryError> {
            self.inner.save(session).await
        }

        async fn delete(&self, user_id: &UserId) -> Result<(), RepositoryError> {
            self.inner.delete(user_id).await
        }

        async fn list_user_ids(&self) -> Result<Vec<UserId>, RepositoryError> {
            self.inner.list_user_ids().await
        }
    }

    fn stored_session(user: &UserId, turns: usize) -> Session {
        let mut session = Session::new(user.clone());
        for i in 0..turns {
            session.append(Turn::user(format!("m{i}")), 50);
        }
        session
    }

    #[tokio::test]
    async fn test_sixty_appends_keep_fifty_newest() {
        let memory = SessionMemory::new(Arc::new(InMemorySessionRepository::new()));
        let user = UserId::new("u");
        for i in 0..60 {
            memory.append_turn(&user, Turn::user(format!("m{i}"))).await;
        }

        let recent = memory.get_recent(&user, 100).await;
        assert_eq!(recent.len(), 50);
        let expected: Vec<String> = (10..60).map(|i| format!("m{i}")).collect();
        let actual: Vec<String> = recent.into_iter().map(|t| t.content).collect();
        assert_eq!(actual, expected);
        assert_eq!(memory.stats(&user).await.total_turns, 60);
    }

    #[tokio::test]
    async fn test_session_is_restored_from_repository() {
        let repo = Arc::new(InMemorySessionRepository::new());
        let user = UserId::new("u");
        SessionMemory::new(repo.clone())
            .append_turn(&user, Turn::user("hello"))
            .await;

        let fresh = SessionMemory::new(repo);
        assert_eq!(fresh.get_recent(&user, 5).await[0].content, "hello");
    }

    #[tokio::test]
    async fn test_unavailable_store_degrades_to_memory() {
        let memory = SessionMemory::new(Arc::new(UnavailableSessionRepository));
        let user = UserId::new("u");
        memory.append_turn(&user, Turn::user("still here")).await;
        assert_eq!(memory.get_recent(&user, 1).await[0].content, "still here");
    }

    #[tokio::test]
    async fn test_concurrent_users_do_not_interleave() {
        let memory = Arc::new(SessionMemory::new(Arc::new(InMemorySessionRepository::new())));
        let mut handles = Vec::new();
        for u in 0..4 {
            let memory = memory.clone();
            handles.push(tokio::spawn(async move {
                let user = UserId::new(format!("user{u}"));
                for i in 0..10 {
                    memory.append_turn(&user, Turn::user(format!("{u}-{i}"))).await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        for u in 0..4 {
            let turns = memory.get_recent(&UserId::new(format!("user{u}")), 50).await;
            let expected: Vec<String> = (0..10).map(|i| format!("{u}-{i}")).collect();
            let actual: Vec<String> = turns.into_iter().map(|t| t.content).collect();
            assert_eq!(actual, expected);
        }
    }

    #[tokio::test]
    async fn test_cleanup_removes_only_idle_sessions() {
        let repo = Arc::new(InMemorySessionRepository::new());
        let memory = SessionMemory::new(repo.clone());
        memory.append_turn(&UserId::new("active"), Turn::user("hi")).await;

        let mut idle = Session::new(UserId::new("idle"));
        idle.append(Turn::user("old"), 50);
        idle.last_activity = Utc::now() - Duration::days(40);
        repo.save(&idle).await.unwrap();

        assert_eq!(memory.cleanup_older_than(30).await.unwrap(), 1);
        assert_eq!(repo.list_user_ids().await.unwrap(), vec![UserId::new("active")]);
    }

    #[tokio::test]
    async fn test_transient_load_error_keeps_stored_history() {
        let repo = Arc::new(FlakySessionRepository::new(1));
        let user = UserId::new("u");
        repo.save(&stored_session(&user, 5)).await.unwrap();
        let memory = SessionMemory::new(repo.clone());

        assert!(memory.get_recent(&user, 10).await.is_empty());
        assert_eq!(memory.get_recent(&user, 10).await.len(), 5);

        memory.append_turn(&user, Turn::user("new")).await;

        let persisted = repo.load(&user).await.unwrap().unwrap();
        assert_eq!(persisted.len(), 6);
        assert_eq!(persisted.turns()[5].content, "new");
        assert_eq!(persisted.total_turns, 6);
    }

    #[tokio::test]
    async fn test_turns_appended_during_outage_merge_onto_stored_history() {
        let repo = Arc::new(FlakySessionRepository::new(2));
        let user = UserId::new("u");
        repo.save(&stored_session(&user, 3)).await.unwrap();
        let memory = SessionMemory::new(repo.clone());

        memory.append_turn(&user, Turn::user("during")).await;
        assert_eq!(repo.load(&user).await.unwrap().unwrap().len(), 3);

        memory.append_turn(&user, Turn::user("after")).await;

        let contents: Vec<String> = memory
            .get_recent(&user, 10)
            .await
            .into_iter()
            .map(|t| t.content)
            .collect();
        assert_eq!(contents, vec!["m0", "m1", "m2", "during", "after"]);
        assert_eq!(repo.load(&user).await.unwrap().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_reads_do_not_cache_sessions() {
        let memory = SessionMemory::new(Arc::new(InMemorySessionRepository::new()));
        for i in 0..10 {
            let user = UserId::new(format!("reader{i}"));
            memory.get_recent(&user, 5).await;
            memory.stats(&user).await;
            memory.last_user_message(&user).await;
        }
        assert_eq!(memory.cached_len(), 0);

        memory.append_turn(&UserId::new("writer"), Turn::user("hi")).await;
        assert_eq!(memory.cached_len(), 1);
    }
}
