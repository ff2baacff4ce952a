// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Repository Factory - Application Layer
//!
//! Creates the session, tool-profile and vector-index repositories for the
//! configured storage backend.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Selects concrete cortex repositories from `StorageConfig`

use anyhow::{anyhow, Context, Result};
use concierge_cortex::infrastructure::{
    InMemorySessionRepository, InMemoryToolProfileRepository, InMemoryVectorIndex, SessionRepository, SledStore,
    ToolProfileRepository, VectorIndex,
};
use std::sync::Arc;
use tracing::info;

use crate::domain::dispatch_config::{StorageBackend, StorageConfig};

/// Repositories backing one dispatch runtime
#[derive(Clone)]
pub struct Repositories {
    pub sessions: Arc<dyn SessionRepository>,
    pub profiles: Arc<dyn ToolProfileRepository>,
    pub vectors: Arc<dyn VectorIndex>,
    /// Present for the sled backend; flushed on shutdown
    pub store: Option<SledStore>,
}

impl Repositories {
    pub fn in_memory() -> Self {
        Self {
            sessions: Arc::new(InMemorySessionRepository::new()),
            profiles: Arc::new(InMemoryToolProfileRepository::new()),
            vectors: Arc::new(InMemoryVectorIndex::new()),
            store: None,
        }
    }

    pub fn sled(store: SledStore) -> Result<Self> {
        Ok(Self {
            sessions: Arc::new(store.session_repository()?),
            profiles: Arc::new(store.tool_profile_repository()?),
            vectors: Arc::new(store.vector_index()?),
            store: Some(store),
        })
    }
}

/// Creates the repositories for the configured backend
pub fn create_repositories(storage: &StorageConfig) -> Result<Repositories> {
    match storage.backend {
        StorageBackend::InMemory => Ok(Repositories::in_memory()),
        StorageBackend::Sled => {
            let path = storage
                .path
                .as_ref()
                .ok_or_else(|| anyhow!("sled storage requires a path"))?;
            let store = SledStore::open(path)
                .with_context(|| format!("Failed to open sled store at {}", path.display()))?;
            info!(path = %path.display(), "Using sled storage backend");
            Repositories::sled(store)
        }
    }
}
