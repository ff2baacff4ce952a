// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Effectiveness Tracker
//!
//! Success/failure counters per tool, turned into a score multiplier.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Multi-reader single-writer counters with write-through persistence
//!
//! Counters live behind a `parking_lot::RwLock` so the routing path reads them
//! without awaiting. Persistence is serialized by an async mutex and always
//! writes the latest value, so a slow write can never overwrite a newer count.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::{Effectiveness, ToolId, ToolProfile};
use crate::infrastructure::ToolProfileRepository;

pub struct EffectivenessTracker {
    counters: RwLock<HashMap<ToolId, Effectiveness>>,
    repository: Option<Arc<dyn ToolProfileRepository>>,
    persist_lock: tokio::sync::Mutex<()>,
}

impl EffectivenessTracker {
    /// Process-lifetime counters only
    pub fn new() -> Self {
        Self {
            counters: RwLock::new(HashMap::new()),
            repository: None,
            persist_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Counters written through to `repository`
    pub fn with_repository(repository: Arc<dyn ToolProfileRepository>) -> Self {
        Self {
            repository: Some(repository),
            ..Self::new()
        }
    }

    /// Seed counters from stored profiles
    pub fn restore(&self, profiles: &[ToolProfile]) {
        let mut counters = self.counters.write();
        for profile in profiles {
            counters.insert(profile.tool_id.clone(), profile.effectiveness);
        }
    }

    pub fn get(&self, tool_id: &ToolId) -> Effectiveness {
        self.counters.read().get(tool_id).copied().unwrap_or_default()
    }

    /// `0.5 + 0.5 * success_rate`, `1.0` for unused tools
    pub fn weight(&self, tool_id: &ToolId) -> f64 {
        self.get(tool_id).weight()
    }

    pub fn snapshot(&self) -> HashMap<ToolId, Effectiveness> {
        self.counters.read().clone()
    }

    /// Increment one counter and write the result through. Storage failures
    /// are logged; the in-memory count stands.
    pub async fn record(&self, tool_id: &ToolId, success: bool) -> Effectiveness {
        let updated = {
            let mut counters = self.counters.write();
            let entry = counters.entry(tool_id.clone()).or_default();
            entry.record(success);
            *entry
        };

        debug!(
            tool_id = %tool_id,
            success,
            success_count = updated.success,
            failure_count = updated.failure,
            "Recorded tool outcome"
        );

        if let Some(repository) = &self.repository {
            let _guard = self.persist_lock.lock().await;
            let latest = self.get(tool_id);
            if let Err(e) = repository.save_effectiveness(tool_id, latest).await {
                warn!(tool_id = %tool_id, "Failed to persist effectiveness: {}", e);
            }
        }

        updated
    }
}

impl Default for EffectivenessTracker {
    fn default() -> Self {
        Self::new()
    }
}
