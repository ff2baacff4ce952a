// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Pattern Store
//!
//! Deterministic routing overrides: hand-authored regexes per tool merged
//! with keywords learned from feedback.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Read-copy-update table of base and learned patterns
//!
//! Readers clone an `Arc<PatternSnapshot>` and never wait on learning.
//! Learning events take the writer mutex, persist, then swap a freshly built
//! snapshot in. A snapshot is immutable once published.

use chrono::Utc;
use parking_lot::RwLock;
use regex::{Regex, RegexBuilder};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::lexicon::collapse_whitespace;
use crate::domain::{LearnedKeyword, RegistryError, ToolId, ToolProfile, ToolRegistry};
use crate::infrastructure::{RepositoryError, ToolProfileRepository};

#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("invalid pattern '{pattern}' for tool {tool_id}: {source}")]
    InvalidPattern {
        tool_id: ToolId,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("pattern storage failed: {0}")]
    Storage(#[from] RepositoryError),
}

#[derive(Debug, Clone)]
struct SnapshotEntry {
    tool_id: ToolId,
    patterns: Vec<Regex>,
    learned: Vec<String>,
}

/// Immutable view of the merged pattern table, in registry order
#[derive(Debug, Clone)]
pub struct PatternSnapshot {
    entries: Vec<SnapshotEntry>,
    version: u64,
}

impl PatternSnapshot {
    /// First tool (registry order) with a matching pattern. `normalized` must
    /// already be whitespace-collapsed.
    pub fn match_normalized(&self, normalized: &str) -> Option<&ToolId> {
        self.entries
            .iter()
            .find(|entry| entry.patterns.iter().any(|p| p.is_match(normalized)))
            .map(|entry| &entry.tool_id)
    }

    pub fn learned_keywords(&self, tool_id: &ToolId) -> &[String] {
        self.entries
            .iter()
            .find(|entry| &entry.tool_id == tool_id)
            .map(|entry| entry.learned.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_learned(&self, tool_id: &ToolId, keyword: &str) -> bool {
        self.learned_keywords(tool_id).iter().any(|k| k == keyword)
    }

    pub fn pattern_count(&self) -> usize {
        self.entries.iter().map(|entry| entry.patterns.len()).sum()
    }

    /// Incremented on every swap
    pub fn version(&self) -> u64 {
        self.version
    }
}

pub struct PatternStore {
    registry: Arc<ToolRegistry>,
    base: Vec<(ToolId, Vec<Regex>)>,
    current: RwLock<Arc<PatternSnapshot>>,
    /// Authoritative learned state; holding this lock is holding the writer role.
    writer: tokio::sync::Mutex<HashMap<ToolId, ToolProfile>>,
    repository: Arc<dyn ToolProfileRepository>,
}

impl PatternStore {
    /// Compile the base table. Unknown tools and invalid regexes are fatal.
    pub fn new(
        registry: Arc<ToolRegistry>,
        base_patterns: &[(ToolId, Vec<String>)],
        repository: Arc<dyn ToolProfileRepository>,
    ) -> Result<Self, PatternError> {
        let mut compiled: HashMap<ToolId, Vec<Regex>> = HashMap::new();
        for (tool_id, patterns) in base_patterns {
            registry.require(tool_id)?;
            let slot = compiled.entry(tool_id.clone()).or_default();
            for pattern in patterns {
                slot.push(compile(tool_id, pattern)?);
            }
        }

        // Registry order decides which pattern wins.
        let base: Vec<(ToolId, Vec<Regex>)> = registry
            .ids()
            .map(|id| (id.clone(), compiled.remove(id).unwrap_or_default()))
            .collect();

        let snapshot = build_snapshot(&base, &HashMap::new(), 0);

        Ok(Self {
            registry,
            base,
            current: RwLock::new(Arc::new(snapshot)),
            writer: tokio::sync::Mutex::new(HashMap::new()),
            repository,
        })
    }

    /// Merge stored learned keywords into the table. Returns the stored
    /// profiles so counters can be restored from the same read.
    pub async fn load(&self) -> Result<Vec<ToolProfile>, PatternError> {
        let profiles = self.repository.load_all().await?;

        let mut writer = self.writer.lock().await;
        for profile in &profiles {
            self.registry.require(&profile.tool_id)?;
            writer.insert(profile.tool_id.clone(), profile.clone());
        }
        self.swap(&writer);

        info!(
            profiles = profiles.len(),
            patterns = self.snapshot().pattern_count(),
            "Loaded learned patterns"
        );
        Ok(profiles)
    }

    pub fn snapshot(&self) -> Arc<PatternSnapshot> {
        self.current.read().clone()
    }

    /// Case-insensitive, whitespace-normalized match; first tool in registry order
    pub fn match_pattern(&self, message: &str) -> Option<ToolId> {
        let normalized = collapse_whitespace(message);
        self.snapshot().match_normalized(&normalized).cloned()
    }

    /// Append keywords to a tool's learned set. Returns the ones that were new.
    pub async fn learn_keywords(
        &self,
        tool_id: &ToolId,
        keywords: &[String],
    ) -> Result<Vec<String>, PatternError> {
        self.registry.require(tool_id)?;

        let mut writer = self.writer.lock().await;
        let mut candidate = writer
            .get(tool_id)
            .cloned()
            .unwrap_or_else(|| ToolProfile::new(tool_id.clone()));

        let added: Vec<String> = keywords
            .iter()
            .filter(|k| candidate.learn_keyword(k))
            .cloned()
            .collect();
        if added.is_empty() {
            return Ok(added);
        }

        self.persist(&candidate).await;
        writer.insert(tool_id.clone(), candidate);
        self.swap(&writer);

        debug!(tool_id = %tool_id, keywords = ?added, "Learned keywords");
        Ok(added)
    }

    /// Count a usage hit for each learned keyword of `tool_id` in `keywords`
    pub async fn register_hits(&self, tool_id: &ToolId, keywords: &[String]) -> usize {
        let mut writer = self.writer.lock().await;
        let Some(profile) = writer.get_mut(tool_id) else {
            return 0;
        };

        let hits = profile.register_hits(keywords);
        if hits > 0 {
            let profile = profile.clone();
            self.persist(&profile).await;
        }
        hits
    }

    /// Remove learned keywords with fewer than `min_hits` hits learned more
    /// than `max_age_days` ago. Maintenance only; routing never calls this.
    pub async fn prune(&self, min_hits: u64, max_age_days: i64) -> Vec<(ToolId, Vec<String>)> {
        let now = Utc::now();
        let mut writer = self.writer.lock().await;
        let mut pruned = Vec::new();

        for tool_id in self.registry.ids() {
            let Some(profile) = writer.get_mut(tool_id) else {
                continue;
            };
            let removed = profile.prune_keywords(min_hits, max_age_days, now);
            if removed.is_empty() {
                continue;
            }
            let profile = profile.clone();
            self.persist(&profile).await;
            pruned.push((tool_id.clone(), removed));
        }

        if !pruned.is_empty() {
            self.swap(&writer);
        }
        pruned
    }

    /// Learned keywords with hit counts, registry order
    pub async fn learned(&self) -> Vec<(ToolId, Vec<LearnedKeyword>)> {
        let writer = self.writer.lock().await;
        self.registry
            .ids()
            .filter_map(|id| {
                writer
                    .get(id)
                    .filter(|p| !p.learned_keywords.is_empty())
                    .map(|p| (id.clone(), p.learned_keywords.clone()))
            })
            .collect()
    }

    async fn persist(&self, profile: &ToolProfile) {
        if let Err(e) = self
            .repository
            .save_learned(&profile.tool_id, &profile.learned_keywords)
            .await
        {
            warn!(tool_id = %profile.tool_id, "Failed to persist learned keywords: {}", e);
        }
    }

    fn swap(&self, learned: &HashMap<ToolId, ToolProfile>) {
        let version = self.current.read().version + 1;
        let snapshot = build_snapshot(&self.base, learned, version);
        *self.current.write() = Arc::new(snapshot);
    }
}

fn compile(tool_id: &ToolId, pattern: &str) -> Result<Regex, PatternError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|source| PatternError::InvalidPattern {
            tool_id: tool_id.clone(),
            pattern: pattern.to_string(),
            source,
        })
}

fn build_snapshot(
    base: &[(ToolId, Vec<Regex>)],
    learned: &HashMap<ToolId, ToolProfile>,
    version: u64,
) -> PatternSnapshot {
    let entries = base
        .iter()
        .map(|(tool_id, patterns)| {
            let keywords: Vec<String> = learned
                .get(tool_id)
                .map(|p| p.keywords().map(str::to_string).collect())
                .unwrap_or_default();

            let mut merged = patterns.clone();
            for keyword in &keywords {
                let literal = regex::escape(keyword);
                if merged.iter().any(|p| p.as_str() == literal) {
                    continue;
                }
                match RegexBuilder::new(&literal).case_insensitive(true).build() {
                    Ok(re) => merged.push(re),
                    Err(e) => warn!(tool_id = %tool_id, keyword, "Skipping learned keyword: {}", e),
                }
            }

            SnapshotEntry {
                tool_id: tool_id.clone(),
                patterns: merged,
                learned: keywords,
            }
        })
        .collect();

    PatternSnapshot { entries, version }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ToolDefinition;
    use crate::infrastructure::InMemoryToolProfileRepository;

    fn registry() -> Arc<ToolRegistry> {
        Arc::new(
            ToolRegistry::new(vec![
                ToolDefinition::new("tell_joke"),
                ToolDefinition::new("search_videos"),
                ToolDefinition::new("ask_assistant"),
            ])
            .unwrap(),
        )
    }

    fn base() -> Vec<(ToolId, Vec<String>)> {
        vec![
            (ToolId::from("search_videos"), vec!["youtube".into(), "유튜브".into()]),
            (ToolId::from("tell_joke"), vec!["joke".into(), "농담".into()]),
        ]
    }

    fn store() -> PatternStore {
        PatternStore::new(registry(), &base(), Arc::new(InMemoryToolProfileRepository::new())).unwrap()
    }

    #[test]
    fn test_match_uses_registry_order_not_table_order() {
        let store = store();
        let hit = store.match_pattern("youtube joke");
        assert_eq!(hit, Some(ToolId::from("tell_joke")));
        assert_eq!(store.match_pattern("nothing here"), None);
    }

    #[test]
    fn test_match_is_case_and_whitespace_insensitive() {
        let store = PatternStore::new(
            registry(),
            &[(ToolId::from("search_videos"), vec!["full content".into()])],
            Arc::new(InMemoryToolProfileRepository::new()),
        )
        .unwrap();

        assert_eq!(
            store.match_pattern("  FULL \n  content please"),
            Some(ToolId::from("search_videos"))
        );
    }

    #[test]
    fn test_unknown_tool_and_bad_regex_are_fatal() {
        let unknown = PatternStore::new(
            registry(),
            &[(ToolId::from("missing"), vec!["x".into()])],
            Arc::new(InMemoryToolProfileRepository::new()),
        );
        assert!(matches!(unknown, Err(PatternError::Registry(RegistryError::UnknownTool(_)))));

        let invalid = PatternStore::new(
            registry(),
            &[(ToolId::from("tell_joke"), vec!["(unclosed".into()])],
            Arc::new(InMemoryToolProfileRepository::new()),
        );
        assert!(matches!(invalid, Err(PatternError::InvalidPattern { .. })));
    }

    #[tokio::test]
    async fn test_learning_swaps_snapshot_and_keeps_old_readers_stable() {
        let store = store();
        let before = store.snapshot();

        let added = store
            .learn_keywords(&ToolId::from("ask_assistant"), &["c++".into(), "c++".into()])
            .await
            .unwrap();
        assert_eq!(added, vec!["c++".to_string()]);

        assert_eq!(before.match_normalized("what is c++"), None);
        assert_eq!(store.match_pattern("What is C++"), Some(ToolId::from("ask_assistant")));
        assert!(store.snapshot().version() > before.version());
    }

    #[tokio::test]
    async fn test_learned_keywords_survive_reload() {
        let repo = Arc::new(InMemoryToolProfileRepository::new());
        let first = PatternStore::new(registry(), &base(), repo.clone()).unwrap();
        first
            .learn_keywords(&ToolId::from("ask_assistant"), &["주식".into()])
            .await
            .unwrap();

        let second = PatternStore::new(registry(), &base(), repo).unwrap();
        second.load().await.unwrap();
        assert!(second.snapshot().is_learned(&ToolId::from("ask_assistant"), "주식"));
    }

    #[tokio::test]
    async fn test_prune_removes_unhit_keywords() {
        let store = store();
        let tool = ToolId::from("ask_assistant");
        store.learn_keywords(&tool, &["alpha".into(), "beta".into()]).await.unwrap();
        store.register_hits(&tool, &["beta".into()]).await;

        // max_age_days = -1 puts the cutoff in the future, so age never protects.
        let pruned = store.prune(1, -1).await;
        assert_eq!(pruned, vec![(tool.clone(), vec!["alpha".to_string()])]);
        assert!(!store.snapshot().is_learned(&tool, "alpha"));
        assert!(store.snapshot().is_learned(&tool, "beta"));
    }
}
