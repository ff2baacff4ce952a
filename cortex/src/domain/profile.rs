// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Tool profiles: learned keywords and outcome counters per tool
//!
//! Tiered keywords are hand-authored and live on the `ToolDefinition`; the
//! profile holds what the engine learns at runtime.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::tool::ToolId;

/// Success/failure counters. Never decremented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Effectiveness {
    pub success: u64,
    pub failure: u64,
}

impl Effectiveness {
    pub fn total(&self) -> u64 {
        self.success.saturating_add(self.failure)
    }

    pub fn success_rate(&self) -> Option<f64> {
        match self.total() {
            0 => None,
            total => Some(self.success as f64 / total as f64),
        }
    }

    /// `0.5 + 0.5 * success_rate`, or `1.0` with no recorded usage.
    pub fn weight(&self) -> f64 {
        match self.success_rate() {
            Some(rate) => 0.5 + 0.5 * rate,
            None => 1.0,
        }
    }

    pub fn record(&mut self, success: bool) {
        if success {
            self.success = self.success.saturating_add(1);
        } else {
            self.failure = self.failure.saturating_add(1);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnedKeyword {
    pub keyword: String,
    pub learned_at: DateTime<Utc>,
    /// Confirmed uses (positive feedback or successful turns).
    #[serde(default)]
    pub hits: u64,
}

impl LearnedKeyword {
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            learned_at: Utc::now(),
            hits: 0,
        }
    }
}

/// Runtime-learned state of one tool. Created lazily, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolProfile {
    pub tool_id: ToolId,
    #[serde(default)]
    pub learned_keywords: Vec<LearnedKeyword>,
    #[serde(default)]
    pub effectiveness: Effectiveness,
    pub updated_at: DateTime<Utc>,
}

impl ToolProfile {
    pub fn new(tool_id: ToolId) -> Self {
        Self {
            tool_id,
            learned_keywords: Vec::new(),
            effectiveness: Effectiveness::default(),
            updated_at: Utc::now(),
        }
    }

    pub fn has_keyword(&self, keyword: &str) -> bool {
        self.learned_keywords.iter().any(|k| k.keyword == keyword)
    }

    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.learned_keywords.iter().map(|k| k.keyword.as_str())
    }

    /// Returns `false` when the keyword was already learned.
    pub fn learn_keyword(&mut self, keyword: &str) -> bool {
        if keyword.is_empty() || self.has_keyword(keyword) {
            return false;
        }
        self.learned_keywords.push(LearnedKeyword::new(keyword));
        self.updated_at = Utc::now();
        true
    }

    /// Count a hit on every learned keyword present in `keywords`.
    pub fn register_hits(&mut self, keywords: &[String]) -> usize {
        let mut hits = 0;
        for learned in &mut self.learned_keywords {
            if keywords.iter().any(|k| *k == learned.keyword) {
                learned.hits = learned.hits.saturating_add(1);
                hits += 1;
            }
        }
        if hits > 0 {
            self.updated_at = Utc::now();
        }
        hits
    }

    /// Drop keywords with fewer than `min_hits` hits learned more than
    /// `max_age_days` before `now`. Returns the removed keywords.
    pub fn prune_keywords(&mut self, min_hits: u64, max_age_days: i64, now: DateTime<Utc>) -> Vec<String> {
        let cutoff = now - Duration::days(max_age_days);
        let mut removed = Vec::new();
        self.learned_keywords.retain(|k| {
            let stale = k.hits < min_hits && k.learned_at < cutoff;
            if stale {
                removed.push(k.keyword.clone());
            }
            !stale
        });
        if !removed.is_empty() {
            self.updated_at = now;
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weight_defaults_to_one_without_usage() {
        assert_eq!(Effectiveness::default().weight(), 1.0);
    }

    #[test]
    fn test_weight_tracks_success_rate() {
        let mut eff = Effectiveness::default();
        eff.record(true);
        eff.record(false);
        assert_eq!(eff.weight(), 0.75);

        eff.record(false);
        eff.record(false);
        assert_eq!(eff.success, 1);
        assert_eq!(eff.failure, 3);
        assert!((eff.weight() - 0.625).abs() < 1e-9);
    }

    #[test]
    fn test_learned_keywords_are_deduplicated() {
        let mut profile = ToolProfile::new(ToolId::from("search_videos"));
        assert!(profile.learn_keyword("주식"));
        assert!(!profile.learn_keyword("주식"));
        assert_eq!(profile.keywords().count(), 1);
    }

    #[test]
    fn test_prune_keeps_used_and_recent_keywords() {
        let now = Utc::now();
        let mut profile = ToolProfile::new(ToolId::from("ask_assistant"));
        profile.learned_keywords = vec![
            LearnedKeyword { keyword: "old".into(), learned_at: now - Duration::days(40), hits: 0 },
            LearnedKeyword { keyword: "used".into(), learned_at: now - Duration::days(40), hits: 5 },
            LearnedKeyword { keyword: "fresh".into(), learned_at: now, hits: 0 },
        ];

        let removed = profile.prune_keywords(1, 30, now);
        assert_eq!(removed, vec!["old".to_string()]);
        let left: Vec<_> = profile.keywords().collect();
        assert_eq!(left, vec!["used", "fresh"]);
    }

    #[test]
    fn test_register_hits_only_touches_matching_keywords() {
        let mut profile = ToolProfile::new(ToolId::from("t"));
        profile.learn_keyword("alpha");
        profile.learn_keyword("beta");

        let hits = profile.register_hits(&["beta".to_string(), "gamma".to_string()]);
        assert_eq!(hits, 1);
        assert_eq!(profile.learned_keywords[1].hits, 1);
        assert_eq!(profile.learned_keywords[0].hits, 0);
    }
}
