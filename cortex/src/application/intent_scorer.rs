// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Lexical Intent Scorer
//!
//! Scores every tool by keyword-tier overlap with the message, then weights
//! the scores by each tool's historical effectiveness.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Statistical tool selection; ties break on registry order

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::application::effectiveness::EffectivenessTracker;
use crate::application::pattern_store::{PatternSnapshot, PatternStore};
use crate::domain::{KeywordExtractor, KeywordTier, ToolDefinition, ToolId, ToolRegistry};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolScore {
    pub tool_id: ToolId,
    pub score: f64,
}

pub struct LexicalIntentScorer {
    registry: Arc<ToolRegistry>,
    extractor: Arc<KeywordExtractor>,
    patterns: Arc<PatternStore>,
    effectiveness: Arc<EffectivenessTracker>,
}

impl LexicalIntentScorer {
    pub fn new(
        registry: Arc<ToolRegistry>,
        extractor: Arc<KeywordExtractor>,
        patterns: Arc<PatternStore>,
        effectiveness: Arc<EffectivenessTracker>,
    ) -> Self {
        Self {
            registry,
            extractor,
            patterns,
            effectiveness,
        }
    }

    pub fn extractor(&self) -> &KeywordExtractor {
        &self.extractor
    }

    /// Unweighted scores in registry order. Zero for every tool when the
    /// message has no keywords.
    pub fn score(&self, message: &str) -> Vec<ToolScore> {
        let keywords = self.extractor.extract(message);
        let snapshot = self.patterns.snapshot();
        self.registry
            .tools()
            .iter()
            .map(|tool| ToolScore {
                tool_id: tool.id.clone(),
                score: keyword_score(tool, &keywords, &snapshot),
            })
            .collect()
    }

    /// Scores multiplied by effectiveness weight
    pub fn weighted_scores(&self, message: &str) -> Vec<ToolScore> {
        self.score(message)
            .into_iter()
            .map(|s| ToolScore {
                score: s.score * self.effectiveness.weight(&s.tool_id),
                tool_id: s.tool_id,
            })
            .collect()
    }

    /// Argmax of the weighted scores; the earliest tool wins ties.
    pub fn select_tool(&self, message: &str) -> (ToolId, f64) {
        let best = argmax(self.weighted_scores(message).into_iter());
        // Registry is never empty, so argmax always yields a tool.
        best.map(|s| (s.tool_id, s.score)).unwrap_or_else(|| {
            let first = self.registry.tools()[0].id.clone();
            (first, 0.0)
        })
    }

    /// Score of a single keyword against one tool
    pub fn keyword_score(&self, tool_id: &ToolId, keyword: &str) -> f64 {
        let snapshot = self.patterns.snapshot();
        self.registry
            .get(tool_id)
            .map(|tool| keyword_score(tool, &[keyword.to_lowercase()], &snapshot))
            .unwrap_or(0.0)
    }
}

fn keyword_score(tool: &ToolDefinition, keywords: &[String], snapshot: &PatternSnapshot) -> f64 {
    if keywords.is_empty() {
        return 0.0;
    }

    let total: f64 = keywords
        .iter()
        .map(|keyword| match tool.keywords.tier_of(keyword) {
            Some(tier) => tier.weight(),
            None if snapshot.is_learned(&tool.id, keyword) => KeywordTier::Low.weight(),
            None => 0.0,
        })
        .sum();

    total / keywords.len() as f64
}

fn argmax(scores: impl Iterator<Item = ToolScore>) -> Option<ToolScore> {
    scores.fold(None, |best: Option<ToolScore>, candidate| match best {
        Some(b) if b.score >= candidate.score => Some(b),
        _ => Some(candidate),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TieredKeywords;
    use crate::infrastructure::InMemoryToolProfileRepository;

    fn words(w: &[&str]) -> Vec<String> {
        w.iter().map(|s| s.to_string()).collect()
    }

    fn fixture() -> (LexicalIntentScorer, Arc<PatternStore>, Arc<EffectivenessTracker>) {
        let registry = Arc::new(
            ToolRegistry::new(vec![
                ToolDefinition::new("search_videos").with_keywords(TieredKeywords {
                    high: words(&["videos", "youtube", "find"]),
                    medium: words(&["clip"]),
                    low: vec![],
                }),
                ToolDefinition::new("ask_assistant").with_keywords(TieredKeywords {
                    high: words(&["question"]),
                    medium: words(&["videos"]),
                    low: words(&["explain"]),
                }),
                ToolDefinition::new("explain_concept").with_keywords(TieredKeywords {
                    high: words(&["explain"]),
                    ..Default::default()
                }),
            ])
            .unwrap(),
        );
        let patterns = Arc::new(
            PatternStore::new(registry.clone(), &[], Arc::new(InMemoryToolProfileRepository::new()))
                .unwrap(),
        );
        let effectiveness = Arc::new(EffectivenessTracker::new());
        let scorer = LexicalIntentScorer::new(
            registry,
            Arc::new(KeywordExtractor::default()),
            patterns.clone(),
            effectiveness.clone(),
        );
        (scorer, patterns, effectiveness)
    }

    #[test]
    fn test_score_averages_tier_weights_over_keywords() {
        let (scorer, _, _) = fixture();
        let scores = scorer.score("find me videos about rust");
        // keywords: find, videos, rust
        assert_eq!(scores[0].tool_id.as_str(), "search_videos");
        assert!((scores[0].score - 2.0).abs() < 1e-9);
        assert!((scores[1].score - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(scores[2].score, 0.0);
    }

    #[test]
    fn test_no_keywords_scores_zero() {
        let (scorer, _, _) = fixture();
        let (_, confidence) = scorer.select_tool("?? !");
        assert_eq!(confidence, 0.0);
    }

    #[test]
    fn test_ties_break_on_registry_order() {
        let (scorer, _, _) = fixture();
        // "question explain": ask (3+1)/2 = 2.0 beats explain_concept 3/2.
        assert_eq!(scorer.select_tool("question explain").0.as_str(), "ask_assistant");
        // "videos explain": every tool scores 1.5, the first declared wins.
        let scores = scorer.score("videos explain");
        assert!(scores.iter().all(|s| (s.score - 1.5).abs() < 1e-9));
        assert_eq!(scorer.select_tool("videos explain").0.as_str(), "search_videos");
    }

    #[tokio::test]
    async fn test_effectiveness_reweights_selection() {
        let (scorer, _, effectiveness) = fixture();
        let explain = ToolId::from("explain_concept");

        // "explain" alone: ask 1.0, explain 3.0.
        assert_eq!(scorer.select_tool("explain").0, explain);

        for _ in 0..10 {
            effectiveness.record(&explain, false).await;
        }
        // explain weight falls to 0.5: 1.5 vs ask 1.0, still explain.
        assert_eq!(scorer.select_tool("explain").0, explain);
        let weighted = scorer.weighted_scores("explain");
        assert!((weighted[2].score - 1.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_learned_keywords_count_at_low_tier() {
        let (scorer, patterns, _) = fixture();
        let tool = ToolId::from("explain_concept");
        assert_eq!(scorer.keyword_score(&tool, "monad"), 0.0);

        patterns.learn_keywords(&tool, &words(&["monad"])).await.unwrap();
        assert_eq!(scorer.keyword_score(&tool, "monad"), 1.0);
    }
}
