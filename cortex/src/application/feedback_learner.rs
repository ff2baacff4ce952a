// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # FeedbackLearner: outcome recording and keyword learning
//!
//! Application service closing the routing feedback loop. Tool outcomes feed
//! the [`EffectivenessTracker`]; explicit feedback and conversation history
//! grow the learned-keyword sets of the [`PatternStore`].
//!
//! ## Negative feedback
//!
//! The message is rescored without the rejected tool and the best remaining
//! tool becomes the alternative. The rejected tool records a failure, the
//! alternative a success, and every message keyword found in the
//! alternative's relevance vocabulary is learned for it.
//!
//! ## Positive feedback
//!
//! The selected tool records a success and its learned keywords present in
//! the message register a usage hit, which protects them from pruning.
//!
//! Learning only appends on the hot path. Pruning is a maintenance call.

use async_trait::async_trait;
use anyhow::Result;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::application::effectiveness::EffectivenessTracker;
use crate::application::intent_scorer::LexicalIntentScorer;
use crate::application::pattern_store::PatternStore;
use crate::domain::lexicon::collapse_whitespace;
use crate::domain::{
    CortexEvent, Effectiveness, LearnedKeyword, LearningSource, Role, ToolId, ToolRegistry, Turn,
};

/// Feedback words that mark a routing decision as wrong
pub const DEFAULT_NEGATION_WORDS: &[&str] = &["잘못", "틀림", "아님", "no", "wrong"];

/// Minimum single-keyword score for a pattern suggestion
pub const SUGGESTION_THRESHOLD: f64 = 0.7;

const TOP_KEYWORDS: usize = 10;

/// Event bus trait for publishing domain events
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, event: CortexEvent) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    Negative,
    Positive,
}

/// Negative when the normalized text equals a negation word or contains one
/// as a token. Non-ASCII negation words also match as token prefixes, so
/// attached particles (잘못됐어) still count.
pub fn classify_feedback(text: &str, negation_words: &[String]) -> FeedbackKind {
    let normalized = collapse_whitespace(text);
    let tokens: Vec<&str> = normalized
        .split(|c: char| !(c.is_alphanumeric() || c == '_' || c == '-'))
        .filter(|t| !t.is_empty())
        .collect();

    let negative = negation_words.iter().any(|word| {
        normalized == *word
            || tokens
                .iter()
                .any(|t| t == word || (!word.is_ascii() && t.starts_with(word.as_str())))
    });

    if negative {
        FeedbackKind::Negative
    } else {
        FeedbackKind::Positive
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackOutcome {
    pub kind: FeedbackKind,
    pub selected_tool: ToolId,
    pub alternative: Option<ToolId>,
    pub learned_keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternSuggestion {
    pub keyword: String,
    pub tool_id: ToolId,
    pub score: f64,
    pub frequency: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolEffectivenessReport {
    pub tool_id: ToolId,
    pub success: u64,
    pub failure: u64,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningAnalytics {
    pub learned_keywords: Vec<(ToolId, Vec<LearnedKeyword>)>,
    pub effectiveness: Vec<ToolEffectivenessReport>,
    pub keyword_frequency: HashMap<String, u64>,
    pub top_keywords: Vec<(String, u64)>,
    pub generated_at: DateTime<Utc>,
}

/// FeedbackLearner interface
#[async_trait]
pub trait FeedbackLearner: Send + Sync {
    /// Increment one outcome counter
    async fn record_outcome(&self, tool_id: &ToolId, success: bool) -> Result<Effectiveness>;

    /// Outcome of an executed turn. Successes count keyword hits; failures
    /// teach the message's keywords to every other tool they are relevant to.
    async fn record_usage(&self, message: &str, tool_id: &ToolId, success: bool) -> Result<Effectiveness>;

    async fn on_feedback(
        &self,
        message: &str,
        selected_tool: &ToolId,
        feedback: &str,
    ) -> Result<FeedbackOutcome>;

    /// Weak supervision over user turns. Returns the number of keywords added.
    async fn analyze_history(&self, turns: &[Turn]) -> Result<usize>;

    /// Maintenance: drop unused learned keywords. Returns the number removed.
    async fn prune_learned_keywords(&self, min_hits: u64, max_age_days: i64) -> Result<usize>;

    fn suggest_patterns(&self, message: &str) -> Vec<PatternSuggestion>;

    async fn export_analytics(&self) -> LearningAnalytics;
}

/// Standard implementation of FeedbackLearner
pub struct StandardFeedbackLearner {
    registry: Arc<ToolRegistry>,
    scorer: Arc<LexicalIntentScorer>,
    patterns: Arc<PatternStore>,
    effectiveness: Arc<EffectivenessTracker>,
    event_bus: Arc<dyn EventBus>,
    negation_words: Vec<String>,
    keyword_frequency: Mutex<HashMap<String, u64>>,
}

impl StandardFeedbackLearner {
    pub fn new(
        registry: Arc<ToolRegistry>,
        scorer: Arc<LexicalIntentScorer>,
        patterns: Arc<PatternStore>,
        effectiveness: Arc<EffectivenessTracker>,
        event_bus: Arc<dyn EventBus>,
    ) -> Self {
        Self {
            registry,
            scorer,
            patterns,
            effectiveness,
            event_bus,
            negation_words: DEFAULT_NEGATION_WORDS.iter().map(|w| w.to_string()).collect(),
            keyword_frequency: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_negation_words(mut self, words: Vec<String>) -> Self {
        self.negation_words = words.into_iter().map(|w| w.trim().to_lowercase()).collect();
        self
    }

    pub fn negation_words(&self) -> &[String] {
        &self.negation_words
    }

    /// Best remaining tool by score. Ties prefer the tool whose relevance
    /// vocabulary overlaps the message most, then registry order.
    fn choose_alternative(&self, message: &str, keywords: &[String], rejected: &ToolId) -> Option<ToolId> {
        let mut best: Option<(f64, usize, ToolId)> = None;

        for scored in self.scorer.score(message) {
            if &scored.tool_id == rejected {
                continue;
            }
            let overlap = self
                .registry
                .get(&scored.tool_id)
                .map(|tool| keywords.iter().filter(|k| tool.is_relevant(k)).count())
                .unwrap_or(0);

            let better = match &best {
                None => true,
                Some((score, best_overlap, _)) => {
                    scored.score > *score || (scored.score == *score && overlap > *best_overlap)
                }
            };
            if better {
                best = Some((scored.score, overlap, scored.tool_id));
            }
        }

        best.map(|(_, _, tool_id)| tool_id)
    }

    fn count_keywords(&self, keywords: &[String]) {
        let mut frequency = self.keyword_frequency.lock();
        for keyword in keywords {
            *frequency.entry(keyword.clone()).or_insert(0) += 1;
        }
    }

    async fn learn(&self, tool_id: &ToolId, keywords: &[String], source: LearningSource) -> Result<Vec<String>> {
        let added = self.patterns.learn_keywords(tool_id, keywords).await?;
        for keyword in &added {
            metrics::counter!("concierge_keywords_learned_total", "tool" => tool_id.to_string())
                .increment(1);
            self.event_bus
                .publish(CortexEvent::KeywordLearned {
                    tool_id: tool_id.clone(),
                    keyword: keyword.clone(),
                    source,
                    timestamp: Utc::now(),
                })
                .await?;
        }
        Ok(added)
    }
}

#[async_trait]
impl FeedbackLearner for StandardFeedbackLearner {
    async fn record_outcome(&self, tool_id: &ToolId, success: bool) -> Result<Effectiveness> {
        self.registry.require(tool_id)?;
        let updated = self.effectiveness.record(tool_id, success).await;

        self.event_bus
            .publish(CortexEvent::OutcomeRecorded {
                tool_id: tool_id.clone(),
                success,
                success_count: updated.success,
                failure_count: updated.failure,
                timestamp: Utc::now(),
            })
            .await?;

        Ok(updated)
    }

    async fn record_usage(&self, message: &str, tool_id: &ToolId, success: bool) -> Result<Effectiveness> {
        let updated = self.record_outcome(tool_id, success).await?;
        let keywords = self.scorer.extractor().extract_unique(message);
        if success {
            let hits = self.patterns.register_hits(tool_id, &keywords).await;
            debug!(tool_id = %tool_id, hits, "Registered learned keyword hits");
            return Ok(updated);
        }

        for tool in self.registry.tools().iter().filter(|tool| &tool.id != tool_id) {
            let relevant: Vec<String> = keywords.iter().filter(|k| tool.is_relevant(k)).cloned().collect();
            if relevant.is_empty() {
                continue;
            }
            let added = self.learn(&tool.id, &relevant, LearningSource::FailedExecution).await?;
            if !added.is_empty() {
                info!(failed_tool = %tool_id, tool_id = %tool.id, keywords = ?added, "Learned keywords from failed execution");
            }
        }
        Ok(updated)
    }

    async fn on_feedback(
        &self,
        message: &str,
        selected_tool: &ToolId,
        feedback: &str,
    ) -> Result<FeedbackOutcome> {
        self.registry.require(selected_tool)?;

        let keywords = self.scorer.extractor().extract_unique(message);
        self.count_keywords(&keywords);

        let kind = classify_feedback(feedback, &self.negation_words);
        let mut alternative = None;
        let mut learned_keywords = Vec::new();

        match kind {
            FeedbackKind::Negative => {
                self.record_outcome(selected_tool, false).await?;

                if let Some(alt) = self.choose_alternative(message, &keywords, selected_tool) {
                    self.record_outcome(&alt, true).await?;

                    let tool = self.registry.require(&alt)?;
                    let relevant: Vec<String> = keywords
                        .iter()
                        .filter(|k| tool.is_relevant(k))
                        .cloned()
                        .collect();
                    learned_keywords = self.learn(&alt, &relevant, LearningSource::Feedback).await?;
                    alternative = Some(alt);
                }
            }
            FeedbackKind::Positive => {
                self.record_outcome(selected_tool, true).await?;
                self.patterns.register_hits(selected_tool, &keywords).await;
            }
        }

        let kind_label = match kind {
            FeedbackKind::Negative => "negative",
            FeedbackKind::Positive => "positive",
        };
        metrics::counter!("concierge_feedback_total", "kind" => kind_label).increment(1);

        info!(
            selected_tool = %selected_tool,
            kind = kind_label,
            alternative = ?alternative,
            learned = learned_keywords.len(),
            "Applied routing feedback"
        );

        self.event_bus
            .publish(CortexEvent::FeedbackApplied {
                selected_tool: selected_tool.clone(),
                negative: kind == FeedbackKind::Negative,
                alternative: alternative.clone(),
                keywords_learned: learned_keywords.len(),
                timestamp: Utc::now(),
            })
            .await?;

        Ok(FeedbackOutcome {
            kind,
            selected_tool: selected_tool.clone(),
            alternative,
            learned_keywords,
        })
    }

    async fn analyze_history(&self, turns: &[Turn]) -> Result<usize> {
        let mut added = 0;
        let mut analyzed = 0;

        for turn in turns.iter().filter(|t| t.role == Role::User) {
            analyzed += 1;
            let keywords = self.scorer.extractor().extract_unique(&turn.content);
            for tool in self.registry.tools() {
                let relevant: Vec<String> = keywords
                    .iter()
                    .filter(|k| tool.is_relevant(k))
                    .cloned()
                    .collect();
                if relevant.is_empty() {
                    continue;
                }
                added += self.learn(&tool.id, &relevant, LearningSource::History).await?.len();
            }
        }

        info!(turns_analyzed = analyzed, keywords_added = added, "Analyzed conversation history");

        self.event_bus
            .publish(CortexEvent::HistoryAnalyzed {
                turns_analyzed: analyzed,
                keywords_added: added,
                timestamp: Utc::now(),
            })
            .await?;

        Ok(added)
    }

    async fn prune_learned_keywords(&self, min_hits: u64, max_age_days: i64) -> Result<usize> {
        let pruned = self.patterns.prune(min_hits, max_age_days).await;
        let mut count = 0;

        for (tool_id, keywords) in pruned {
            count += keywords.len();
            self.event_bus
                .publish(CortexEvent::KeywordsPruned {
                    tool_id,
                    keywords,
                    timestamp: Utc::now(),
                })
                .await?;
        }

        Ok(count)
    }

    fn suggest_patterns(&self, message: &str) -> Vec<PatternSuggestion> {
        let keywords = self.scorer.extractor().extract_unique(message);
        self.count_keywords(&keywords);
        let frequency = self.keyword_frequency.lock();

        let mut suggestions = Vec::new();
        for keyword in &keywords {
            for tool_id in self.registry.ids() {
                let score = self.scorer.keyword_score(tool_id, keyword);
                if score >= SUGGESTION_THRESHOLD {
                    suggestions.push(PatternSuggestion {
                        keyword: keyword.clone(),
                        tool_id: tool_id.clone(),
                        score,
                        frequency: frequency.get(keyword).copied().unwrap_or(0),
                    });
                }
            }
        }
        suggestions
    }

    async fn export_analytics(&self) -> LearningAnalytics {
        let learned_keywords = self.patterns.learned().await;
        let counters = self.effectiveness.snapshot();

        let effectiveness = self
            .registry
            .ids()
            .filter_map(|id| {
                counters.get(id).map(|eff| ToolEffectivenessReport {
                    tool_id: id.clone(),
                    success: eff.success,
                    failure: eff.failure,
                    weight: eff.weight(),
                })
            })
            .collect();

        let keyword_frequency = self.keyword_frequency.lock().clone();
        let mut top_keywords: Vec<(String, u64)> =
            keyword_frequency.iter().map(|(k, v)| (k.clone(), *v)).collect();
        top_keywords.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        top_keywords.truncate(TOP_KEYWORDS);

        LearningAnalytics {
            learned_keywords,
            effectiveness,
            keyword_frequency,
            top_keywords,
            generated_at: Utc::now(),
        }
    }
}
