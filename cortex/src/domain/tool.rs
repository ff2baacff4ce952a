// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Tool Registry
//!
//! Provides the ordered set of dispatchable tools and their lexical vocabulary.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Declares tools, keyword tiers and registry order (the tie-break for every ranking)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Stable identifier of a dispatchable tool (e.g. `search_videos`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolId(String);

impl ToolId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ToolId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Keyword tier, weighted high=3, medium=2, low=1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeywordTier {
    High,
    Medium,
    Low,
}

impl KeywordTier {
    pub fn weight(self) -> f64 {
        match self {
            KeywordTier::High => 3.0,
            KeywordTier::Medium => 2.0,
            KeywordTier::Low => 1.0,
        }
    }
}

/// Hand-authored keyword tiers of one tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TieredKeywords {
    #[serde(default)]
    pub high: Vec<String>,
    #[serde(default)]
    pub medium: Vec<String>,
    #[serde(default)]
    pub low: Vec<String>,
}

impl TieredKeywords {
    /// Highest tier containing `keyword`. Keywords are stored lowercase.
    pub fn tier_of(&self, keyword: &str) -> Option<KeywordTier> {
        if self.high.iter().any(|k| k == keyword) {
            Some(KeywordTier::High)
        } else if self.medium.iter().any(|k| k == keyword) {
            Some(KeywordTier::Medium)
        } else if self.low.iter().any(|k| k == keyword) {
            Some(KeywordTier::Low)
        } else {
            None
        }
    }

    fn normalized(self) -> Self {
        Self {
            high: lowercase_all(self.high),
            medium: lowercase_all(self.medium),
            low: lowercase_all(self.low),
        }
    }
}

/// A dispatchable tool and the vocabulary used to route and learn for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub id: ToolId,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub keywords: TieredKeywords,
    /// Words that, seen in a misrouted message, are learned for this tool.
    #[serde(default)]
    pub relevance: Vec<String>,
    /// Words describing what this tool's results contain.
    #[serde(default)]
    pub content_types: Vec<String>,
}

impl ToolDefinition {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: ToolId::new(id),
            description: String::new(),
            keywords: TieredKeywords::default(),
            relevance: Vec::new(),
            content_types: Vec::new(),
        }
    }

    pub fn with_keywords(mut self, keywords: TieredKeywords) -> Self {
        self.keywords = keywords;
        self
    }

    pub fn with_relevance<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.relevance = words.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_content_types<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.content_types = words.into_iter().map(Into::into).collect();
        self
    }

    /// Whether `keyword` belongs to the relevance vocabulary.
    pub fn is_relevant(&self, keyword: &str) -> bool {
        self.relevance.iter().any(|r| r == keyword)
    }

    fn normalized(self) -> Self {
        Self {
            keywords: self.keywords.normalized(),
            relevance: lowercase_all(self.relevance),
            content_types: lowercase_all(self.content_types),
            ..self
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("tool registry is empty")]
    Empty,

    #[error("duplicate tool id: {0}")]
    DuplicateTool(ToolId),

    #[error("unknown tool: {0}")]
    UnknownTool(ToolId),
}

/// Ordered, immutable tool registry. Declaration order breaks every tie.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: Vec<ToolDefinition>,
    index: HashMap<ToolId, usize>,
}

impl ToolRegistry {
    pub fn new(tools: Vec<ToolDefinition>) -> Result<Self, RegistryError> {
        if tools.is_empty() {
            return Err(RegistryError::Empty);
        }

        let mut index = HashMap::with_capacity(tools.len());
        let mut normalized = Vec::with_capacity(tools.len());
        for (position, tool) in tools.into_iter().enumerate() {
            if index.insert(tool.id.clone(), position).is_some() {
                return Err(RegistryError::DuplicateTool(tool.id));
            }
            normalized.push(tool.normalized());
        }

        Ok(Self {
            tools: normalized,
            index,
        })
    }

    pub fn tools(&self) -> &[ToolDefinition] {
        &self.tools
    }

    pub fn ids(&self) -> impl Iterator<Item = &ToolId> {
        self.tools.iter().map(|t| &t.id)
    }

    pub fn get(&self, id: &ToolId) -> Option<&ToolDefinition> {
        self.index.get(id).map(|&i| &self.tools[i])
    }

    pub fn require(&self, id: &ToolId) -> Result<&ToolDefinition, RegistryError> {
        self.get(id)
            .ok_or_else(|| RegistryError::UnknownTool(id.clone()))
    }

    pub fn contains(&self, id: &ToolId) -> bool {
        self.index.contains_key(id)
    }

    pub fn position(&self, id: &ToolId) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

fn lowercase_all(words: Vec<String>) -> Vec<String> {
    words.into_iter().map(|w| w.trim().to_lowercase()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiered(high: &[&str], medium: &[&str], low: &[&str]) -> TieredKeywords {
        let own = |w: &[&str]| w.iter().map(|s| s.to_string()).collect();
        TieredKeywords {
            high: own(high),
            medium: own(medium),
            low: own(low),
        }
    }

    #[test]
    fn test_highest_tier_wins() {
        let keywords = tiered(&["video"], &["video", "clip"], &["watch"]);
        assert_eq!(keywords.tier_of("video"), Some(KeywordTier::High));
        assert_eq!(keywords.tier_of("clip"), Some(KeywordTier::Medium));
        assert_eq!(keywords.tier_of("watch"), Some(KeywordTier::Low));
        assert_eq!(keywords.tier_of("joke"), None);
    }

    #[test]
    fn test_registry_rejects_duplicates_and_empty() {
        assert!(matches!(ToolRegistry::new(vec![]), Err(RegistryError::Empty)));

        let result = ToolRegistry::new(vec![ToolDefinition::new("a"), ToolDefinition::new("a")]);
        assert!(matches!(result, Err(RegistryError::DuplicateTool(id)) if id.as_str() == "a"));
    }

    #[test]
    fn test_registry_normalizes_vocabulary_and_keeps_order() {
        let registry = ToolRegistry::new(vec![
            ToolDefinition::new("search")
                .with_keywords(tiered(&["YouTube"], &[], &[]))
                .with_relevance(["Video "]),
            ToolDefinition::new("ask"),
        ])
        .unwrap();

        let search = registry.require(&ToolId::from("search")).unwrap();
        assert_eq!(search.keywords.tier_of("youtube"), Some(KeywordTier::High));
        assert!(search.is_relevant("video"));
        assert_eq!(registry.position(&ToolId::from("ask")), Some(1));
        assert!(registry.require(&ToolId::from("missing")).is_err());
    }
}
