// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Application services of the learning and memory layer
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Scoring, pattern overrides, feedback learning and conversation memory

pub mod effectiveness;
pub mod feedback_learner;
pub mod intent_scorer;
pub mod keyword_pruner;
pub mod pattern_store;
pub mod session_memory;
pub mod vector_memory;

pub use effectiveness::EffectivenessTracker;
pub use feedback_learner::{
    classify_feedback, EventBus, FeedbackKind, FeedbackLearner, FeedbackOutcome, LearningAnalytics,
    PatternSuggestion, StandardFeedbackLearner, ToolEffectivenessReport, DEFAULT_NEGATION_WORDS,
    SUGGESTION_THRESHOLD,
};
pub use intent_scorer::{LexicalIntentScorer, ToolScore};
pub use keyword_pruner::{KeywordPruner, KeywordPrunerConfig};
pub use pattern_store::{PatternError, PatternSnapshot, PatternStore};
pub use session_memory::SessionMemory;
pub use vector_memory::{MemoryError, VectorMemory, DEFAULT_EMBEDDING_TIMEOUT};
