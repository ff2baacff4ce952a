// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Embedding Client
//!
//! Provides a deterministic, in-process embedding backend.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Implements `EmbeddingProvider` by feature hashing keywords and
//!   their character bigrams into a fixed-size, L2-normalized vector

use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::domain::KeywordExtractor;
use crate::infrastructure::repository::{EmbeddingError, EmbeddingProvider};

/// Matches the dimensionality of all-MiniLM-L6-v2 so a model-backed
/// provider can replace this one without reshaping stored records.
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 384;

const KEYWORD_WEIGHT: f32 = 1.0;
const BIGRAM_WEIGHT: f32 = 0.5;

/// Feature-hashing embedding client
pub struct HashEmbeddingClient {
    dimensions: usize,
    extractor: KeywordExtractor,
}

impl HashEmbeddingClient {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
            extractor: KeywordExtractor::default(),
        }
    }

    /// Generate embedding for text
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];

        for keyword in self.extractor.extract(text) {
            self.accumulate(&mut vector, &keyword, KEYWORD_WEIGHT);

            let chars: Vec<char> = keyword.chars().collect();
            for pair in chars.windows(2) {
                let bigram: String = pair.iter().collect();
                self.accumulate(&mut vector, &format!("#{bigram}"), BIGRAM_WEIGHT);
            }
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }

    fn accumulate(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let mut hasher = DefaultHasher::new();
        feature.hash(&mut hasher);
        let hash = hasher.finish();

        let slot = (hash % self.dimensions as u64) as usize;
        let sign = if (hash >> 63) & 1 == 1 { -1.0 } else { 1.0 };
        vector[slot] += sign * weight;
    }
}

impl Default for HashEmbeddingClient {
    fn default() -> Self {
        Self::new(DEFAULT_EMBEDDING_DIMENSIONS)
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self.embed_sync(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
