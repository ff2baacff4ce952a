// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Embedding records held by the per-user similarity index.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::tool::ToolId;
use super::turn::{Role, Turn, UserId};

/// An embedded turn. Retained indefinitely, always scoped to one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub id: Uuid,
    pub user_id: UserId,
    pub role: Role,
    pub content: String,
    pub embedding: Vec<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_used: Option<ToolId>,
    pub timestamp: DateTime<Utc>,
}

impl EmbeddingRecord {
    pub fn from_turn(user_id: UserId, turn: &Turn, embedding: Vec<f32>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            role: turn.role,
            content: turn.content.clone(),
            embedding,
            tool_used: turn.tool_used.clone(),
            timestamp: turn.timestamp,
        }
    }

    /// Rebuild the turn this record was embedded from.
    pub fn to_turn(&self) -> Turn {
        Turn {
            role: self.role,
            content: self.content.clone(),
            timestamp: self.timestamp,
            tool_used: self.tool_used.clone(),
            metadata: Default::default(),
        }
    }
}

/// A search hit with its cosine distance (`1 - cosine similarity`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRecord {
    pub record: EmbeddingRecord,
    pub distance: f32,
}

/// Cosine distance; vectors of mismatched length or zero norm are maximally distant.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 1.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }

    1.0 - dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_distance() {
        assert!(cosine_distance(&[1.0, 0.0], &[1.0, 0.0]).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
        assert_eq!(cosine_distance(&[1.0], &[1.0, 0.0]), 1.0);
    }

    #[test]
    fn test_record_round_trips_turn_fields() {
        let turn = Turn::assistant("📺 rust", Some(ToolId::from("search_videos")));
        let record = EmbeddingRecord::from_turn(UserId::new("u"), &turn, vec![1.0]);
        let back = record.to_turn();
        assert_eq!(back.content, turn.content);
        assert_eq!(back.tool_used, turn.tool_used);
        assert_eq!(back.timestamp, turn.timestamp);
    }
}
