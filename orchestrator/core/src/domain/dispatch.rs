// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Dispatch
//!
//! Routing decisions and the executor seam for the out-of-process tools.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Value types crossing the transport boundary

use async_trait::async_trait;
use concierge_cortex::domain::ToolId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::reference::ReferenceAnalysis;

/// Which rule produced the final tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    /// A pattern matched a tool other than the statistical pick
    Pattern,
    /// Statistical pick without a pattern match
    Scorer,
    /// Pattern and statistical pick agree
    Agreed,
    /// Empty message, or zero confidence without a pattern match
    Fallback,
}

impl DecisionSource {
    pub fn as_str(self) -> &'static str {
        match self {
            DecisionSource::Pattern => "pattern",
            DecisionSource::Scorer => "scorer",
            DecisionSource::Agreed => "agreed",
            DecisionSource::Fallback => "fallback",
        }
    }
}

/// Output of `route`. Always usable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub tool: ToolId,
    pub arguments: Map<String, Value>,
    /// Present when the message carried a reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<ReferenceAnalysis>,
    pub source: DecisionSource,
    /// Effectiveness-weighted statistical score of the statistical pick
    pub confidence: f64,
}

impl RoutingDecision {
    /// Message the arguments were extracted from
    pub fn effective_message(&self) -> Option<&str> {
        self.reference.as_ref().map(|r| r.resolved_message.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ToolExecutionError {
    #[error("tool not available: {0}")]
    Unavailable(ToolId),

    #[error("tool {tool_id} failed: {message}")]
    Failed { tool_id: ToolId, message: String },
}

/// Runs a routed tool. Implementations live outside the engine.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(
        &self,
        tool_id: &ToolId,
        arguments: &Map<String, Value>,
    ) -> Result<String, ToolExecutionError>;
}
