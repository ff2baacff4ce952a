// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Anaphoric references to earlier turns ("위에 검색한", "that one", ...)

use concierge_cortex::domain::Turn;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reference categories in detection order. The first matching category wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceType {
    Above,
    Below,
    Previous,
    Recent,
    Last,
    Earlier,
    Later,
    This,
    That,
    These,
    Those,
}

impl ReferenceType {
    pub const ALL: [ReferenceType; 11] = [
        ReferenceType::Above,
        ReferenceType::Below,
        ReferenceType::Previous,
        ReferenceType::Recent,
        ReferenceType::Last,
        ReferenceType::Earlier,
        ReferenceType::Later,
        ReferenceType::This,
        ReferenceType::That,
        ReferenceType::These,
        ReferenceType::Those,
    ];

    /// Positional references get tool-specific rewrite templates.
    pub fn is_positional(self) -> bool {
        matches!(
            self,
            ReferenceType::Above | ReferenceType::Previous | ReferenceType::Recent
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReferenceType::Above => "above",
            ReferenceType::Below => "below",
            ReferenceType::Previous => "previous",
            ReferenceType::Recent => "recent",
            ReferenceType::Last => "last",
            ReferenceType::Earlier => "earlier",
            ReferenceType::Later => "later",
            ReferenceType::This => "this",
            ReferenceType::That => "that",
            ReferenceType::These => "these",
            ReferenceType::Those => "those",
        }
    }
}

impl fmt::Display for ReferenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of reference detection and resolution. Transient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceAnalysis {
    pub has_reference: bool,
    pub reference_type: Option<ReferenceType>,
    pub original_message: String,
    /// Never empty; falls back to the original message.
    pub resolved_message: String,
    pub reference_target: Option<Turn>,
    pub context_found: bool,
}

impl ReferenceAnalysis {
    pub fn none(message: &str) -> Self {
        Self {
            has_reference: false,
            reference_type: None,
            original_message: message.to_string(),
            resolved_message: message.to_string(),
            reference_target: None,
            context_found: false,
        }
    }

    pub fn detected(message: &str, reference_type: ReferenceType) -> Self {
        Self {
            has_reference: true,
            reference_type: Some(reference_type),
            ..Self::none(message)
        }
    }

    /// Attach the resolved target and rewritten message. An empty rewrite
    /// keeps the original message.
    pub fn resolved(mut self, target: Turn, resolved_message: String) -> Self {
        if !resolved_message.trim().is_empty() {
            self.resolved_message = resolved_message;
        }
        self.reference_target = Some(target);
        self.context_found = true;
        self
    }
}
