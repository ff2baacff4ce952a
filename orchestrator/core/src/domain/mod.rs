// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Dispatch domain
//!
//! Configuration manifest, routing decisions, references and identity.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Pure types shared by the dispatch services and hosts

pub mod dispatch;
pub mod dispatch_config;
pub mod events;
pub mod identity;
pub mod reference;

pub use dispatch::{DecisionSource, RoutingDecision, ToolExecutionError, ToolExecutor};
pub use dispatch_config::{
    ArgumentRule, ConfigError, DispatchConfigManifest, DispatchConfigSpec, RewriteStyle, StorageBackend,
    ToolConfig, ToolFamily,
};
pub use events::DispatchEvent;
pub use identity::UserIdentityResolver;
pub use reference::{ReferenceAnalysis, ReferenceType};
