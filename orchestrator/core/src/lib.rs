// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Concierge dispatch engine
//!
//! Routes free-text messages to tools, resolving references to earlier turns
//! and learning from outcomes through `concierge_cortex`.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Dispatch orchestrator, configuration and host bootstrap

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
