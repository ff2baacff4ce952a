// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Concierge Cortex
//!
//! Learning and memory layer of the dispatch engine: tool registry, lexical
//! scoring, effectiveness counters, learned patterns and conversation memory.
//!
//! # Architecture
//!
//! - **Layer:** Learning & Memory Layer
//! - **Purpose:** Everything routing reads from and writes back to

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use domain::*;
pub use infrastructure::*;
