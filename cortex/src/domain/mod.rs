// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain model of the learning and memory layer
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Tools, turns, sessions, learned profiles and their events

pub mod events;
pub mod lexicon;
pub mod memory;
pub mod profile;
pub mod tool;
pub mod turn;

pub use events::*;
pub use lexicon::{KeywordExtractor, DEFAULT_STOPWORDS};
pub use memory::*;
pub use profile::*;
pub use tool::*;
pub use turn::*;
