// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the Concierge CLI

pub mod config;
pub mod learning;
pub mod memory;
pub mod route;

use clap::Args;

pub use self::config::ConfigCommand;
pub use self::learning::{FeedbackArgs, LearnArgs, PruneArgs};
pub use self::memory::{InsightsArgs, SearchArgs};
pub use self::route::RouteArgs;

/// Commands that read one user's memory
#[derive(Args, Debug)]
pub struct UserArgs {
    /// User id
    #[arg(value_name = "USER")]
    pub user: String,

    /// Maximum number of records
    #[arg(short, long, default_value_t = 20)]
    pub limit: usize,
}
