// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Concierge CLI
//!
//! The `concierge` binary hosts the dispatch engine in-process.
//!
//! ## Commands
//!
//! - `concierge route <message>` - Route a message and run the echo tool
//! - `concierge feedback|learn|prune` - Learning and maintenance
//! - `concierge history|search|insights|analytics` - Memory inspection
//! - `concierge config show|validate|generate` - Configuration management
//!
//! State outlives a single command only with the sled storage backend.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use concierge_cli::commands::{
    self, ConfigCommand, FeedbackArgs, InsightsArgs, LearnArgs, PruneArgs, RouteArgs, SearchArgs, UserArgs,
};

/// Concierge - route conversational messages to tools
#[derive(Parser)]
#[command(name = "concierge")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "CONCIERGE_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "CONCIERGE_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Route a message and execute the chosen tool
    Route(RouteArgs),

    /// Submit feedback on a routed message
    Feedback(FeedbackArgs),

    /// Learn keywords from a user's session history
    Learn(LearnArgs),

    /// Remove unused learned keywords and idle sessions
    Prune(PruneArgs),

    /// Show a user's stored turns
    History(UserArgs),

    /// Search a user's turns by similarity
    Search(SearchArgs),

    /// Show session stats, tool usage and recent topics for a user
    Insights(InsightsArgs),

    /// Export learning analytics as JSON
    Analytics,

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    match cli.command {
        Some(Commands::Route(args)) => commands::route::handle(args, cli.config).await,
        Some(Commands::Feedback(args)) => commands::learning::feedback(args, cli.config).await,
        Some(Commands::Learn(args)) => commands::learning::learn(args, cli.config).await,
        Some(Commands::Prune(args)) => commands::learning::prune(args, cli.config).await,
        Some(Commands::History(args)) => commands::memory::history(args, cli.config).await,
        Some(Commands::Search(args)) => commands::memory::search(args, cli.config).await,
        Some(Commands::Insights(args)) => commands::memory::insights(args, cli.config).await,
        Some(Commands::Analytics) => commands::memory::analytics(cli.config).await,
        Some(Commands::Config { command }) => commands::config::handle_command(command, cli.config).await,
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    Ok(())
}
