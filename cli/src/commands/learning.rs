// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Learning and maintenance commands
//!
//! Commands: feedback, learn, prune

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use concierge_core::application::DispatchService;
use concierge_cortex::application::FeedbackKind;
use concierge_cortex::domain::{ToolId, UserId};

use crate::embedded::EmbeddedEngine;

#[derive(Args, Debug)]
pub struct FeedbackArgs {
    /// Feedback text, e.g. "wrong" or "thanks"
    #[arg(value_name = "FEEDBACK")]
    pub feedback: String,

    /// Message that was routed
    #[arg(short, long)]
    pub message: String,

    /// Tool that was selected for the message
    #[arg(short, long)]
    pub tool: String,

    /// User id
    #[arg(short, long, default_value = "cli")]
    pub user: String,
}

#[derive(Args, Debug)]
pub struct LearnArgs {
    /// User whose session is analyzed
    #[arg(value_name = "USER")]
    pub user: String,
}

#[derive(Args, Debug)]
pub struct PruneArgs {
    /// Keep learned keywords with at least this many hits
    #[arg(long)]
    pub min_hits: Option<u64>,

    /// Only prune keywords older than this many days
    #[arg(long)]
    pub max_age_days: Option<i64>,

    /// Also delete sessions idle for more than this many days
    #[arg(long, value_name = "DAYS")]
    pub sessions_older_than: Option<i64>,
}

pub async fn feedback(args: FeedbackArgs, config_path: Option<PathBuf>) -> Result<()> {
    let engine = EmbeddedEngine::new(config_path).await?;
    let tool = ToolId::new(args.tool);

    let outcome = engine
        .dispatch()
        .submit_feedback(&UserId::new(args.user), &args.message, &tool, &args.feedback)
        .await?;

    match outcome.kind {
        FeedbackKind::Negative => {
            println!("{}", format!("✗ Negative feedback recorded for {}", tool).yellow());
            match &outcome.alternative {
                Some(alternative) => {
                    println!("  Alternative: {}", alternative.to_string().green());
                    if outcome.learned_keywords.is_empty() {
                        println!("  Learned keywords: {}", "(none)".dimmed());
                    } else {
                        println!("  Learned keywords: {}", outcome.learned_keywords.join(", "));
                    }
                }
                None => println!("  Alternative: {}", "(none)".dimmed()),
            }
        }
        FeedbackKind::Positive => {
            println!("{}", format!("✓ Positive feedback recorded for {}", tool).green());
        }
    }

    engine.shutdown().await
}

pub async fn learn(args: LearnArgs, config_path: Option<PathBuf>) -> Result<()> {
    let engine = EmbeddedEngine::new(config_path).await?;
    let added = engine.dispatch().learn_from_history(&UserId::new(args.user)).await?;

    println!("{}", format!("✓ Learned {} keyword(s) from history", added).green());
    engine.shutdown().await
}

pub async fn prune(args: PruneArgs, config_path: Option<PathBuf>) -> Result<()> {
    let engine = EmbeddedEngine::new(config_path).await?;
    let defaults = &engine.runtime().config.spec.pruner;
    let min_hits = args.min_hits.unwrap_or(defaults.min_hits);
    let max_age_days = args.max_age_days.unwrap_or(defaults.max_age_days);

    let pruned = engine
        .dispatch()
        .prune_learned_keywords(min_hits, max_age_days)
        .await?;
    println!(
        "{}",
        format!(
            "✓ Pruned {} learned keyword(s) (min hits {}, older than {} days)",
            pruned, min_hits, max_age_days
        )
        .green()
    );

    if let Some(days) = args.sessions_older_than {
        let removed = engine.dispatch().cleanup_sessions(days).await?;
        println!("{}", format!("✓ Removed {} idle session(s)", removed).green());
    }

    engine.shutdown().await
}
