// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Memory inspection commands
//!
//! Commands: history, search, insights, analytics

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use concierge_core::application::DispatchService;
use concierge_cortex::domain::{Role, UserId};

use super::UserArgs;
use crate::embedded::EmbeddedEngine;

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// User id
    #[arg(value_name = "USER")]
    pub user: String,

    /// Text to compare against stored turns
    #[arg(value_name = "QUERY")]
    pub query: String,

    /// Maximum number of results
    #[arg(short, long, default_value_t = 5)]
    pub k: usize,
}

#[derive(Args, Debug)]
pub struct InsightsArgs {
    /// User id
    #[arg(value_name = "USER")]
    pub user: String,

    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

fn role_label(role: Role) -> String {
    match role {
        Role::User => "user".blue().to_string(),
        Role::Assistant => "assistant".magenta().to_string(),
    }
}

pub async fn history(args: UserArgs, config_path: Option<PathBuf>) -> Result<()> {
    let engine = EmbeddedEngine::new(config_path).await?;
    let user_id = UserId::new(args.user);

    let records = engine.dispatch().history(&user_id, args.limit).await?;
    if records.is_empty() {
        println!("{}", format!("No stored turns for {}", user_id).dimmed());
        return Ok(());
    }

    println!("{}", format!("History for {} (newest first):", user_id).bold());
    for record in records {
        let tool = record
            .tool_used
            .map(|t| format!(" [{}]", t))
            .unwrap_or_default();
        println!(
            "  {} {}{}: {}",
            record.timestamp.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
            role_label(record.role),
            tool,
            record.content
        );
    }
    Ok(())
}

pub async fn search(args: SearchArgs, config_path: Option<PathBuf>) -> Result<()> {
    let engine = EmbeddedEngine::new(config_path).await?;
    let user_id = UserId::new(args.user);

    let hits = engine
        .dispatch()
        .search_similar(&user_id, &args.query, args.k)
        .await?;
    if hits.is_empty() {
        println!("{}", format!("No stored turns for {}", user_id).dimmed());
        return Ok(());
    }

    for hit in hits {
        println!(
            "  {:.3} {}: {}",
            hit.distance,
            role_label(hit.record.role),
            hit.record.content
        );
    }
    Ok(())
}

pub async fn insights(args: InsightsArgs, config_path: Option<PathBuf>) -> Result<()> {
    let engine = EmbeddedEngine::new(config_path).await?;
    let insights = engine.dispatch().user_insights(&UserId::new(args.user)).await;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&insights).context("Failed to render insights")?
        );
        return Ok(());
    }

    println!("{}", format!("Insights for {}", insights.user_id).bold());
    println!("  Total turns: {}", insights.session.total_turns);
    println!("  Window: {}", insights.session.current_window);
    if let Some(created) = insights.session.created_at {
        println!("  Created: {}", created.to_rfc3339());
    }
    if let Some(last) = insights.session.last_activity {
        println!("  Last activity: {}", last.to_rfc3339());
    }

    println!("{}", "Tool usage:".bold());
    if insights.tool_usage.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for (tool, count) in &insights.tool_usage {
        println!("  {}: {}", tool, count);
    }

    if insights.recent_topics.is_empty() {
        println!("{} {}", "Recent topics:".bold(), "(none)".dimmed());
    } else {
        println!("{} {}", "Recent topics:".bold(), insights.recent_topics.join(", "));
    }
    Ok(())
}

pub async fn analytics(config_path: Option<PathBuf>) -> Result<()> {
    let engine = EmbeddedEngine::new(config_path).await?;
    let analytics = engine.dispatch().export_analytics().await;

    println!(
        "{}",
        serde_json::to_string_pretty(&analytics).context("Failed to render analytics")?
    );
    Ok(())
}
