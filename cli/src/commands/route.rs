// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde_json::json;
use std::path::PathBuf;

use concierge_core::application::DispatchService;
use concierge_core::domain::dispatch::RoutingDecision;

use crate::embedded::EmbeddedEngine;

#[derive(Args, Debug)]
pub struct RouteArgs {
    /// Message to route
    #[arg(value_name = "MESSAGE")]
    pub message: String,

    /// Explicit user id (default: derived from --ip and --agent)
    #[arg(short, long)]
    pub user: Option<String>,

    /// Client address used to derive the user id
    #[arg(long, value_name = "ADDR")]
    pub ip: Option<String>,

    /// Client agent string used to derive the user id
    #[arg(long, value_name = "AGENT")]
    pub agent: Option<String>,

    /// Only print the decision; do not execute the tool
    #[arg(long)]
    pub dry_run: bool,

    /// Print the decision as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn handle(args: RouteArgs, config_path: Option<PathBuf>) -> Result<()> {
    let engine = EmbeddedEngine::new(config_path).await?;
    let user_id = engine.resolve_user(args.user.as_deref(), args.ip.as_deref(), args.agent.as_deref());

    let decision = engine.dispatch().route(&user_id, &args.message).await;
    let invocation = if args.dry_run {
        None
    } else {
        Some(engine.execute(&user_id, &decision).await?)
    };

    if args.json {
        let output = json!({
            "user_id": user_id,
            "decision": decision,
            "invocation": invocation,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("Failed to render decision")?
        );
    } else {
        print_decision(&user_id.to_string(), &decision);
        if let Some(invocation) = &invocation {
            println!();
            if invocation.success {
                println!("{}", "Tool output:".bold());
            } else {
                println!("{}", "Tool failed:".red().bold());
            }
            println!("{}", invocation.output);
        }
    }

    engine.shutdown().await
}

fn print_decision(user: &str, decision: &RoutingDecision) {
    println!("{} {}", "User:".bold(), user);
    println!(
        "{} {} ({}, confidence {:.2})",
        "Tool:".bold(),
        decision.tool.to_string().green(),
        decision.source.as_str(),
        decision.confidence
    );

    if let Some(reference) = &decision.reference {
        let kind = reference
            .reference_type
            .map(|t| t.as_str())
            .unwrap_or("unknown");
        if reference.context_found {
            println!("{} {} → {}", "Reference:".bold(), kind, reference.resolved_message.cyan());
        } else {
            println!("{} {} {}", "Reference:".bold(), kind, "(no context found)".dimmed());
        }
    }

    println!("{}", "Arguments:".bold());
    for (name, value) in &decision.arguments {
        println!("  {}: {}", name, value);
    }
}
