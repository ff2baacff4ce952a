// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use concierge_core::domain::dispatch_config::{DispatchConfigManifest, CONFIG_PATH_ENV};

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,

        /// Print the full manifest as YAML
        #[arg(long)]
        yaml: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./concierge-config.yaml)
        #[arg(short, long, default_value = "./concierge-config.yaml")]
        output: PathBuf,

        /// Write the complete built-in lexicon instead of the minimal sample
        #[arg(long)]
        full: bool,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths, yaml } => show(config_override, paths, yaml).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, full } => generate(output, full).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool, as_yaml: bool) -> Result<()> {
    let config =
        DispatchConfigManifest::load_or_default(config_override.clone()).context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. {}: {}",
            CONFIG_PATH_ENV,
            std::env::var(CONFIG_PATH_ENV)
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./concierge-config.yaml");
        println!("  4. ~/.concierge/config.yaml");
        println!("  5. built-in default");
        println!();
    }

    if as_yaml {
        print!(
            "{}",
            serde_yaml::to_string(&config).context("Failed to render configuration")?
        );
        return Ok(());
    }

    let spec = &config.spec;
    println!("{}", "Current configuration:".bold());
    println!("  Name: {}", config.metadata.name);
    println!();

    println!("{}", "Tools (registry order):".bold());
    for tool in &spec.tools {
        println!(
            "  {} - {} ({} patterns)",
            tool.id.to_string().bold(),
            tool.description,
            tool.patterns.len()
        );
    }
    println!("  Fallback: {}", spec.fallback_tool);
    println!();

    println!("{}", "Families:".bold());
    for family in &spec.families {
        let tools: Vec<String> = family.tools.iter().map(|t| t.to_string()).collect();
        println!(
            "  {}: {} (marker: {})",
            family.name,
            tools.join(", "),
            family.result_marker.as_deref().unwrap_or("none")
        );
    }
    println!(
        "  Preferred: {}",
        spec.preferred_family.as_deref().unwrap_or("(none)")
    );
    println!();

    println!("{}", "Memory:".bold());
    println!("  Session window: {}", spec.memory.session_window);
    println!("  Context window: {}", spec.memory.context_window);
    println!("  Recall k: {}", spec.memory.recall_k);
    println!("  Embedding timeout: {}ms", spec.memory.embedding_timeout_ms);
    println!();

    println!("{}", "Storage:".bold());
    println!("  Backend: {:?}", spec.storage.backend);
    if let Some(path) = &spec.storage.path {
        println!("  Path: {}", path.display());
    }
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = DispatchConfigManifest::load_or_default(config_path).context("Failed to load configuration")?;

    config.validate().context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, full: bool) -> Result<()> {
    if full {
        DispatchConfigManifest::default()
            .to_yaml_file(&output)
            .with_context(|| format!("Failed to write config to {:?}", output))?;
    } else {
        std::fs::write(&output, include_str!("../../templates/config-minimal.yaml"))
            .with_context(|| format!("Failed to write config to {:?}", output))?;
    }

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_template_is_valid() {
        let config = DispatchConfigManifest::from_yaml_str(include_str!("../../templates/config-minimal.yaml"))
            .unwrap();
        config.validate().unwrap();
        assert_eq!(config.spec.tools.len(), 3);
    }

    #[tokio::test]
    async fn test_generate_full_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("concierge-config.yaml");

        generate(output.clone(), true).await.unwrap();

        let loaded = DispatchConfigManifest::from_yaml_file(&output).unwrap();
        assert_eq!(loaded, DispatchConfigManifest::default());
    }
}
