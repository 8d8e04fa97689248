// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::{Path, PathBuf};

use mindmesh_core::domain::agent::{AgentConfig, Task};
use mindmesh_core::domain::config::{OrchestratorConfig, CONFIG_PATH_ENV};

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path
        #[arg(short, long, default_value = "./mindmesh.yaml")]
        output: PathBuf,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths),
        ConfigCommand::Validate { file } => validate(file.or(config_override)),
        ConfigCommand::Generate { output } => generate(&output),
    }
}

fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = OrchestratorConfig::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        match &config_override {
            Some(path) => println!("  1. --config flag: {}", path.display()),
            None => println!("  1. --config flag: {}", "(not set)".dimmed()),
        }
        println!(
            "  2. {}: {}",
            CONFIG_PATH_ENV,
            std::env::var(CONFIG_PATH_ENV)
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./mindmesh.yaml");
        println!("  4. ~/.mindmesh/config.yaml");
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Agents:".bold());
    if config.agents.is_empty() {
        println!(
            "  {} (a default agent using {} is created on run)",
            "(none)".dimmed(),
            config.backend.default_model
        );
    }
    for agent in &config.agents {
        println!("  {} → {}", agent.id.bold(), agent.model_ref);
        println!(
            "    Trace limit: {}  Memory budget: {} bytes  World model: {} bytes",
            agent.trace_limit, agent.memory_size, agent.world_model_bytes
        );
    }
    println!();

    println!("{}", "Tasks:".bold());
    if config.tasks.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for task in &config.tasks {
        println!(
            "  {} ({})",
            task.keyword,
            task.agent_id.as_deref().unwrap_or("first agent")
        );
    }
    println!();

    println!("{}", "Backend:".bold());
    println!("  Ollama endpoint: {}", config.backend.ollama_endpoint);
    println!("  Default model: {}", config.backend.default_model);
    println!();

    println!("{}", "Retry:".bold());
    println!("  Max attempts: {}", config.retry.max_attempts);
    println!(
        "  Delay: {}ms initial, {}ms max, x{} {}",
        config.retry.initial_delay_ms,
        config.retry.max_delay_ms,
        config.retry.backoff_multiplier,
        if config.retry.exponential { "exponential" } else { "fixed" }
    );
    println!();

    println!("Event bus capacity: {}", config.event_bus_capacity);

    Ok(())
}

fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = OrchestratorConfig::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

fn sample_config() -> OrchestratorConfig {
    OrchestratorConfig {
        agents: vec![
            AgentConfig::new("researcher", "stub"),
            AgentConfig::new("critic", "ollama:llama3.2").with_trace_limit(10),
        ],
        tasks: vec![Task::new("market analysis").for_agent("researcher")],
        ..OrchestratorConfig::default()
    }
}

fn generate(output: &Path) -> Result<()> {
    let yaml = sample_config()
        .to_yaml_string()
        .context("Failed to render sample configuration")?;

    std::fs::write(output, yaml)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}
