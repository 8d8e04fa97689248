// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `mindmesh run` - execute one task and print the agent's final report

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use mindmesh_core::application::orchestrator::ERROR_MARKER;
use mindmesh_core::application::{Orchestrator, RetryPolicy};
use mindmesh_core::domain::agent::AgentConfig;
use mindmesh_core::domain::config::OrchestratorConfig;
use mindmesh_core::domain::validation::InputValidator;
use mindmesh_core::infrastructure::event_bus::EventBusError;

const DEFAULT_AGENT_ID: &str = "agent";

#[derive(Args)]
pub struct RunArgs {
    /// Agent to run the task on (default: the task's agent, else the first agent)
    #[arg(short, long, value_name = "ID")]
    agent: Option<String>,

    /// Task keyword (default: first task in the configuration)
    #[arg(short, long, value_name = "KEYWORD")]
    task: Option<String>,

    /// Submit once instead of using the configured retry policy
    #[arg(long)]
    no_retry: bool,

    /// Print orchestrator events as JSON lines on stderr
    #[arg(long)]
    events: bool,
}

/// What a run resolved to after applying configuration defaults.
#[derive(Debug, PartialEq)]
struct RunPlan {
    agents: Vec<AgentConfig>,
    agent_id: String,
    keyword: String,
}

fn plan(config: &OrchestratorConfig, agent: Option<String>, task: Option<String>) -> Result<RunPlan> {
    let validator = InputValidator::default();

    let agents = if config.agents.is_empty() {
        vec![AgentConfig::new(DEFAULT_AGENT_ID, config.backend.default_model.as_str())]
    } else {
        config.agents.clone()
    };

    let (keyword, task_agent) = match task {
        Some(keyword) => (keyword, None),
        None => match config.default_task() {
            Some(task) => (task.keyword.clone(), task.agent_id.clone()),
            None => bail!("No task given and none configured. Use --task <KEYWORD>."),
        },
    };
    let keyword = validator
        .validate_with_retry(&keyword, |s| validator.validate_task_keyword(s))
        .with_context(|| format!("Rejected task keyword {:?}", keyword))?;

    let agent_id = match agent.or(task_agent) {
        Some(id) => id,
        None => agents[0].id.clone(),
    };
    let agent_id = validator
        .validate_with_retry(&agent_id, |s| validator.validate_agent_id(s))
        .with_context(|| format!("Rejected agent id {:?}", agent_id))?;

    if !agents.iter().any(|a| a.id == agent_id) {
        bail!("Agent {} is not configured", agent_id);
    }

    Ok(RunPlan {
        agents,
        agent_id,
        keyword,
    })
}

/// Create every planned agent, skipping those whose backend fails to
/// initialize. Only the target agent is required.
async fn start_agents(orchestrator: &Orchestrator, agents: &[AgentConfig], target: &str) -> Result<usize> {
    let mut started = 0;

    for agent in agents {
        match orchestrator.create_agent(agent.clone()).await {
            Ok(()) => started += 1,
            Err(e) => warn!(agent_id = %agent.id, "Skipping agent: {}", e),
        }
    }

    if !orchestrator.has_agent(target) {
        bail!("Failed to create agent {}", target);
    }
    Ok(started)
}

pub async fn handle_command(args: RunArgs, config_override: Option<PathBuf>) -> Result<()> {
    let config = OrchestratorConfig::load_or_default(config_override)
        .context("Failed to load configuration")?;
    config
        .validate()
        .context("Configuration validation failed")?;

    let plan = plan(&config, args.agent, args.task)?;
    let orchestrator = Orchestrator::from_config(&config);

    let printer = args.events.then(|| {
        let mut events = orchestrator.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => match serde_json::to_string(&event) {
                        Ok(line) => eprintln!("{}", line),
                        Err(e) => debug!("Failed to serialize event: {}", e),
                    },
                    Err(EventBusError::Lagged(_)) => continue,
                    Err(_) => break,
                }
            }
        })
    });

    let started = match start_agents(&orchestrator, &plan.agents, &plan.agent_id).await {
        Ok(started) => started,
        Err(e) => {
            orchestrator.shutdown().await;
            return Err(e);
        }
    };
    info!(agents = started, agent_id = %plan.agent_id, task = %plan.keyword, "running task");

    let report = if args.no_retry {
        orchestrator.submit_task(&plan.agent_id, &plan.keyword).await
    } else {
        orchestrator
            .submit_with_retry(&plan.agent_id, &plan.keyword, RetryPolicy::from(&config.retry))
            .await
    };

    orchestrator.shutdown().await;
    if let Some(printer) = printer {
        printer.abort();
    }

    if report.starts_with(ERROR_MARKER) {
        eprintln!("{}", report.red());
        std::process::exit(1);
    }

    println!("{}", report);
    println!("{}", "✓ Task completed".green());
    Ok(())
}
