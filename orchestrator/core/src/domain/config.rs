// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Orchestrator Configuration Types
//
// YAML schema for a mindmesh deployment:
// - Pre-configured agents (id, model reference, memory limits)
// - Default tasks
// - Generator backend settings (Ollama endpoint, default model)
// - Retry policy for task submission
// - Event bus capacity

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::agent::{AgentConfig, Task, INITIAL_WORLD_MODEL};
use crate::domain::validation::InputValidator;

pub const CONFIG_PATH_ENV: &str = "MINDMESH_CONFIG_PATH";
pub const OLLAMA_ENDPOINT_ENV: &str = "MINDMESH_OLLAMA_ENDPOINT";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Agents created at startup
    #[serde(default)]
    pub agents: Vec<AgentConfig>,

    /// Tasks to run when none is given on the command line
    #[serde(default)]
    pub tasks: Vec<Task>,

    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    /// Buffered events before slow subscribers start lagging
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_ollama_endpoint")]
    pub ollama_endpoint: String,

    /// Model reference used for agents created without one
    #[serde(default = "default_model")]
    pub default_model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    #[serde(default = "default_true")]
    pub exponential: bool,
}

impl RetryConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

fn default_true() -> bool {
    true
}

fn default_event_bus_capacity() -> usize {
    1000
}

fn default_ollama_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "stub".to_string()
}

fn default_max_attempts() -> usize {
    3
}

fn default_initial_delay_ms() -> u64 {
    100
}

fn default_max_delay_ms() -> u64 {
    5000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            ollama_endpoint: default_ollama_endpoint(),
            default_model: default_model(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            exponential: default_true(),
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            agents: Vec::new(),
            tasks: Vec::new(),
            backend: BackendConfig::default(),
            retry: RetryConfig::default(),
            event_bus_capacity: default_event_bus_capacity(),
        }
    }
}

impl OrchestratorConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Discover configuration file using precedence order
    /// 1. MINDMESH_CONFIG_PATH environment variable
    /// 2. ./mindmesh.yaml (working directory)
    /// 3. ~/.mindmesh/config.yaml (user home)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./mindmesh.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".mindmesh").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        // An explicit path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)?;
            config.apply_env_overrides();
            return Ok(config);
        }

        let mut config = match Self::discover_config() {
            Some(config_path) => {
                tracing::info!("Loading configuration from discovered path: {:?}", config_path);
                Self::from_yaml_file(config_path)?
            }
            None => {
                tracing::warn!("No configuration file found in standard locations. Using defaults.");
                Self::default()
            }
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(endpoint) = std::env::var(OLLAMA_ENDPOINT_ENV) {
            if !endpoint.is_empty() {
                tracing::info!("Overriding ollama_endpoint from env: {}", endpoint);
                self.backend.ollama_endpoint = endpoint;
            }
        }
    }

    /// First task in the file, if any
    pub fn default_task(&self) -> Option<&Task> {
        self.tasks.first()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let validator = InputValidator::default();
        let mut seen = std::collections::HashSet::new();

        for agent in &self.agents {
            if !validator.validate_agent_id(&agent.id) {
                return Err(ConfigError::Invalid(format!("invalid agent id: {:?}", agent.id)));
            }
            if !seen.insert(agent.id.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate agent id: {}", agent.id)));
            }
            if agent.model_ref.is_empty() {
                return Err(ConfigError::Invalid(format!("agent {} has an empty model_ref", agent.id)));
            }
            if agent.trace_limit == 0 {
                return Err(ConfigError::Invalid(format!("agent {} has trace_limit 0", agent.id)));
            }
            if agent.world_model_bytes < INITIAL_WORLD_MODEL.len() {
                return Err(ConfigError::Invalid(format!(
                    "agent {} world_model_bytes must be at least {}",
                    agent.id,
                    INITIAL_WORLD_MODEL.len()
                )));
            }
        }

        for task in &self.tasks {
            if !validator.validate_task_keyword(&task.keyword) {
                return Err(ConfigError::Invalid(format!("invalid task keyword: {:?}", task.keyword)));
            }
            if let Some(agent_id) = &task.agent_id {
                if !self.agents.iter().any(|a| &a.id == agent_id) {
                    return Err(ConfigError::Invalid(format!(
                        "task {:?} targets unknown agent {}",
                        task.keyword, agent_id
                    )));
                }
            }
        }

        if self.backend.ollama_endpoint.is_empty() {
            return Err(ConfigError::Invalid("backend.ollama_endpoint cannot be empty".to_string()));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be at least 1".to_string()));
        }

        if self.event_bus_capacity == 0 {
            return Err(ConfigError::Invalid("event_bus_capacity must be at least 1".to_string()));
        }

        Ok(())
    }
}
