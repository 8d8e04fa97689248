// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::trace::{DEFAULT_MEMORY_BUDGET, DEFAULT_TRACE_LIMIT};

/// Placeholder world model text. Replaced, not appended to, on first update.
pub const INITIAL_WORLD_MODEL: &str = "Initial world model state";

pub const DEFAULT_WORLD_MODEL_BYTES: usize = 8192;

/// Per-agent construction parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub id: String,

    /// Backend reference, e.g. `ollama:llama3.2`, `llama3.2` or `stub`
    pub model_ref: String,

    /// Entry limit of the trace store
    #[serde(default = "default_trace_limit")]
    pub trace_limit: usize,

    /// Byte budget of the trace store
    #[serde(default = "default_memory_size")]
    pub memory_size: usize,

    /// Byte cap of the world model
    #[serde(default = "default_world_model_bytes")]
    pub world_model_bytes: usize,
}

impl AgentConfig {
    pub fn new(id: impl Into<String>, model_ref: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            model_ref: model_ref.into(),
            trace_limit: DEFAULT_TRACE_LIMIT,
            memory_size: DEFAULT_MEMORY_BUDGET,
            world_model_bytes: DEFAULT_WORLD_MODEL_BYTES,
        }
    }

    pub fn with_trace_limit(mut self, trace_limit: usize) -> Self {
        self.trace_limit = trace_limit;
        self
    }

    pub fn with_memory_size(mut self, memory_size: usize) -> Self {
        self.memory_size = memory_size;
        self
    }

    pub fn with_world_model_bytes(mut self, bytes: usize) -> Self {
        self.world_model_bytes = bytes;
        self
    }
}

fn default_trace_limit() -> usize {
    DEFAULT_TRACE_LIMIT
}

fn default_memory_size() -> usize {
    DEFAULT_MEMORY_BUDGET
}

fn default_world_model_bytes() -> usize {
    DEFAULT_WORLD_MODEL_BYTES
}

/// A task submission: keyword plus optional target agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub keyword: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
}

impl Task {
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            agent_id: None,
        }
    }

    pub fn for_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Uninitialized,
    Initialized,
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentState::Uninitialized => f.write_str("uninitialized"),
            AgentState::Initialized => f.write_str("initialized"),
        }
    }
}

/// Free-text belief state of an agent, capped at `max_bytes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldModel {
    text: String,
    max_bytes: usize,
}

impl WorldModel {
    /// Starts from the placeholder, or empty when the placeholder does not fit.
    pub fn new(max_bytes: usize) -> Self {
        let text = if INITIAL_WORLD_MODEL.len() <= max_bytes {
            INITIAL_WORLD_MODEL.to_string()
        } else {
            String::new()
        };

        Self { text, max_bytes }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn is_initial(&self) -> bool {
        self.text == INITIAL_WORLD_MODEL
    }

    /// Fold `information` into the model.
    ///
    /// Replaces the placeholder (or an empty model), otherwise appends after a
    /// blank line. The oldest bytes are then dropped to honour the cap.
    pub fn update(&mut self, information: &str) {
        if self.text.is_empty() || self.is_initial() {
            self.text = information.to_string();
        } else {
            self.text.push_str("\n\n");
            self.text.push_str(information);
        }

        self.truncate_front();
    }

    fn truncate_front(&mut self) {
        if self.text.len() <= self.max_bytes {
            return;
        }

        let mut cut = self.text.len() - self.max_bytes;
        while !self.text.is_char_boundary(cut) {
            cut += 1;
        }
        self.text.drain(..cut);
    }
}

impl fmt::Display for WorldModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
