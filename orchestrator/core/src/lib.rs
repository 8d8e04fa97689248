// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Mindmesh core
//!
//! Multi-agent orchestration with bounded rumination memory.
//!
//! # Architecture
//!
//! - **domain:** traces, compression, world model, messages, events, config
//! - **application:** the agent pipeline, the orchestrator and retry policy
//! - **infrastructure:** mailboxes, routing, the event bus and model backends

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use application::{Agent, AgentHandle, Orchestrator, OrchestratorError, RetryExecutor, RetryPolicy};
pub use domain::agent::{AgentConfig, Task};
pub use domain::config::OrchestratorConfig;
pub use domain::message::{Message, MessageType};
