// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod agent;
pub mod orchestrator;
pub mod retry;

pub use agent::{Agent, Outbox};
pub use orchestrator::{AgentHandle, Orchestrator, OrchestratorError};
pub use retry::{RetryExecutor, RetryPolicy, RetryStats};
