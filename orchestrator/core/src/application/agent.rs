// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Agent (Rumination Pipeline)
//!
//! An agent wraps one [`Generator`] with a world model and a bounded trace
//! store. `process_task` runs the rumination cycle:
//!
//! 1. reasoning steps from the task prompt
//! 2. one reflection per step, appended as `Reflection: ...`
//! 3. synthesis of steps and reflections into findings
//! 4. key insight extraction
//! 5. local summary
//! 6. world model update
//! 7. trace store append (may evict)
//!
//! A generator failure aborts the cycle before steps 6 and 7, so a failed
//! task leaves the agent's memory untouched. An uninitialized agent answers
//! every model call with a fixed sentinel and likewise touches nothing.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::agent::{AgentConfig, AgentState, WorldModel};
use crate::domain::events::{MemoryEvent, TaskEvent};
use crate::domain::llm::{GenerationOptions, Generator, GeneratorError};
use crate::domain::message::{Message, MessageType};
use crate::domain::rumination::{
    self, INSIGHTS_MAX_TOKENS, NOT_INITIALIZED, REFLECTION_MAX_TOKENS, REFLECTION_PREFIX,
    STEPS_MAX_TOKENS, SYNTHESIS_MAX_TOKENS,
};
use crate::domain::trace::{TraceEntry, TraceStore};
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::router::MessageDispatcher;

/// Sending side of an agent: its id plus the routing handle, if registered.
///
/// Cloneable and lock-free, so a message can be sent without touching the
/// agent's own state.
#[derive(Clone)]
pub struct Outbox {
    agent_id: String,
    dispatcher: Option<Arc<dyn MessageDispatcher>>,
}

impl Outbox {
    pub fn new(agent_id: impl Into<String>, dispatcher: Arc<dyn MessageDispatcher>) -> Self {
        Self {
            agent_id: agent_id.into(),
            dispatcher: Some(dispatcher),
        }
    }

    /// An outbox with no routing handle; every send is a no-op.
    pub fn detached(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            dispatcher: None,
        }
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn is_attached(&self) -> bool {
        self.dispatcher.is_some()
    }

    /// Stamp and route a message from this agent.
    ///
    /// Returns `false` when detached or when the recipient is unknown.
    pub fn send(&self, to: &str, message_type: MessageType, payload: &str) -> bool {
        let Some(dispatcher) = &self.dispatcher else {
            debug!(agent_id = %self.agent_id, "no routing handle, message not sent");
            return false;
        };

        let message = Message::new(self.agent_id.as_str(), to, message_type, payload);
        match dispatcher.dispatch(message) {
            Ok(()) => true,
            Err(e) => {
                warn!(agent_id = %self.agent_id, to = %to, "send failed: {}", e);
                false
            }
        }
    }
}

pub struct Agent {
    id: String,
    model_ref: String,
    generator: Box<dyn Generator>,
    world_model: WorldModel,
    traces: TraceStore,
    state: AgentState,
    outbox: Outbox,
    event_bus: Option<EventBus>,
}

impl Agent {
    pub fn new(config: &AgentConfig, generator: Box<dyn Generator>) -> Self {
        Self {
            id: config.id.clone(),
            model_ref: config.model_ref.clone(),
            generator,
            world_model: WorldModel::new(config.world_model_bytes),
            traces: TraceStore::new(config.trace_limit, config.memory_size),
            state: AgentState::Uninitialized,
            outbox: Outbox::detached(config.id.as_str()),
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn model_ref(&self) -> &str {
        &self.model_ref
    }

    pub fn backend_name(&self) -> &str {
        self.generator.backend_name()
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.state == AgentState::Initialized
    }

    pub fn world_model(&self) -> &str {
        self.world_model.as_str()
    }

    pub fn traces(&self) -> &TraceStore {
        &self.traces
    }

    pub fn history(&self) -> Vec<TraceEntry> {
        self.traces.history()
    }

    pub fn normalized_context(&mut self) -> String {
        self.traces.normalized_context()
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    pub fn set_outbox(&mut self, outbox: Outbox) {
        self.outbox = outbox;
    }

    /// Load the backend model. Idempotent; a failure leaves the agent
    /// uninitialized.
    pub async fn initialize(&mut self) -> Result<(), GeneratorError> {
        if self.is_initialized() {
            debug!(agent_id = %self.id, "agent already initialized");
            return Ok(());
        }

        info!(agent_id = %self.id, model_ref = %self.model_ref, "loading model");
        self.generator.load_model(&self.model_ref).await?;
        self.state = AgentState::Initialized;
        info!(agent_id = %self.id, backend = %self.generator.backend_name(), "agent initialized");
        Ok(())
    }

    /// Run one rumination cycle and return the rendered report.
    pub async fn process_task(&mut self, task_keyword: &str) -> Result<String, GeneratorError> {
        info!(agent_id = %self.id, task = %task_keyword, "processing task");
        self.publish_task(TaskEvent::TaskStarted {
            agent_id: self.id.clone(),
            task_keyword: task_keyword.to_string(),
            started_at: Utc::now(),
        });

        match self.ruminate(task_keyword).await {
            Ok(entry) => {
                self.publish_task(TaskEvent::TaskCompleted {
                    agent_id: self.id.clone(),
                    task_keyword: task_keyword.to_string(),
                    reasoning_steps: entry.reasoning_steps.len(),
                    key_insights: entry.key_insights.len(),
                    completed_at: Utc::now(),
                });
                Ok(rumination::render_report(&self.id, &entry))
            }
            Err(e) => {
                warn!(agent_id = %self.id, task = %task_keyword, "task failed: {}", e);
                self.publish_task(TaskEvent::TaskFailed {
                    agent_id: self.id.clone(),
                    task_keyword: task_keyword.to_string(),
                    reason: e.to_string(),
                    failed_at: Utc::now(),
                });
                Err(e)
            }
        }
    }

    /// Steps, reflections, synthesis, insights and summary; then commit the
    /// outcome to the world model and trace store.
    pub async fn ruminate(&mut self, task_keyword: &str) -> Result<TraceEntry, GeneratorError> {
        let mut entry = TraceEntry::new(task_keyword);

        entry.reasoning_steps = self.generate_reasoning_steps(task_keyword).await?;
        debug!(agent_id = %self.id, step = 1, count = entry.reasoning_steps.len(), "reasoning steps generated");

        let original_steps = entry.reasoning_steps.len();
        for i in 0..original_steps {
            let reflection = self.reflect_on_step(&entry.reasoning_steps[i]).await?;
            entry.reasoning_steps.push(format!("{REFLECTION_PREFIX}{reflection}"));
        }
        debug!(agent_id = %self.id, step = 2, count = original_steps, "reflections complete");

        entry.findings = self.synthesize_findings(&entry.reasoning_steps).await?;
        debug!(agent_id = %self.id, step = 3, chars = entry.findings.len(), "findings synthesized");

        entry.key_insights = self.extract_key_insights(&entry.findings).await?;
        debug!(agent_id = %self.id, step = 4, count = entry.key_insights.len(), "insights extracted");

        entry.summary = rumination::summarize(&entry);

        if !self.is_initialized() {
            warn!(agent_id = %self.id, "agent not initialized, memory left unchanged");
            return Ok(entry);
        }

        self.world_model.update(&entry.findings);
        if let Some(eviction) = self.traces.add_trace(entry.clone()) {
            debug!(
                agent_id = %self.id,
                evicted = eviction.evicted,
                remaining = eviction.remaining,
                "trace store compressed"
            );
            if let Some(bus) = &self.event_bus {
                bus.publish_memory_event(MemoryEvent::TracesEvicted {
                    agent_id: self.id.clone(),
                    evicted: eviction.evicted,
                    remaining: eviction.remaining,
                    memory_usage: eviction.usage_after,
                    evicted_at: Utc::now(),
                });
            }
        }

        Ok(entry)
    }

    async fn generate_reasoning_steps(&mut self, task_keyword: &str) -> Result<Vec<String>, GeneratorError> {
        if !self.is_initialized() {
            return Ok(vec![NOT_INITIALIZED.to_string()]);
        }

        let context = self.traces.normalized_context();
        let insights = self.traces.key_insights();
        let prompt = rumination::steps_prompt(self.world_model.as_str(), &context, &insights, task_keyword);

        let response = self
            .generator
            .generate(&prompt, &GenerationOptions::with_max_tokens(STEPS_MAX_TOKENS))
            .await?;

        Ok(rumination::parse_steps(&response, task_keyword))
    }

    async fn reflect_on_step(&self, step: &str) -> Result<String, GeneratorError> {
        if !self.is_initialized() {
            return Ok(NOT_INITIALIZED.to_string());
        }

        self.generator
            .generate(
                &rumination::reflection_prompt(step),
                &GenerationOptions::with_max_tokens(REFLECTION_MAX_TOKENS),
            )
            .await
    }

    async fn synthesize_findings(&self, steps: &[String]) -> Result<String, GeneratorError> {
        if !self.is_initialized() {
            return Ok(NOT_INITIALIZED.to_string());
        }

        self.generator
            .generate(
                &rumination::synthesis_prompt(steps),
                &GenerationOptions::with_max_tokens(SYNTHESIS_MAX_TOKENS),
            )
            .await
    }

    async fn extract_key_insights(&self, findings: &str) -> Result<Vec<String>, GeneratorError> {
        if !self.is_initialized() {
            return Ok(vec![NOT_INITIALIZED.to_string()]);
        }

        let response = self
            .generator
            .generate(
                &rumination::insights_prompt(findings),
                &GenerationOptions::with_max_tokens(INSIGHTS_MAX_TOKENS),
            )
            .await?;

        Ok(rumination::parse_insights(&response))
    }

    pub fn update_world_model(&mut self, information: &str) {
        self.world_model.update(information);
    }

    /// React to an inbound message.
    pub async fn handle_message(&mut self, message: &Message) -> Result<(), GeneratorError> {
        debug!(
            agent_id = %self.id,
            from = %message.from,
            message_type = %message.message_type,
            "handling message"
        );

        match message.message_type {
            MessageType::TaskDelegation => {
                self.process_task(&message.payload).await?;
            }
            MessageType::FindingsSharing => {
                self.update_world_model(&format!("From {}: {}", message.from, message.payload));
            }
            MessageType::Query => {}
            MessageType::Response => {
                self.update_world_model(&format!("Response from {}: {}", message.from, message.payload));
            }
        }
        Ok(())
    }

    pub fn send_message(&self, to: &str, message_type: MessageType, payload: &str) -> bool {
        self.outbox.send(to, message_type, payload)
    }

    fn publish_task(&self, event: TaskEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish_task_event(event);
        }
    }
}
