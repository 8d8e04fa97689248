// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Orchestrator
//!
//! Owns every agent, its mailbox and its worker task.
//!
//! ## Locking
//!
//! | Lock | Kind | Guards | Held across `.await` |
//! |------|------|--------|----------------------|
//! | registry | `parking_lot::Mutex` | id -> slot map, running flags | never |
//! | agent | `tokio::sync::Mutex` | one agent's state | yes, for a whole task or message |
//!
//! Direct submissions and the agent's worker both take the agent lock, so a
//! task submitted by a caller and a task delegated by another agent never
//! interleave on the same agent.
//!
//! ## Workers
//!
//! `create_agent` spawns exactly one worker per agent and keeps its
//! `JoinHandle`. `remove_agent` and `shutdown` close the mailbox and then
//! wait for the worker to finish whatever message it is handling.

use chrono::Utc;
use futures::future::join_all;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::application::agent::{Agent, Outbox};
use crate::application::retry::{RetryExecutor, RetryPolicy};
use crate::domain::agent::{AgentConfig, AgentState};
use crate::domain::config::OrchestratorConfig;
use crate::domain::events::{AgentLifecycleEvent, MessagingEvent};
use crate::domain::llm::{GeneratorError, GeneratorFactory};
use crate::domain::message::{Message, MessageType};
use crate::domain::trace::TraceEntry;
use crate::infrastructure::event_bus::{EventBus, EventReceiver};
use crate::infrastructure::llm::GeneratorRegistry;
use crate::infrastructure::mailbox::Mailbox;
use crate::infrastructure::router::{MessageDispatcher, Router, RouterError};

/// Marker searched for by retrying callers of [`Orchestrator::submit_task`].
pub const ERROR_MARKER: &str = "Error:";

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("Agent already exists: {0}")]
    AgentExists(String),

    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Failed to initialize agent {agent_id}: {source}")]
    InitializationFailed {
        agent_id: String,
        #[source]
        source: GeneratorError,
    },

    #[error(transparent)]
    Generator(#[from] GeneratorError),

    #[error(transparent)]
    Routing(#[from] RouterError),
}

struct AgentSlot {
    agent: Arc<AsyncMutex<Agent>>,
    mailbox: Arc<Mailbox>,
    outbox: Outbox,
    running: bool,
    worker: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct Registry {
    agents: HashMap<String, AgentSlot>,
}

impl Registry {
    fn is_running(&self, agent_id: &str) -> bool {
        self.agents.get(agent_id).is_some_and(|slot| slot.running)
    }

    /// Detach a slot: stop its worker loop, close its mailbox and drop the
    /// route. Returns the worker handle for joining outside the lock.
    fn retire(&mut self, agent_id: &str, router: &Router) -> Option<Option<JoinHandle<()>>> {
        let mut slot = self.agents.remove(agent_id)?;
        slot.running = false;
        slot.mailbox.close();
        router.unregister(agent_id);
        Some(slot.worker.take())
    }
}

/// Cheap, cloneable view of a registered agent.
#[derive(Clone)]
pub struct AgentHandle {
    id: String,
    agent: Arc<AsyncMutex<Agent>>,
    outbox: Outbox,
}

impl AgentHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Send from this agent. Does not wait for the agent's own lock.
    pub fn send_message(&self, to: &str, message_type: MessageType, payload: &str) -> bool {
        self.outbox.send(to, message_type, payload)
    }

    pub async fn world_model(&self) -> String {
        self.agent.lock().await.world_model().to_string()
    }

    pub async fn trace_count(&self) -> usize {
        self.agent.lock().await.traces().len()
    }

    pub async fn normalized_context(&self) -> String {
        self.agent.lock().await.normalized_context()
    }

    pub async fn history(&self) -> Vec<TraceEntry> {
        self.agent.lock().await.history()
    }

    pub async fn state(&self) -> AgentState {
        self.agent.lock().await.state()
    }
}

pub struct Orchestrator {
    registry: Arc<Mutex<Registry>>,
    router: Arc<Router>,
    event_bus: EventBus,
    factory: Arc<dyn GeneratorFactory>,
}

impl Orchestrator {
    pub fn new(factory: Arc<dyn GeneratorFactory>, event_bus: EventBus) -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry::default())),
            router: Arc::new(Router::with_event_bus(event_bus.clone())),
            event_bus,
            factory,
        }
    }

    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self::new(
            Arc::new(GeneratorRegistry::from_config(&config.backend)),
            EventBus::new(config.event_bus_capacity),
        )
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.event_bus.subscribe()
    }

    /// Build, initialize and register an agent, then start its worker.
    pub async fn create_agent(&self, config: AgentConfig) -> Result<(), OrchestratorError> {
        if self.has_agent(&config.id) {
            return Err(OrchestratorError::AgentExists(config.id));
        }

        let generator = self.factory.create(&config.model_ref);
        let mut agent = Agent::new(&config, generator).with_event_bus(self.event_bus.clone());

        // Model loading may be slow; the registry stays unlocked meanwhile.
        if let Err(source) = agent.initialize().await {
            error!(agent_id = %config.id, "agent initialization failed: {}", source);
            self.event_bus.publish_agent_event(AgentLifecycleEvent::AgentInitializationFailed {
                agent_id: config.id.clone(),
                reason: source.to_string(),
                failed_at: Utc::now(),
            });
            return Err(OrchestratorError::InitializationFailed {
                agent_id: config.id,
                source,
            });
        }

        let backend = agent.backend_name().to_string();
        let dispatcher: Arc<dyn MessageDispatcher> = self.router.clone();
        let outbox = Outbox::new(config.id.as_str(), dispatcher);
        agent.set_outbox(outbox.clone());

        {
            let mut registry = self.registry.lock();
            if registry.agents.contains_key(&config.id) {
                return Err(OrchestratorError::AgentExists(config.id));
            }

            let agent = Arc::new(AsyncMutex::new(agent));
            let mailbox = Arc::new(Mailbox::new());
            self.router.register(config.id.as_str(), &mailbox);

            let worker = tokio::spawn(message_loop(
                config.id.clone(),
                agent.clone(),
                mailbox.clone(),
                self.registry.clone(),
                self.event_bus.clone(),
            ));

            registry.agents.insert(
                config.id.clone(),
                AgentSlot {
                    agent,
                    mailbox,
                    outbox,
                    running: true,
                    worker: Some(worker),
                },
            );
        }

        info!(agent_id = %config.id, model_ref = %config.model_ref, backend = %backend, "agent created");
        self.event_bus.publish_agent_event(AgentLifecycleEvent::AgentCreated {
            agent_id: config.id,
            model_ref: config.model_ref,
            backend,
            created_at: Utc::now(),
        });
        Ok(())
    }

    /// Unregister an agent and wait for its worker to stop.
    pub async fn remove_agent(&self, agent_id: &str) -> Result<(), OrchestratorError> {
        let worker = self
            .registry
            .lock()
            .retire(agent_id, &self.router)
            .ok_or_else(|| OrchestratorError::AgentNotFound(agent_id.to_string()))?;

        if let Some(worker) = worker {
            join_worker(agent_id, worker).await;
        }

        info!(agent_id = %agent_id, "agent removed");
        self.event_bus.publish_agent_event(AgentLifecycleEvent::AgentRemoved {
            agent_id: agent_id.to_string(),
            removed_at: Utc::now(),
        });
        Ok(())
    }

    /// Remove every agent and join every worker.
    pub async fn shutdown(&self) {
        let workers: Vec<(String, Option<JoinHandle<()>>)> = {
            let mut registry = self.registry.lock();
            let ids: Vec<String> = registry.agents.keys().cloned().collect();
            ids.into_iter()
                .filter_map(|id| registry.retire(&id, &self.router).map(|w| (id, w)))
                .collect()
        };

        info!(agents = workers.len(), "shutting down orchestrator");
        let joins = workers.into_iter().map(|(agent_id, worker)| async move {
            if let Some(worker) = worker {
                join_worker(&agent_id, worker).await;
            }
            agent_id
        });

        for agent_id in join_all(joins).await {
            self.event_bus.publish_agent_event(AgentLifecycleEvent::AgentRemoved {
                agent_id,
                removed_at: Utc::now(),
            });
        }
    }

    /// Run a task on an agent and return its report.
    ///
    /// Failures are rendered as `Error: <reason>` text; use
    /// [`try_submit_task`](Self::try_submit_task) for a typed result.
    pub async fn submit_task(&self, agent_id: &str, task_keyword: &str) -> String {
        match self.try_submit_task(agent_id, task_keyword).await {
            Ok(report) => report,
            Err(e) => format!("{ERROR_MARKER} {e}"),
        }
    }

    pub async fn try_submit_task(&self, agent_id: &str, task_keyword: &str) -> Result<String, OrchestratorError> {
        let agent = self.agent_ref(agent_id)?;

        let mut agent = agent.lock().await;
        let report = agent.process_task(task_keyword).await?;
        Ok(report)
    }

    /// `submit_task` re-run while its result carries the error marker.
    pub async fn submit_with_retry(&self, agent_id: &str, task_keyword: &str, policy: RetryPolicy) -> String {
        let executor = RetryExecutor::new(policy);
        let result = executor
            .execute(
                || self.submit_task(agent_id, task_keyword),
                |result: &String| result.contains(ERROR_MARKER),
            )
            .await;

        debug!(agent_id = %agent_id, stats = ?executor.stats(), "submission finished");
        result
    }

    /// Re-run backend initialization for a registered agent. Idempotent.
    pub async fn initialize_agent(&self, agent_id: &str) -> Result<(), OrchestratorError> {
        let agent = self.agent_ref(agent_id)?;
        let mut agent = agent.lock().await;
        agent
            .initialize()
            .await
            .map_err(|source| OrchestratorError::InitializationFailed {
                agent_id: agent_id.to_string(),
                source,
            })
    }

    pub fn route_message(&self, message: Message) -> Result<(), RouterError> {
        self.router.route(message)
    }

    /// Copy `message` into every mailbox except `exclude`. Returns the number
    /// of recipients.
    pub fn broadcast(&self, message: &Message, exclude: Option<&str>) -> usize {
        self.router.broadcast(message, exclude)
    }

    pub fn agent(&self, agent_id: &str) -> Option<AgentHandle> {
        let registry = self.registry.lock();
        registry.agents.get(agent_id).map(|slot| AgentHandle {
            id: agent_id.to_string(),
            agent: slot.agent.clone(),
            outbox: slot.outbox.clone(),
        })
    }

    pub fn has_agent(&self, agent_id: &str) -> bool {
        self.registry.lock().agents.contains_key(agent_id)
    }

    /// Registered agent ids in lexicographic order.
    pub fn agent_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.registry.lock().agents.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn agent_count(&self) -> usize {
        self.registry.lock().agents.len()
    }

    /// Number of messages waiting in an agent's mailbox.
    pub fn pending_messages(&self, agent_id: &str) -> Option<usize> {
        self.registry.lock().agents.get(agent_id).map(|slot| slot.mailbox.len())
    }

    fn agent_ref(&self, agent_id: &str) -> Result<Arc<AsyncMutex<Agent>>, OrchestratorError> {
        self.registry
            .lock()
            .agents
            .get(agent_id)
            .map(|slot| slot.agent.clone())
            .ok_or_else(|| OrchestratorError::AgentNotFound(agent_id.to_string()))
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(Arc::new(GeneratorRegistry::default()), EventBus::default())
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        // Unblock any worker still waiting on its mailbox.
        for slot in self.registry.lock().agents.values() {
            slot.mailbox.close();
        }
    }
}

async fn join_worker(agent_id: &str, worker: JoinHandle<()>) {
    if let Err(e) = worker.await {
        error!(agent_id = %agent_id, "agent worker terminated abnormally: {}", e);
    }
}

/// Per-agent worker: feed mailbox messages into the agent until the mailbox
/// closes or the agent is removed.
async fn message_loop(
    agent_id: String,
    agent: Arc<AsyncMutex<Agent>>,
    mailbox: Arc<Mailbox>,
    registry: Arc<Mutex<Registry>>,
    event_bus: EventBus,
) {
    debug!(agent_id = %agent_id, "worker started");

    loop {
        let running = registry.lock().is_running(&agent_id);
        if !running {
            break;
        }

        let Some(message) = mailbox.pop().await else {
            break;
        };

        {
            let mut agent = agent.lock().await;
            if let Err(e) = agent.handle_message(&message).await {
                warn!(agent_id = %agent_id, from = %message.from, "message handling failed: {}", e);
            }
        }

        event_bus.publish_messaging_event(MessagingEvent::MessageHandled {
            message_id: message.id,
            agent_id: agent_id.clone(),
            message_type: message.message_type,
            handled_at: Utc::now(),
        });
    }

    debug!(agent_id = %agent_id, "worker stopped");
}
