// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use mindmesh_core::application::{AgentHandle, Orchestrator, RetryPolicy};
use mindmesh_core::domain::agent::AgentConfig;
use mindmesh_core::domain::events::{AgentLifecycleEvent, OrchestratorEvent, TaskEvent};
use mindmesh_core::domain::llm::{GenerationOptions, Generator, GeneratorError, GeneratorFactory};
use mindmesh_core::domain::message::{Message, MessageType};
use mindmesh_core::infrastructure::event_bus::EventBus;
use mindmesh_core::infrastructure::router::RouterError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};

/// Generator that sleeps inside every call and records how many calls
/// overlapped.
#[derive(Default)]
struct CallTracker {
    active: AtomicUsize,
    max_active: AtomicUsize,
    calls: AtomicUsize,
}

struct SlowGenerator {
    tracker: Arc<CallTracker>,
}

#[async_trait]
impl Generator for SlowGenerator {
    async fn load_model(&mut self, _model_ref: &str) -> Result<(), GeneratorError> {
        Ok(())
    }

    async fn generate(&self, _prompt: &str, _options: &GenerationOptions) -> Result<String, GeneratorError> {
        let now = self.tracker.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.tracker.max_active.fetch_max(now, Ordering::SeqCst);
        self.tracker.calls.fetch_add(1, Ordering::SeqCst);

        sleep(Duration::from_millis(5)).await;

        self.tracker.active.fetch_sub(1, Ordering::SeqCst);
        Ok("1. Look around\n2. Write it down".to_string())
    }

    fn backend_name(&self) -> &str {
        "slow"
    }
}

struct SlowFactory {
    tracker: Arc<CallTracker>,
}

impl GeneratorFactory for SlowFactory {
    fn create(&self, _model_ref: &str) -> Box<dyn Generator> {
        Box::new(SlowGenerator {
            tracker: self.tracker.clone(),
        })
    }
}

/// Generator whose first `failures` calls report a network error.
struct FlakyGenerator {
    remaining_failures: Arc<AtomicUsize>,
}

#[async_trait]
impl Generator for FlakyGenerator {
    async fn load_model(&mut self, _model_ref: &str) -> Result<(), GeneratorError> {
        Ok(())
    }

    async fn generate(&self, _prompt: &str, _options: &GenerationOptions) -> Result<String, GeneratorError> {
        let failing = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(GeneratorError::Network("connection reset".to_string()));
        }
        Ok("- fine".to_string())
    }

    fn backend_name(&self) -> &str {
        "flaky"
    }
}

struct FlakyFactory {
    failures: usize,
}

impl GeneratorFactory for FlakyFactory {
    fn create(&self, _model_ref: &str) -> Box<dyn Generator> {
        Box::new(FlakyGenerator {
            remaining_failures: Arc::new(AtomicUsize::new(self.failures)),
        })
    }
}

fn fast_retry(max_attempts: usize) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        ..RetryPolicy::default()
    }
}

async fn stub_orchestrator(ids: &[&str]) -> Orchestrator {
    let orchestrator = Orchestrator::default();
    for id in ids {
        orchestrator.create_agent(AgentConfig::new(*id, "stub")).await.unwrap();
    }
    orchestrator
}

async fn wait_for_world_model(handle: &AgentHandle, expected: &str) -> String {
    let result = timeout(Duration::from_secs(5), async {
        loop {
            let text = handle.world_model().await;
            if text.contains(expected) {
                return text;
            }
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    result.unwrap_or_else(|_| panic!("world model never contained {expected:?}"))
}

async fn wait_for_traces(handle: &AgentHandle, count: usize) {
    timeout(Duration::from_secs(5), async {
        while handle.trace_count().await < count {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("traces were not recorded in time");
}

#[tokio::test]
async fn test_findings_reach_recipient_world_model() {
    let orchestrator = stub_orchestrator(&["a", "b"]).await;
    let a = orchestrator.agent("a").unwrap();
    let b = orchestrator.agent("b").unwrap();

    assert!(a.send_message("b", MessageType::FindingsSharing, "X"));

    let world_model = wait_for_world_model(&b, "From a: X").await;
    assert_eq!(world_model, "From a: X");

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_message_to_unknown_agent_is_rejected() {
    let orchestrator = stub_orchestrator(&["a", "b"]).await;

    let err = orchestrator
        .route_message(Message::new("a", "c", MessageType::Query, "status?"))
        .unwrap_err();
    assert!(matches!(err, RouterError::UnknownRecipient(ref id) if id == "c"));

    let a = orchestrator.agent("a").unwrap();
    assert!(!a.send_message("c", MessageType::Query, "status?"));

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_delegated_task_runs_on_recipient() {
    let orchestrator = stub_orchestrator(&["a", "b"]).await;
    let a = orchestrator.agent("a").unwrap();
    let b = orchestrator.agent("b").unwrap();

    assert!(a.send_message("b", MessageType::TaskDelegation, "scan ports"));
    wait_for_traces(&b, 1).await;

    let history = b.history().await;
    assert_eq!(history[0].task_keyword, "scan ports");
    assert_eq!(a.trace_count().await, 0);

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_direct_and_delegated_tasks_do_not_interleave() {
    let tracker = Arc::new(CallTracker::default());
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(SlowFactory { tracker: tracker.clone() }),
        EventBus::default(),
    ));
    orchestrator.create_agent(AgentConfig::new("a", "slow")).await.unwrap();
    orchestrator.create_agent(AgentConfig::new("b", "slow")).await.unwrap();

    let submitter = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.submit_task("b", "direct").await })
    };
    let a = orchestrator.agent("a").unwrap();
    assert!(a.send_message("b", MessageType::TaskDelegation, "delegated"));

    let report = submitter.await.unwrap();
    assert!(report.contains("FINAL REPORT - Agent: b"));

    let b = orchestrator.agent("b").unwrap();
    wait_for_traces(&b, 2).await;

    assert!(tracker.calls.load(Ordering::SeqCst) > 2);
    assert_eq!(tracker.max_active.load(Ordering::SeqCst), 1);

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_broadcast_skips_excluded_sender() {
    let orchestrator = stub_orchestrator(&["a", "b", "c"]).await;

    let message = Message::new("a", "*", MessageType::FindingsSharing, "open port 22");
    assert_eq!(orchestrator.broadcast(&message, Some("a")), 2);

    for id in ["b", "c"] {
        let handle = orchestrator.agent(id).unwrap();
        wait_for_world_model(&handle, "From a: open port 22").await;
    }

    sleep(Duration::from_millis(20)).await;
    let a = orchestrator.agent("a").unwrap();
    assert!(!a.world_model().await.contains("open port 22"));

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_remove_agent_stops_delivery() {
    let orchestrator = stub_orchestrator(&["a", "b"]).await;
    let mut events = orchestrator.subscribe();

    orchestrator.remove_agent("b").await.unwrap();

    assert!(!orchestrator.has_agent("b"));
    assert_eq!(orchestrator.agent_ids(), vec!["a"]);
    assert!(orchestrator
        .route_message(Message::new("a", "b", MessageType::FindingsSharing, "late"))
        .is_err());
    assert_eq!(orchestrator.submit_task("b", "scan").await, "Error: Agent not found: b");

    let event = timeout(Duration::from_secs(1), events.recv()).await.unwrap().unwrap();
    assert!(matches!(
        event,
        OrchestratorEvent::AgentLifecycle(AgentLifecycleEvent::AgentRemoved { ref agent_id, .. }) if agent_id == "b"
    ));

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_agent_id_can_be_reused_after_removal() {
    let orchestrator = stub_orchestrator(&["a"]).await;
    orchestrator.remove_agent("a").await.unwrap();
    orchestrator.create_agent(AgentConfig::new("a", "stub")).await.unwrap();

    let a = orchestrator.agent("a").unwrap();
    orchestrator
        .route_message(Message::new("x", "a", MessageType::FindingsSharing, "hello"))
        .unwrap();
    wait_for_world_model(&a, "From x: hello").await;

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_task_events_are_published() {
    let orchestrator = stub_orchestrator(&["a"]).await;
    let mut events = orchestrator.event_bus().subscribe_agent("a");

    let report = orchestrator.submit_task("a", "audit").await;
    assert!(report.contains("FINAL REPORT"));

    let mut started = false;
    let completed = timeout(Duration::from_secs(1), async {
        loop {
            match events.recv().await.unwrap() {
                OrchestratorEvent::Task(TaskEvent::TaskStarted { task_keyword, .. }) => {
                    started = task_keyword == "audit";
                }
                OrchestratorEvent::Task(TaskEvent::TaskCompleted { task_keyword, .. }) => {
                    return task_keyword;
                }
                _ => {}
            }
        }
    })
    .await
    .unwrap();

    assert!(started);
    assert_eq!(completed, "audit");

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_generator_failure_is_reported_as_text() {
    let orchestrator = Orchestrator::new(Arc::new(FlakyFactory { failures: usize::MAX }), EventBus::default());
    orchestrator.create_agent(AgentConfig::new("a", "flaky")).await.unwrap();

    let result = orchestrator.submit_task("a", "scan").await;
    assert_eq!(result, "Error: Network error: connection reset");

    let a = orchestrator.agent("a").unwrap();
    assert_eq!(a.trace_count().await, 0);

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_submit_with_retry_recovers() {
    let orchestrator = Orchestrator::new(Arc::new(FlakyFactory { failures: 2 }), EventBus::default());
    orchestrator.create_agent(AgentConfig::new("a", "flaky")).await.unwrap();

    let report = orchestrator.submit_with_retry("a", "scan", fast_retry(3)).await;
    assert!(report.contains("FINAL REPORT - Agent: a"), "unexpected result: {report}");

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_submit_with_retry_gives_up() {
    let orchestrator = Orchestrator::new(Arc::new(FlakyFactory { failures: usize::MAX }), EventBus::default());
    orchestrator.create_agent(AgentConfig::new("a", "flaky")).await.unwrap();

    let result = orchestrator.submit_with_retry("a", "scan", fast_retry(2)).await;
    assert!(result.starts_with("Error:"));

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_removes_every_agent() {
    let orchestrator = stub_orchestrator(&["a", "b", "c"]).await;
    let b = orchestrator.agent("b").unwrap();

    orchestrator.shutdown().await;

    assert_eq!(orchestrator.agent_count(), 0);
    assert!(orchestrator
        .route_message(Message::new("a", "b", MessageType::Query, "?"))
        .is_err());
    assert!(!b.send_message("a", MessageType::Query, "?"));

    // Second shutdown is a no-op.
    orchestrator.shutdown().await;
}
