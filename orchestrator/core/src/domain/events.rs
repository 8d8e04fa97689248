// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::message::MessageType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AgentLifecycleEvent {
    AgentCreated {
        agent_id: String,
        model_ref: String,
        backend: String,
        created_at: DateTime<Utc>,
    },
    AgentInitializationFailed {
        agent_id: String,
        reason: String,
        failed_at: DateTime<Utc>,
    },
    AgentRemoved {
        agent_id: String,
        removed_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TaskEvent {
    TaskStarted {
        agent_id: String,
        task_keyword: String,
        started_at: DateTime<Utc>,
    },
    TaskCompleted {
        agent_id: String,
        task_keyword: String,
        reasoning_steps: usize,
        key_insights: usize,
        completed_at: DateTime<Utc>,
    },
    TaskFailed {
        agent_id: String,
        task_keyword: String,
        reason: String,
        failed_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MessagingEvent {
    MessageRouted {
        message_id: Uuid,
        from: String,
        to: String,
        message_type: MessageType,
        routed_at: DateTime<Utc>,
    },
    MessageDropped {
        message_id: Uuid,
        from: String,
        to: String,
        reason: String,
        dropped_at: DateTime<Utc>,
    },
    MessageHandled {
        message_id: Uuid,
        agent_id: String,
        message_type: MessageType,
        handled_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MemoryEvent {
    TracesEvicted {
        agent_id: String,
        evicted: usize,
        remaining: usize,
        memory_usage: usize,
        evicted_at: DateTime<Utc>,
    },
}

/// Unified event type published on the orchestrator's event bus
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrchestratorEvent {
    AgentLifecycle(AgentLifecycleEvent),
    Task(TaskEvent),
    Messaging(MessagingEvent),
    Memory(MemoryEvent),
}

impl OrchestratorEvent {
    /// Agent the event concerns. Messaging events report the recipient.
    pub fn agent_id(&self) -> &str {
        match self {
            OrchestratorEvent::AgentLifecycle(event) => match event {
                AgentLifecycleEvent::AgentCreated { agent_id, .. }
                | AgentLifecycleEvent::AgentInitializationFailed { agent_id, .. }
                | AgentLifecycleEvent::AgentRemoved { agent_id, .. } => agent_id,
            },
            OrchestratorEvent::Task(event) => match event {
                TaskEvent::TaskStarted { agent_id, .. }
                | TaskEvent::TaskCompleted { agent_id, .. }
                | TaskEvent::TaskFailed { agent_id, .. } => agent_id,
            },
            OrchestratorEvent::Messaging(event) => match event {
                MessagingEvent::MessageRouted { to, .. } | MessagingEvent::MessageDropped { to, .. } => to,
                MessagingEvent::MessageHandled { agent_id, .. } => agent_id,
            },
            OrchestratorEvent::Memory(MemoryEvent::TracesEvicted { agent_id, .. }) => agent_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = OrchestratorEvent::Task(TaskEvent::TaskStarted {
            agent_id: "a".to_string(),
            task_keyword: "scan".to_string(),
            started_at: Utc::now(),
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "task");
        assert_eq!(json["TaskStarted"]["task_keyword"], "scan");
    }

    #[test]
    fn test_agent_id_of_messaging_event_is_recipient() {
        let event = OrchestratorEvent::Messaging(MessagingEvent::MessageDropped {
            message_id: Uuid::new_v4(),
            from: "a".to_string(),
            to: "c".to_string(),
            reason: "unknown recipient".to_string(),
            dropped_at: Utc::now(),
        });

        assert_eq!(event.agent_id(), "c");
    }
}
