// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Message
//!
//! Inter-agent message envelope.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Message value type routed between agent mailboxes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Ask the recipient to run a task; the payload is the task keyword
    TaskDelegation,
    /// Share findings; folded into the recipient's world model
    FindingsSharing,
    Query,
    /// Answer to a query; folded into the recipient's world model
    Response,
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageType::TaskDelegation => "task_delegation",
            MessageType::FindingsSharing => "findings_sharing",
            MessageType::Query => "query",
            MessageType::Response => "response",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub from: String,
    pub to: String,
    pub message_type: MessageType,
    pub payload: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        message_type: MessageType,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            from: from.into(),
            to: to.into(),
            message_type,
            payload: payload.into(),
            timestamp: Utc::now(),
        }
    }

    /// Copy of this message addressed to another recipient, with a fresh id.
    pub fn readdressed(&self, to: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            to: to.into(),
            ..self.clone()
        }
    }
}
