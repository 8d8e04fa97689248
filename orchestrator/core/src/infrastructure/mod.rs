// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod event_bus;
pub mod llm;
pub mod mailbox;
pub mod router;

pub use event_bus::EventBus;
pub use mailbox::Mailbox;
pub use router::{MessageDispatcher, Router, RouterError};
