// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Agent Mailbox - Unbounded FIFO of inbound messages
//
// One mailbox per agent, consumed by exactly one worker task. Closing wakes
// every waiter; after close, pushes are dropped and pops drain what is left.

use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::Notify;
use tracing::debug;

use crate::domain::message::Message;

#[derive(Default)]
struct MailboxState {
    queue: VecDeque<Message>,
    closed: bool,
}

#[derive(Default)]
pub struct Mailbox {
    state: Mutex<MailboxState>,
    notify: Notify,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a message. Dropped silently once the mailbox is closed.
    pub fn push(&self, message: Message) -> bool {
        {
            let mut state = self.state.lock();
            if state.closed {
                debug!(to = %message.to, "mailbox closed, dropping message");
                return false;
            }
            state.queue.push_back(message);
        }
        self.notify.notify_one();
        true
    }

    /// Wait for the next message.
    ///
    /// Returns `None` only when the mailbox is closed and empty.
    pub async fn pop(&self) -> Option<Message> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking state so a push between check and await is not lost.
            notified.as_mut().enable();

            {
                let mut state = self.state.lock();
                if let Some(message) = state.queue.pop_front() {
                    return Some(message);
                }
                if state.closed {
                    return None;
                }
            }

            notified.await;
        }
    }

    pub fn try_pop(&self) -> Option<Message> {
        self.state.lock().queue.pop_front()
    }

    /// Close the mailbox and wake every waiting `pop`. Idempotent.
    pub fn close(&self) {
        {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
        }
        self.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().queue.is_empty()
    }
}
