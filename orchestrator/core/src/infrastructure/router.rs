// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Message Router - agent id -> mailbox resolution
//
// The router never owns a mailbox: it keeps `Weak` references so that
// removing an agent from the orchestrator registry is enough to retire its
// mailbox. Messages for unknown or retired recipients are dropped; there is
// no dead letter queue.

use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

use crate::domain::events::MessagingEvent;
use crate::domain::message::Message;
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::mailbox::Mailbox;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouterError {
    #[error("Unknown recipient: {0}")]
    UnknownRecipient(String),
}

/// Delivery seam used by agents to send messages without holding a
/// reference to the orchestrator.
pub trait MessageDispatcher: Send + Sync {
    fn dispatch(&self, message: Message) -> Result<(), RouterError>;
}

#[derive(Default)]
pub struct Router {
    mailboxes: RwLock<HashMap<String, Weak<Mailbox>>>,
    event_bus: Option<EventBus>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_event_bus(event_bus: EventBus) -> Self {
        Self {
            mailboxes: RwLock::new(HashMap::new()),
            event_bus: Some(event_bus),
        }
    }

    /// Map `agent_id` to `mailbox`, replacing any previous mapping.
    pub fn register(&self, agent_id: impl Into<String>, mailbox: &Arc<Mailbox>) {
        let agent_id = agent_id.into();
        debug!(agent_id = %agent_id, "registering mailbox");
        self.mailboxes.write().insert(agent_id, Arc::downgrade(mailbox));
    }

    pub fn unregister(&self, agent_id: &str) {
        self.mailboxes.write().remove(agent_id);
    }

    pub fn is_registered(&self, agent_id: &str) -> bool {
        self.resolve(agent_id).is_some()
    }

    /// Ids whose mailbox is still alive, sorted.
    pub fn registered_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .mailboxes
            .read()
            .iter()
            .filter(|(_, mailbox)| mailbox.strong_count() > 0)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    fn resolve(&self, agent_id: &str) -> Option<Arc<Mailbox>> {
        self.mailboxes.read().get(agent_id).and_then(Weak::upgrade)
    }

    /// Deliver `message` to the mailbox registered for `message.to`.
    pub fn route(&self, message: Message) -> Result<(), RouterError> {
        let Some(mailbox) = self.resolve(&message.to) else {
            warn!(from = %message.from, to = %message.to, "no mailbox for recipient, dropping message");
            self.publish(MessagingEvent::MessageDropped {
                message_id: message.id,
                from: message.from.clone(),
                to: message.to.clone(),
                reason: "unknown recipient".to_string(),
                dropped_at: Utc::now(),
            });
            return Err(RouterError::UnknownRecipient(message.to));
        };

        let routed = MessagingEvent::MessageRouted {
            message_id: message.id,
            from: message.from.clone(),
            to: message.to.clone(),
            message_type: message.message_type,
            routed_at: Utc::now(),
        };

        if mailbox.push(message) {
            self.publish(routed);
        }
        Ok(())
    }

    /// Deliver a copy of `message` to every registered mailbox except
    /// `exclude`. Returns the number of mailboxes that accepted it.
    pub fn broadcast(&self, message: &Message, exclude: Option<&str>) -> usize {
        let recipients: Vec<(String, Arc<Mailbox>)> = self
            .mailboxes
            .read()
            .iter()
            .filter(|(id, _)| Some(id.as_str()) != exclude)
            .filter_map(|(id, mailbox)| mailbox.upgrade().map(|m| (id.clone(), m)))
            .collect();

        recipients
            .into_iter()
            .filter(|(id, mailbox)| mailbox.push(message.readdressed(id.as_str())))
            .count()
    }

    fn publish(&self, event: MessagingEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish_messaging_event(event);
        }
    }
}

impl MessageDispatcher for Router {
    fn dispatch(&self, message: Message) -> Result<(), RouterError> {
        self.route(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::message::MessageType;

    fn msg(to: &str, payload: &str) -> Message {
        Message::new("a", to, MessageType::FindingsSharing, payload)
    }

    #[test]
    fn test_route_to_registered_mailbox() {
        let router = Router::new();
        let mailbox = Arc::new(Mailbox::new());
        router.register("b", &mailbox);

        router.route(msg("b", "X")).unwrap();
        assert_eq!(mailbox.try_pop().unwrap().payload, "X");
    }

    #[test]
    fn test_route_unknown_recipient_fails() {
        let router = Router::new();
        let a = Arc::new(Mailbox::new());
        let b = Arc::new(Mailbox::new());
        router.register("a", &a);
        router.register("b", &b);

        let err = router.route(msg("c", "X")).unwrap_err();
        assert_eq!(err, RouterError::UnknownRecipient("c".to_string()));
        assert!(a.is_empty());
        assert!(b.is_empty());
    }

    #[test]
    fn test_router_does_not_keep_mailbox_alive() {
        let router = Router::new();
        let mailbox = Arc::new(Mailbox::new());
        router.register("b", &mailbox);
        let other = Arc::new(Mailbox::new());
        router.register("a", &other);
        assert_eq!(router.registered_ids(), vec!["a", "b"]);
        drop(mailbox);

        assert!(!router.is_registered("b"));
        assert_eq!(router.registered_ids(), vec!["a"]);
        assert!(router.route(msg("b", "X")).is_err());
    }

    #[test]
    fn test_register_overwrites_and_unregister_removes() {
        let router = Router::new();
        let first = Arc::new(Mailbox::new());
        let second = Arc::new(Mailbox::new());
        router.register("b", &first);
        router.register("b", &second);

        router.route(msg("b", "X")).unwrap();
        assert!(first.is_empty());
        assert_eq!(second.len(), 1);

        router.unregister("b");
        assert!(router.route(msg("b", "Y")).is_err());
    }

    #[test]
    fn test_broadcast_skips_excluded() {
        let router = Router::new();
        let boxes: Vec<_> = ["a", "b", "c"]
            .iter()
            .map(|id| {
                let mailbox = Arc::new(Mailbox::new());
                router.register(*id, &mailbox);
                (id.to_string(), mailbox)
            })
            .collect();

        let delivered = router.broadcast(&msg("", "hello"), Some("a"));
        assert_eq!(delivered, 2);

        for (id, mailbox) in &boxes {
            if id == "a" {
                assert!(mailbox.is_empty());
            } else {
                let received = mailbox.try_pop().unwrap();
                assert_eq!(received.to, *id);
                assert_eq!(received.payload, "hello");
            }
        }
    }

    #[tokio::test]
    async fn test_route_publishes_events() {
        let bus = EventBus::new(10);
        let mut events = bus.subscribe();
        let router = Router::with_event_bus(bus);
        let mailbox = Arc::new(Mailbox::new());
        router.register("b", &mailbox);

        router.route(msg("b", "X")).unwrap();
        let _ = router.route(msg("c", "X"));

        let first = events.recv().await.unwrap();
        assert!(matches!(
            first,
            crate::domain::events::OrchestratorEvent::Messaging(MessagingEvent::MessageRouted { .. })
        ));
        let second = events.recv().await.unwrap();
        assert!(matches!(
            second,
            crate::domain::events::OrchestratorEvent::Messaging(MessagingEvent::MessageDropped { .. })
        ));
    }
}
