//! # Change Broadcast Hub
//!
//! Per-document pub/sub relay between open sessions.
//!
//! ## Invariant
//! Delivery is best-effort, at-most-once per subscriber per publish. A
//! disconnected subscriber drops the message; nothing is retried or buffered
//! for later delivery. Messages from one originator arrive in publish order;
//! no cross-originator order is guaranteed.

use std::collections::HashMap;
use std::sync::RwLock;

use tokio::sync::mpsc;
use uuid::Uuid;

use super::event::CollabMessage;

/// Receiving end of a hub subscription
pub type MessageReceiver = mpsc::UnboundedReceiver<CollabMessage>;

type MessageSender = mpsc::UnboundedSender<CollabMessage>;

/// Outcome of one publish call
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Subscribers registered for the document (excluding the origin)
    pub matched: usize,
    /// Messages handed to a live receiver
    pub delivered: usize,
    /// Subscribers whose receiver was already gone
    pub failed: usize,
}

/// Fan-out relay for collaboration messages
#[derive(Debug, Default)]
pub struct BroadcastHub {
    topics: RwLock<HashMap<Uuid, HashMap<Uuid, MessageSender>>>,
}

impl BroadcastHub {
    /// Create an empty hub
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a session to a document's topic
    ///
    /// Re-subscribing the same session replaces its previous receiver.
    pub fn subscribe(&self, document_id: Uuid, session_id: Uuid) -> MessageReceiver {
        let (tx, rx) = mpsc::unbounded_channel();

        if let Ok(mut topics) = self.topics.write() {
            topics.entry(document_id).or_default().insert(session_id, tx);
        }

        rx
    }

    /// Remove a session from a document's topic; unsubscribing twice is a no-op
    pub fn unsubscribe(&self, document_id: Uuid, session_id: Uuid) {
        if let Ok(mut topics) = self.topics.write() {
            if let Some(sessions) = topics.get_mut(&document_id) {
                sessions.remove(&session_id);
                if sessions.is_empty() {
                    topics.remove(&document_id);
                }
            }
        }
    }

    /// Fan a message out to every subscriber of the document except `origin`
    pub fn publish(
        &self,
        document_id: Uuid,
        origin: Option<Uuid>,
        message: CollabMessage,
    ) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        let mut dead: Vec<Uuid> = Vec::new();

        {
            let topics = match self.topics.read() {
                Ok(t) => t,
                Err(_) => return report,
            };

            let Some(sessions) = topics.get(&document_id) else {
                return report;
            };

            for (session_id, sender) in sessions {
                if Some(*session_id) == origin {
                    continue;
                }
                report.matched += 1;
                match sender.send(message.clone()) {
                    Ok(()) => report.delivered += 1,
                    Err(_) => {
                        report.failed += 1;
                        dead.push(*session_id);
                    }
                }
            }
        }

        // Drop senders whose receiver is gone so topics do not accumulate
        // closed connections.
        for session_id in dead {
            self.unsubscribe(document_id, session_id);
        }

        report
    }

    /// Number of subscribers for a document
    pub fn subscriber_count(&self, document_id: Uuid) -> usize {
        self.topics
            .read()
            .map(|topics| topics.get(&document_id).map(|s| s.len()).unwrap_or(0))
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(doc: Uuid, origin: Uuid, content: &str) -> CollabMessage {
        CollabMessage::DocumentChange {
            document_id: doc,
            origin_session: origin,
            user_id: Uuid::new_v4(),
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn test_origin_never_receives_own_message() {
        let hub = BroadcastHub::new();
        let doc = Uuid::new_v4();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let mut rx_a = hub.subscribe(doc, a);
        let mut rx_b = hub.subscribe(doc, b);

        let report = hub.publish(doc, Some(a), change(doc, a, "v1"));
        assert_eq!(report.matched, 1);
        assert_eq!(report.delivered, 1);

        let received = rx_b.recv().await.unwrap();
        assert!(matches!(
            received,
            CollabMessage::DocumentChange { ref content, .. } if content == "v1"
        ));

        // Nothing queued for the origin
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_per_origin_order_preserved() {
        let hub = BroadcastHub::new();
        let doc = Uuid::new_v4();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let mut rx_b = hub.subscribe(doc, b);
        hub.subscribe(doc, a);

        for content in ["v1", "v2", "v3"] {
            hub.publish(doc, Some(a), change(doc, a, content));
        }

        for expected in ["v1", "v2", "v3"] {
            let msg = rx_b.recv().await.unwrap();
            match msg {
                CollabMessage::DocumentChange { content, .. } => assert_eq!(content, expected),
                other => panic!("unexpected message: {:?}", other),
            }
        }
    }

    #[test]
    fn test_dropped_receiver_counts_failed_and_is_pruned() {
        let hub = BroadcastHub::new();
        let doc = Uuid::new_v4();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let rx_b = hub.subscribe(doc, b);
        drop(rx_b);

        let report = hub.publish(doc, Some(a), change(doc, a, "v1"));
        assert_eq!(report.failed, 1);
        assert_eq!(report.delivered, 0);

        // Second publish no longer sees the dead subscriber
        let report = hub.publish(doc, Some(a), change(doc, a, "v2"));
        assert_eq!(report.matched, 0);
    }

    #[test]
    fn test_unsubscribe_idempotent() {
        let hub = BroadcastHub::new();
        let doc = Uuid::new_v4();
        let a = Uuid::new_v4();

        let _rx = hub.subscribe(doc, a);
        assert_eq!(hub.subscriber_count(doc), 1);

        hub.unsubscribe(doc, a);
        hub.unsubscribe(doc, a);
        assert_eq!(hub.subscriber_count(doc), 0);
    }
}
