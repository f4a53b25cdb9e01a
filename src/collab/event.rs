//! # Collaboration Events
//!
//! Messages fanned out between open sessions of one document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity payload carried by presence events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    /// Session the user is attached through
    pub session_id: Uuid,

    /// User ID
    pub user_id: Uuid,

    /// Display name
    pub display_name: String,
}

/// A message relayed through the Broadcast Hub
///
/// Delivery is best-effort, at-most-once per subscriber. Per-originator
/// order is preserved; cross-originator order is not.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CollabMessage {
    /// A user opened the document
    UserJoined {
        document_id: Uuid,
        user: UserInfo,
        timestamp: DateTime<Utc>,
    },

    /// A user closed the document (or the connection dropped)
    UserLeft {
        document_id: Uuid,
        session_id: Uuid,
        user_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// Full-document content change from one session
    DocumentChange {
        document_id: Uuid,
        origin_session: Uuid,
        user_id: Uuid,
        content: String,
    },

    /// A save was accepted; clients refresh their version-history view
    DocumentSaved {
        document_id: Uuid,
        user_name: String,
        version: u64,
    },
}

impl CollabMessage {
    /// The document the message belongs to
    pub fn document_id(&self) -> Uuid {
        match self {
            CollabMessage::UserJoined { document_id, .. }
            | CollabMessage::UserLeft { document_id, .. }
            | CollabMessage::DocumentChange { document_id, .. }
            | CollabMessage::DocumentSaved { document_id, .. } => *document_id,
        }
    }

    /// Originating session, for messages that carry one
    pub fn origin_session(&self) -> Option<Uuid> {
        match self {
            CollabMessage::DocumentChange { origin_session, .. } => Some(*origin_session),
            _ => None,
        }
    }
}
