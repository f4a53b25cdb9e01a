//! # Presence Registry
//!
//! Tracks which identities currently have a document open. Mutated only by
//! session join/leave; read by any session rendering "who is editing".

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One open session against a document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceEntry {
    /// Session ID
    pub session_id: Uuid,

    /// User ID
    pub user_id: Uuid,

    /// Display name
    pub display_name: String,

    /// When the session joined
    pub joined_at: DateTime<Utc>,
}

impl PresenceEntry {
    /// Create an entry joined now
    pub fn new(session_id: Uuid, user_id: Uuid, display_name: String) -> Self {
        Self {
            session_id,
            user_id,
            display_name,
            joined_at: Utc::now(),
        }
    }
}

/// Registry of active sessions per document
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    entries: RwLock<HashMap<Uuid, HashMap<Uuid, PresenceEntry>>>,
}

impl PresenceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session against a document
    pub fn join(&self, document_id: Uuid, entry: PresenceEntry) {
        if let Ok(mut entries) = self.entries.write() {
            entries
                .entry(document_id)
                .or_default()
                .insert(entry.session_id, entry);
        }
    }

    /// Remove a session; a second leave for the same session is a no-op
    pub fn leave(&self, document_id: Uuid, session_id: Uuid) -> Option<PresenceEntry> {
        let mut entries = self.entries.write().ok()?;
        let sessions = entries.get_mut(&document_id)?;
        let removed = sessions.remove(&session_id);
        if sessions.is_empty() {
            entries.remove(&document_id);
        }
        removed
    }

    /// Snapshot of the active session set for a document
    pub fn entries(&self, document_id: Uuid) -> Vec<PresenceEntry> {
        self.entries
            .read()
            .map(|entries| {
                entries
                    .get(&document_id)
                    .map(|sessions| sessions.values().cloned().collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    /// Number of open sessions for a document
    pub fn count(&self, document_id: Uuid) -> usize {
        self.entries
            .read()
            .map(|entries| entries.get(&document_id).map(|s| s.len()).unwrap_or(0))
            .unwrap_or(0)
    }

    /// Check whether a session is registered
    pub fn is_present(&self, document_id: Uuid, session_id: Uuid) -> bool {
        self.entries
            .read()
            .map(|entries| {
                entries
                    .get(&document_id)
                    .map(|s| s.contains_key(&session_id))
                    .unwrap_or(false)
            })
            .unwrap_or(false)
    }
}
