//! # Version Store
//!
//! Append-only log of immutable content snapshots per document.
//!
//! ## Invariant
//! Version numbers per document are contiguous integers starting at 1 with
//! no gaps or duplicates. The store itself assigns `last + 1` under its own
//! lock; concurrent save ordering is the Save Pipeline's responsibility.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::errors::{StoreError, StoreResult};

/// An immutable content snapshot
///
/// Never updated or deleted once appended; retention policy belongs to the
/// storage collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionSnapshot {
    /// Owning document
    pub document_id: Uuid,

    /// Strictly increasing per document, starts at 1
    pub version_number: u64,

    /// Full document content at snapshot time
    pub content: String,

    /// User who triggered the save
    pub author_id: Uuid,

    /// Snapshot time
    pub created_at: DateTime<Utc>,

    /// True for explicit/manual saves, false for autosaves
    pub is_major: bool,

    /// Opaque diagnostic payload (word/char counts etc.)
    pub stats: Value,
}

/// Snapshot metadata without content, for listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionMeta {
    /// Owning document
    pub document_id: Uuid,

    /// Version number
    pub version_number: u64,

    /// User who triggered the save
    pub author_id: Uuid,

    /// Snapshot time
    pub created_at: DateTime<Utc>,

    /// Major/minor flag
    pub is_major: bool,

    /// Opaque diagnostic payload
    pub stats: Value,
}

impl From<&VersionSnapshot> for VersionMeta {
    fn from(snapshot: &VersionSnapshot) -> Self {
        Self {
            document_id: snapshot.document_id,
            version_number: snapshot.version_number,
            author_id: snapshot.author_id,
            created_at: snapshot.created_at,
            is_major: snapshot.is_major,
            stats: snapshot.stats.clone(),
        }
    }
}

/// Append-only version log, keyed by document
#[derive(Debug, Default)]
pub struct VersionStore {
    versions: RwLock<HashMap<Uuid, Vec<VersionSnapshot>>>,
}

impl VersionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a snapshot, assigning the next version number
    pub fn append(
        &self,
        document_id: Uuid,
        content: &str,
        author_id: Uuid,
        is_major: bool,
        stats: Value,
    ) -> StoreResult<u64> {
        let mut versions = self
            .versions
            .write()
            .map_err(|_| StoreError::Persistence("Lock poisoned".into()))?;

        let log = versions.entry(document_id).or_default();
        let version_number = log.last().map(|s| s.version_number).unwrap_or(0) + 1;

        log.push(VersionSnapshot {
            document_id,
            version_number,
            content: content.to_string(),
            author_id,
            created_at: Utc::now(),
            is_major,
            stats,
        });

        Ok(version_number)
    }

    /// List snapshot metadata, newest first
    pub fn list(&self, document_id: Uuid) -> Vec<VersionMeta> {
        self.versions
            .read()
            .map(|versions| {
                versions
                    .get(&document_id)
                    .map(|log| log.iter().rev().map(VersionMeta::from).collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    /// Fetch a single snapshot with its full content
    pub fn get(&self, document_id: Uuid, version_number: u64) -> StoreResult<VersionSnapshot> {
        let versions = self
            .versions
            .read()
            .map_err(|_| StoreError::Persistence("Lock poisoned".into()))?;

        versions
            .get(&document_id)
            .and_then(|log| {
                log.iter()
                    .find(|s| s.version_number == version_number)
                    .cloned()
            })
            .ok_or(StoreError::VersionNotFound {
                document_id,
                version: version_number,
            })
    }

    /// Highest version number for a document, if any snapshot exists
    pub fn last_version(&self, document_id: Uuid) -> Option<u64> {
        self.versions
            .read()
            .ok()
            .and_then(|v| v.get(&document_id).and_then(|log| log.last().map(|s| s.version_number)))
    }

    /// Timestamp of the most recent snapshot, if any
    pub fn last_snapshot_at(&self, document_id: Uuid) -> Option<DateTime<Utc>> {
        self.versions
            .read()
            .ok()
            .and_then(|v| v.get(&document_id).and_then(|log| log.last().map(|s| s.created_at)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_append_numbers_from_one() {
        let store = VersionStore::new();
        let doc = Uuid::new_v4();
        let author = Uuid::new_v4();

        let v1 = store.append(doc, "a", author, true, json!({})).unwrap();
        let v2 = store.append(doc, "b", author, false, json!({})).unwrap();

        assert_eq!(v1, 1);
        assert_eq!(v2, 2);
        assert_eq!(store.last_version(doc), Some(2));
    }

    #[test]
    fn test_documents_number_independently() {
        let store = VersionStore::new();
        let author = Uuid::new_v4();
        let doc_a = Uuid::new_v4();
        let doc_b = Uuid::new_v4();

        store.append(doc_a, "a", author, true, json!({})).unwrap();
        let v = store.append(doc_b, "b", author, true, json!({})).unwrap();

        assert_eq!(v, 1);
    }

    #[test]
    fn test_list_newest_first_without_content() {
        let store = VersionStore::new();
        let doc = Uuid::new_v4();
        let author = Uuid::new_v4();

        store.append(doc, "a", author, true, json!({})).unwrap();
        store.append(doc, "b", author, false, json!({})).unwrap();

        let listing = store.list(doc);
        assert_eq!(listing.len(), 2);
        assert_eq!(listing[0].version_number, 2);
        assert_eq!(listing[1].version_number, 1);
        assert!(listing[0].is_major == false && listing[1].is_major == true);
    }

    #[test]
    fn test_get_full_content() {
        let store = VersionStore::new();
        let doc = Uuid::new_v4();
        let author = Uuid::new_v4();

        store.append(doc, "hello", author, true, json!({"words": 1})).unwrap();

        let snapshot = store.get(doc, 1).unwrap();
        assert_eq!(snapshot.content, "hello");
        assert_eq!(snapshot.stats["words"], 1);
    }

    #[test]
    fn test_get_missing_version() {
        let store = VersionStore::new();
        let doc = Uuid::new_v4();

        let result = store.get(doc, 1);
        assert!(matches!(
            result,
            Err(StoreError::VersionNotFound { version: 1, .. })
        ));
    }

    #[test]
    fn test_empty_listing() {
        let store = VersionStore::new();
        assert!(store.list(Uuid::new_v4()).is_empty());
        assert_eq!(store.last_version(Uuid::new_v4()), None);
    }
}
