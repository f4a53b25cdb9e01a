//! # Document Store Seam
//!
//! The document blob (title, metadata, current content) belongs to an
//! external storage collaborator. The core only ever reads a record and
//! overwrites its current content, so the seam is two methods wide.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use uuid::Uuid;

use super::errors::{StoreError, StoreResult};

/// The slice of a document the core is allowed to touch
#[derive(Debug, Clone)]
pub struct DocumentRecord {
    /// Document ID
    pub id: Uuid,

    /// Title (read-only for the core)
    pub title: String,

    /// Full-document markup; opaque to the core
    pub current_content: String,
}

/// Seam to the external document storage collaborator
///
/// `write_current` must be all-or-nothing: on `Persistence` failure the
/// previous content remains in place.
pub trait DocumentStore: Send + Sync {
    /// Load a document record, `DocumentNotFound` if absent
    fn load(&self, document_id: Uuid) -> StoreResult<DocumentRecord>;

    /// Overwrite the document's current content
    fn write_current(&self, document_id: Uuid, content: &str) -> StoreResult<()>;
}

/// In-memory document store
///
/// Backs the engine in tests and single-node deployments. `fail_next_write`
/// injects a single persistence failure so error paths can be exercised
/// without a real storage outage.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    documents: RwLock<HashMap<Uuid, DocumentRecord>>,
    fail_next_write: AtomicBool,
}

impl MemoryDocumentStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a document record
    pub fn insert(&self, record: DocumentRecord) {
        if let Ok(mut docs) = self.documents.write() {
            docs.insert(record.id, record);
        }
    }

    /// Create a document with the given title and content, returning its id
    pub fn create(&self, title: &str, content: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.insert(DocumentRecord {
            id,
            title: title.to_string(),
            current_content: content.to_string(),
        });
        id
    }

    /// Arm a one-shot write failure
    pub fn fail_next_write(&self) {
        self.fail_next_write.store(true, Ordering::SeqCst);
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn load(&self, document_id: Uuid) -> StoreResult<DocumentRecord> {
        let docs = self
            .documents
            .read()
            .map_err(|_| StoreError::Persistence("Lock poisoned".into()))?;

        docs.get(&document_id)
            .cloned()
            .ok_or(StoreError::DocumentNotFound(document_id))
    }

    fn write_current(&self, document_id: Uuid, content: &str) -> StoreResult<()> {
        if self.fail_next_write.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Persistence("Injected write failure".into()));
        }

        let mut docs = self
            .documents
            .write()
            .map_err(|_| StoreError::Persistence("Lock poisoned".into()))?;

        let record = docs
            .get_mut(&document_id)
            .ok_or(StoreError::DocumentNotFound(document_id))?;

        record.current_content = content.to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing() {
        let store = MemoryDocumentStore::new();
        let result = store.load(Uuid::new_v4());
        assert!(matches!(result, Err(StoreError::DocumentNotFound(_))));
    }

    #[test]
    fn test_write_current() {
        let store = MemoryDocumentStore::new();
        let id = store.create("Notes", "v0");

        store.write_current(id, "v1").unwrap();

        let record = store.load(id).unwrap();
        assert_eq!(record.current_content, "v1");
        assert_eq!(record.title, "Notes");
    }

    #[test]
    fn test_injected_failure_is_one_shot() {
        let store = MemoryDocumentStore::new();
        let id = store.create("Notes", "v0");

        store.fail_next_write();
        let result = store.write_current(id, "v1");
        assert!(matches!(result, Err(StoreError::Persistence(_))));

        // Content untouched by the failed write
        assert_eq!(store.load(id).unwrap().current_content, "v0");

        // Next write goes through
        store.write_current(id, "v1").unwrap();
        assert_eq!(store.load(id).unwrap().current_content, "v1");
    }
}
