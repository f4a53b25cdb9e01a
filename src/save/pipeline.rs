//! # Save Pipeline
//!
//! The single logical writer for a document. Every mutation of current
//! content and every version cut goes through `save`, which holds a
//! per-document async lock for the full run:
//!
//! 1. No-op detection (identical content, minor save)
//! 2. Current-content write (external collaborator)
//! 3. Version-cut decision (major, first save, or stale threshold)
//! 4. `document_saved` broadcast
//!
//! Failure scenarios:
//! - Content write fails -> surfaced to the caller, version log untouched
//! - Version append fails -> surfaced, current content already written;
//!   the next accepted save cuts the snapshot instead
//!
//! Cross-document saves share no state and run fully in parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::errors::{SaveError, SaveResult};
use super::stats::ContentStats;
use crate::collab::event::CollabMessage;
use crate::collab::hub::BroadcastHub;
use crate::config::EngineConfig;
use crate::observability::{Logger, Severity};
use crate::store::{DocumentStore, VersionStore};

/// A save submitted to the pipeline
#[derive(Debug, Clone)]
pub struct SaveRequest {
    /// Target document
    pub document_id: Uuid,

    /// Full-document snapshot from the editor
    pub content: String,

    /// User performing the save
    pub author_id: Uuid,

    /// Display name, for the `document_saved` broadcast
    pub author_name: String,

    /// True for an explicit Save action
    pub is_major: bool,

    /// Diagnostic stats recorded with the snapshot
    pub stats: ContentStats,
}

/// Outcome of an accepted save call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Content was byte-identical and the save was minor; nothing written.
    /// `version` is the current snapshot number (0 before any snapshot).
    Unchanged { version: u64 },

    /// Content written. `version` is the snapshot number cut by this save,
    /// or the prior one when no snapshot was cut.
    Saved { version: u64, snapshot_cut: bool },
}

impl SaveOutcome {
    /// The version number the caller should display
    pub fn version(&self) -> u64 {
        match self {
            SaveOutcome::Unchanged { version } => *version,
            SaveOutcome::Saved { version, .. } => *version,
        }
    }
}

/// Serialized writer over current content and the version log
pub struct SavePipeline {
    documents: Arc<dyn DocumentStore>,
    versions: Arc<VersionStore>,
    hub: Arc<BroadcastHub>,
    config: EngineConfig,
    writers: StdMutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl SavePipeline {
    /// Create a pipeline over the given stores and hub
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        versions: Arc<VersionStore>,
        hub: Arc<BroadcastHub>,
        config: EngineConfig,
    ) -> Self {
        Self {
            documents,
            versions,
            hub,
            config,
            writers: StdMutex::new(HashMap::new()),
        }
    }

    /// The version store backing this pipeline
    pub fn versions(&self) -> &Arc<VersionStore> {
        &self.versions
    }

    /// Persist an editor's snapshot
    ///
    /// Serialized per document; concurrent calls for the same document queue
    /// on the writer lock in arrival order.
    pub async fn save(&self, request: SaveRequest) -> SaveResult<SaveOutcome> {
        let document_id = request.document_id;
        let writer = self.writer_lock(document_id);
        let outcome = {
            let _guard = writer.lock().await;
            self.save_under_lock(request).await
        };
        self.release_writer(document_id, &writer);
        outcome
    }

    async fn save_under_lock(&self, request: SaveRequest) -> SaveResult<SaveOutcome> {
        let record = self.documents.load(request.document_id)?;
        let prior_version = self.versions.last_version(request.document_id).unwrap_or(0);

        if !request.is_major && record.current_content == request.content {
            return Ok(SaveOutcome::Unchanged {
                version: prior_version,
            });
        }

        self.documents
            .write_current(request.document_id, &request.content)?;

        let (version, snapshot_cut) = if self.should_cut_snapshot(&request) {
            let version = self.versions.append(
                request.document_id,
                &request.content,
                request.author_id,
                request.is_major,
                request.stats.to_value(),
            )?;
            (version, true)
        } else {
            (prior_version, false)
        };

        Logger::log(
            Severity::Info,
            "save.completed",
            &[
                ("document", &request.document_id.to_string()),
                ("version", &version.to_string()),
                ("major", if request.is_major { "true" } else { "false" }),
                ("snapshot_cut", if snapshot_cut { "true" } else { "false" }),
            ],
        );

        self.hub.publish(
            request.document_id,
            None,
            CollabMessage::DocumentSaved {
                document_id: request.document_id,
                user_name: request.author_name.clone(),
                version,
            },
        );

        Ok(SaveOutcome::Saved {
            version,
            snapshot_cut,
        })
    }

    /// Major saves always cut; minor saves cut only when no snapshot exists
    /// yet or the last one is older than the configured threshold.
    fn should_cut_snapshot(&self, request: &SaveRequest) -> bool {
        if request.is_major {
            return true;
        }
        match self.versions.last_snapshot_at(request.document_id) {
            None => true,
            Some(at) => Utc::now() - at > self.config.version_cut_threshold(),
        }
    }

    fn writer_lock(&self, document_id: Uuid) -> Arc<Mutex<()>> {
        let mut writers = match self.writers.lock() {
            Ok(w) => w,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(writers.entry(document_id).or_default())
    }

    /// Drop the document's writer entry once no save holds or awaits it, so
    /// the map does not grow with every document ever saved
    fn release_writer(&self, document_id: Uuid, writer: &Arc<Mutex<()>>) {
        let mut writers = match self.writers.lock() {
            Ok(w) => w,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Two owners left means the map entry and our handle; the map lock
        // is held, so no new clone can appear before the removal.
        if Arc::strong_count(writer) == 2 {
            writers.remove(&document_id);
        }
    }
}
