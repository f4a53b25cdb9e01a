//! # Store
//!
//! Persistence seams for the collaboration core.
//!
//! The document blob and its metadata are owned by an external storage
//! collaborator; the core reaches it through the [`DocumentStore`] trait and
//! touches only the current-content field. The version log, by contrast, is
//! owned here: an append-only sequence of immutable snapshots per document.

pub mod document;
pub mod errors;
pub mod version;

pub use document::{DocumentRecord, DocumentStore, MemoryDocumentStore};
pub use errors::{StoreError, StoreResult};
pub use version::{VersionMeta, VersionSnapshot, VersionStore};
