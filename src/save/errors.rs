//! # Save Errors
//!
//! Error types for the save pipeline and autosave scheduler.

use thiserror::Error;
use uuid::Uuid;

use crate::store::StoreError;

/// Result type for save operations
pub type SaveResult<T> = Result<T, SaveError>;

/// Save errors
#[derive(Debug, Clone, Error)]
pub enum SaveError {
    /// Document does not exist
    #[error("Document not found: {0}")]
    NotFound(Uuid),

    /// Storage collaborator failure; not retried by the pipeline
    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl From<StoreError> for SaveError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DocumentNotFound(id) => SaveError::NotFound(id),
            StoreError::VersionNotFound { document_id, .. } => SaveError::NotFound(document_id),
            StoreError::Persistence(msg) => SaveError::Persistence(msg),
        }
    }
}
