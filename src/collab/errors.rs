//! # Collaboration Errors
//!
//! Error taxonomy for session open, edit, and close paths.

use thiserror::Error;
use uuid::Uuid;

use crate::store::StoreError;

/// Result type for collaboration operations
pub type CollabResult<T> = Result<T, CollabError>;

/// Collaboration errors
#[derive(Debug, Clone, Error)]
pub enum CollabError {
    /// Document does not exist for the caller's tenant
    #[error("Document not found: {0}")]
    NotFound(Uuid),

    /// Identity lacks the required capability
    #[error("Forbidden: {0}")]
    Forbidden(&'static str),

    /// Storage collaborator failure during a flush/save
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Real-time channel dropped
    #[error("Connection lost")]
    ConnectionLost,

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<crate::save::SaveError> for CollabError {
    fn from(err: crate::save::SaveError) -> Self {
        match err {
            crate::save::SaveError::NotFound(id) => CollabError::NotFound(id),
            crate::save::SaveError::Persistence(msg) => CollabError::Persistence(msg),
        }
    }
}

impl From<StoreError> for CollabError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DocumentNotFound(id) => CollabError::NotFound(id),
            StoreError::VersionNotFound { document_id, .. } => CollabError::NotFound(document_id),
            StoreError::Persistence(msg) => CollabError::Persistence(msg),
        }
    }
}
