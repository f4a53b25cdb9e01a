//! # Store Errors
//!
//! Error types for the document seam and the version log.

use thiserror::Error;
use uuid::Uuid;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Store errors
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Document does not exist (for this tenant)
    #[error("Document not found: {0}")]
    DocumentNotFound(Uuid),

    /// Version does not exist for the document
    #[error("Version {version} not found for document {document_id}")]
    VersionNotFound { document_id: Uuid, version: u64 },

    /// Storage collaborator failure; the append/write did not happen
    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl StoreError {
    /// True when retrying cannot help (the entity is simply absent)
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::DocumentNotFound(_) | StoreError::VersionNotFound { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_not_found() {
        let id = Uuid::new_v4();
        assert!(StoreError::DocumentNotFound(id).is_not_found());
        assert!(StoreError::VersionNotFound {
            document_id: id,
            version: 3
        }
        .is_not_found());
        assert!(!StoreError::Persistence("disk full".into()).is_not_found());
    }
}
