//! Document HTTP Routes
//!
//! Request/response endpoints around the save pipeline and version store:
//! saving a snapshot, listing version metadata, fetching one version's
//! content.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::save::{ContentStats, SaveError, SaveOutcome, SavePipeline, SaveRequest};
use crate::store::{StoreError, VersionMeta, VersionSnapshot, VersionStore};

// ==================
// Shared State
// ==================

/// State shared across document handlers
pub struct ApiState {
    /// The single writer for saves
    pub pipeline: Arc<SavePipeline>,

    /// Version history reads
    pub versions: Arc<VersionStore>,
}

impl ApiState {
    /// Bundle pipeline and version store
    pub fn new(pipeline: Arc<SavePipeline>, versions: Arc<VersionStore>) -> Self {
        Self { pipeline, versions }
    }
}

// ==================
// Request/Response Types
// ==================

#[derive(Debug, Deserialize)]
pub struct SaveDocumentRequest {
    pub content: String,
    pub user_id: Uuid,
    pub user_name: String,
    #[serde(default)]
    pub is_major: bool,
    #[serde(default)]
    pub stats: Value,
}

#[derive(Debug, Serialize)]
pub struct SaveDocumentResponse {
    pub success: bool,
    pub version_number: u64,
    pub snapshot_cut: bool,
    pub unchanged: bool,
}

#[derive(Debug, Serialize)]
pub struct VersionListResponse {
    pub versions: Vec<VersionMeta>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    fn new(error: String) -> Self {
        Self {
            success: false,
            error,
        }
    }
}

// ==================
// Router
// ==================

/// Build the document router
pub fn document_routes(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/documents/:id/save", post(save_document))
        .route("/documents/:id/versions", get(list_versions))
        .route("/documents/:id/versions/:number", get(get_version))
        .with_state(state)
}

// ==================
// Handlers
// ==================

async fn save_document(
    State(state): State<Arc<ApiState>>,
    Path(document_id): Path<Uuid>,
    Json(body): Json<SaveDocumentRequest>,
) -> impl IntoResponse {
    let request = SaveRequest {
        document_id,
        stats: ContentStats::from_content(&body.content, body.stats),
        content: body.content,
        author_id: body.user_id,
        author_name: body.user_name,
        is_major: body.is_major,
    };

    match state.pipeline.save(request).await {
        Ok(outcome) => {
            let unchanged = matches!(outcome, SaveOutcome::Unchanged { .. });
            let snapshot_cut = matches!(outcome, SaveOutcome::Saved { snapshot_cut: true, .. });
            (
                StatusCode::OK,
                Json(SaveDocumentResponse {
                    success: true,
                    version_number: outcome.version(),
                    snapshot_cut,
                    unchanged,
                }),
            )
                .into_response()
        }
        Err(SaveError::NotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("document not found".to_string())),
        )
            .into_response(),
        Err(SaveError::Persistence(msg)) => (
            StatusCode::BAD_GATEWAY,
            Json(ErrorResponse::new(msg)),
        )
            .into_response(),
    }
}

async fn list_versions(
    State(state): State<Arc<ApiState>>,
    Path(document_id): Path<Uuid>,
) -> Json<VersionListResponse> {
    let versions = state.versions.list(document_id);
    let total = versions.len();
    Json(VersionListResponse { versions, total })
}

async fn get_version(
    State(state): State<Arc<ApiState>>,
    Path((document_id, number)): Path<(Uuid, u64)>,
) -> Result<Json<VersionSnapshot>, (StatusCode, Json<ErrorResponse>)> {
    match state.versions.get(document_id, number) {
        Ok(snapshot) => Ok(Json(snapshot)),
        Err(StoreError::VersionNotFound { .. }) | Err(StoreError::DocumentNotFound(_)) => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("version not found".to_string())),
        )),
        Err(StoreError::Persistence(msg)) => {
            Err((StatusCode::BAD_GATEWAY, Json(ErrorResponse::new(msg))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_request_defaults() {
        let json = r#"{
            "content": "v1",
            "user_id": "6a0f0cde-8b4e-4b7e-9b2e-0f6a3c1d2e3f",
            "user_name": "ada"
        }"#;
        let request: SaveDocumentRequest = serde_json::from_str(json).unwrap();
        assert!(!request.is_major);
        assert!(request.stats.is_null());
    }

    #[test]
    fn test_error_response_shape() {
        let response = ErrorResponse::new("boom".to_string());
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"success\":false"));
        assert!(json.contains("boom"));
    }
}
