//! # Server
//!
//! The two network surfaces of the engine:
//!
//! - an HTTP API for saves and version history ([`routes`])
//! - a WebSocket channel for live collaboration ([`websocket`])
//!
//! Both sit over the same shared collaborators; assembly lives in
//! [`CollabServer`].

pub mod config;
pub mod routes;
pub mod websocket;

pub use config::ServerConfig;
pub use routes::{document_routes, ApiState};
pub use websocket::{ClientMessage, CollabSocketServer, ServerMessage};

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::collab::{BroadcastHub, PresenceRegistry, SessionDeps};
use crate::config::AppConfig;
use crate::observability::{Logger, Severity};
use crate::save::{AutosaveScheduler, SavePipeline};
use crate::store::{DocumentStore, VersionStore};

/// Fully-wired engine: stores, pipeline, scheduler, and both servers
pub struct CollabServer {
    config: AppConfig,
    deps: SessionDeps,
    api_state: Arc<ApiState>,
}

impl CollabServer {
    /// Wire the engine over a document store
    pub fn new(config: AppConfig, documents: Arc<dyn DocumentStore>) -> Self {
        let versions = Arc::new(VersionStore::new());
        let hub = Arc::new(BroadcastHub::new());
        let presence = Arc::new(PresenceRegistry::new());

        let pipeline = Arc::new(SavePipeline::new(
            documents.clone(),
            versions.clone(),
            hub.clone(),
            config.engine.clone(),
        ));
        let autosave = Arc::new(AutosaveScheduler::new(
            pipeline.clone(),
            config.engine.debounce(),
        ));

        let deps = SessionDeps {
            documents,
            presence,
            hub,
            autosave,
        };
        let api_state = Arc::new(ApiState::new(pipeline, versions));

        Self {
            config,
            deps,
            api_state,
        }
    }

    /// Shared collaborators, for tests and embedding
    pub fn deps(&self) -> &SessionDeps {
        &self.deps
    }

    /// Build the HTTP router with CORS applied
    pub fn router(&self) -> Router {
        let cors = if self.config.server.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = self
                .config
                .server
                .cors_origins
                .iter()
                .filter_map(|s| s.parse().ok())
                .collect();

            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        document_routes(self.api_state.clone()).layer(cors)
    }

    /// Run the HTTP API and WebSocket channel until either exits
    pub async fn run(self) -> Result<(), std::io::Error> {
        let http_addr: SocketAddr = self
            .config
            .server
            .http_addr()
            .parse()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

        let router = self.router();

        Logger::log(
            Severity::Info,
            "http.listening",
            &[("addr", &http_addr.to_string())],
        );

        let ws_server = CollabSocketServer::new(
            self.config.server.clone(),
            self.config.engine.clone(),
            self.deps.clone(),
        );

        let listener = TcpListener::bind(http_addr).await?;
        let http = axum::serve(listener, router);

        tokio::select! {
            result = http => result,
            result = ws_server.run() => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryDocumentStore;

    #[test]
    fn test_wiring() {
        let documents = Arc::new(MemoryDocumentStore::new());
        let server = CollabServer::new(AppConfig::default(), documents);
        let _router = server.router();
        assert_eq!(server.deps().presence.count(uuid::Uuid::new_v4()), 0);
    }
}
