//! Server configuration
//!
//! Bind settings for the HTTP API and the real-time WebSocket channel.

use serde::{Deserialize, Serialize};

/// HTTP + WebSocket server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to (default: "0.0.0.0")
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP API port (default: 8600)
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// WebSocket port for the real-time channel (default: 8601)
    #[serde(default = "default_ws_port")]
    pub ws_port: u16,

    /// CORS allowed origins; empty means permissive (development)
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Heartbeat interval on the real-time channel, in seconds (default: 30)
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8600
}

fn default_ws_port() -> u16 {
    8601
}

fn default_heartbeat_secs() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
            ws_port: default_ws_port(),
            cors_origins: Vec::new(),
            heartbeat_secs: default_heartbeat_secs(),
        }
    }
}

impl ServerConfig {
    /// HTTP bind address string
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.host, self.http_port)
    }

    /// WebSocket bind address string
    pub fn ws_addr(&self) -> String {
        format!("{}:{}", self.host, self.ws_port)
    }
}
