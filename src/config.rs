//! Engine configuration
//!
//! Tunables for the collaboration core: debounce and suppression windows,
//! the version-cut threshold, and reconnect bounds. All fields have serde
//! defaults so a partial config file is valid.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::server::config::ServerConfig;

/// Core engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Autosave debounce window in milliseconds (default: 5000)
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Remote-change suppression window after a local edit, in milliseconds
    /// (default: 1000)
    #[serde(default = "default_suppression_ms")]
    pub suppression_ms: u64,

    /// Minimum interval between change broadcasts from one session, in
    /// milliseconds (default: 250)
    #[serde(default = "default_broadcast_throttle_ms")]
    pub broadcast_throttle_ms: u64,

    /// Minor saves older than this cut a new version anyway, in seconds
    /// (default: 1800, i.e. 30 minutes)
    #[serde(default = "default_version_cut_secs")]
    pub version_cut_secs: u64,

    /// Maximum reconnect attempts before degrading to local-only mode
    /// (default: 3)
    #[serde(default = "default_reconnect_max_attempts")]
    pub reconnect_max_attempts: u32,

    /// Base reconnect backoff in milliseconds (default: 500)
    #[serde(default = "default_reconnect_base_backoff_ms")]
    pub reconnect_base_backoff_ms: u64,
}

fn default_debounce_ms() -> u64 {
    5_000
}

fn default_suppression_ms() -> u64 {
    1_000
}

fn default_broadcast_throttle_ms() -> u64 {
    250
}

fn default_version_cut_secs() -> u64 {
    1_800
}

fn default_reconnect_max_attempts() -> u32 {
    3
}

fn default_reconnect_base_backoff_ms() -> u64 {
    500
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            suppression_ms: default_suppression_ms(),
            broadcast_throttle_ms: default_broadcast_throttle_ms(),
            version_cut_secs: default_version_cut_secs(),
            reconnect_max_attempts: default_reconnect_max_attempts(),
            reconnect_base_backoff_ms: default_reconnect_base_backoff_ms(),
        }
    }
}

impl EngineConfig {
    /// Debounce window as a `Duration`
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Suppression window as a `Duration`
    pub fn suppression(&self) -> Duration {
        Duration::from_millis(self.suppression_ms)
    }

    /// Broadcast throttle as a `Duration`
    pub fn broadcast_throttle(&self) -> Duration {
        Duration::from_millis(self.broadcast_throttle_ms)
    }

    /// Version-cut threshold as a `chrono::Duration`
    pub fn version_cut_threshold(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.version_cut_secs as i64)
    }

    /// Base reconnect backoff as a `Duration`
    pub fn reconnect_base_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_base_backoff_ms)
    }
}

/// Top-level application config: engine tunables plus server bind settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Engine tunables
    #[serde(default)]
    pub engine: EngineConfig,

    /// HTTP/WebSocket server settings
    #[serde(default)]
    pub server: ServerConfig,
}
