//! # Reconnect State Machine
//!
//! Bounded reconnection for a dropped real-time channel: an explicit
//! `Connected -> Retrying(n) -> Offline` machine, never an unbounded loop.
//! Once `Offline`, the editor degrades to local-only mode and issues no
//! further attempts.

use std::time::Duration;

use rand::Rng;

use crate::config::EngineConfig;

/// Connection state of a collaboration channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectState {
    /// Channel is up
    Connected,
    /// Attempt `n` (1-based) is pending
    Retrying(u32),
    /// Attempt cap exhausted; local-only mode
    Offline,
}

/// Retry bounds and backoff parameters
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Maximum attempts before going offline
    pub max_attempts: u32,
    /// Backoff before attempt 1; doubles per attempt
    pub base_backoff: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(500),
        }
    }
}

impl ReconnectPolicy {
    /// Build the policy from the engine's reconnect settings
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            max_attempts: config.reconnect_max_attempts,
            base_backoff: config.reconnect_base_backoff(),
        }
    }

    /// Backoff before the given 1-based attempt: exponential plus jitter
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let base = self.base_backoff.as_millis() as u64;
        let backoff = base.saturating_mul(1u64 << exp);
        let jitter = rand::thread_rng().gen_range(0..=base / 2);
        Duration::from_millis(backoff + jitter)
    }
}

/// Bounded-retry tracker for one session's channel
#[derive(Debug)]
pub struct Reconnector {
    policy: ReconnectPolicy,
    state: ReconnectState,
}

impl Reconnector {
    /// Create a connected tracker
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            state: ReconnectState::Connected,
        }
    }

    /// Current state
    pub fn state(&self) -> ReconnectState {
        self.state
    }

    /// True once the attempt cap is exhausted
    pub fn is_offline(&self) -> bool {
        self.state == ReconnectState::Offline
    }

    /// Record a connection failure
    ///
    /// Returns the backoff to wait before the next attempt, or `None` when
    /// the cap is exhausted and the session must degrade to local-only mode.
    pub fn on_failure(&mut self) -> Option<Duration> {
        let next_attempt = match self.state {
            ReconnectState::Connected => 1,
            ReconnectState::Retrying(n) => n + 1,
            ReconnectState::Offline => return None,
        };

        if next_attempt > self.policy.max_attempts {
            self.state = ReconnectState::Offline;
            return None;
        }

        self.state = ReconnectState::Retrying(next_attempt);
        Some(self.policy.backoff_for(next_attempt))
    }

    /// Record a successful (re)connection
    ///
    /// Offline is terminal; a session that degraded stays local-only.
    pub fn on_success(&mut self) {
        if self.state != ReconnectState::Offline {
            self.state = ReconnectState::Connected;
        }
    }
}
