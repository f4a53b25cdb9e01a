//! # Observability
//!
//! Structured logging for the collaboration engine.
//!
//! - Structured logs (JSON)
//! - Deterministic key ordering
//! - One log line = one event
//! - Synchronous, no buffering

pub mod logger;

pub use logger::{Logger, Severity};
