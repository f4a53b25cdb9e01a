//! # Content Stats
//!
//! Word/char counts recorded alongside each version snapshot, plus an
//! opaque diagnostic payload supplied by the client.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Diagnostic stats attached to a save
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentStats {
    /// Whitespace-separated word count
    pub word_count: usize,

    /// Character count (chars, not bytes)
    pub char_count: usize,

    /// Arbitrary client-supplied payload
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub extra: Value,
}

impl ContentStats {
    /// Compute counts from content, carrying an extra payload
    pub fn from_content(content: &str, extra: Value) -> Self {
        Self {
            word_count: content.split_whitespace().count(),
            char_count: content.chars().count(),
            extra,
        }
    }

    /// Serialize for the version log's opaque stats field
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
