//! # Save
//!
//! The write path for a document: every mutation of current content and
//! every version cut flows through the [`SavePipeline`], which serializes
//! saves per document. The [`AutosaveScheduler`] sits in front of it,
//! coalescing rapid edits into debounced saves and bounding the backlog.

pub mod autosave;
pub mod errors;
pub mod pipeline;
pub mod stats;

pub use autosave::AutosaveScheduler;
pub use errors::{SaveError, SaveResult};
pub use pipeline::{SaveOutcome, SavePipeline, SaveRequest};
pub use stats::ContentStats;
