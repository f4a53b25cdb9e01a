//! coedit - collaborative document editing and versioning engine
//!
//! The core of a multi-user document editor: presence tracking, change
//! broadcast between open sessions, debounced autosave, and an append-only
//! version history. Format conversion, authentication, and durable blob
//! storage are external collaborators reached through the seams in `store`.

pub mod cli;
pub mod collab;
pub mod config;
pub mod observability;
pub mod save;
pub mod server;
pub mod store;
