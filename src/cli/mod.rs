//! # CLI
//!
//! Argument parsing and command dispatch for the `coedit` binary.

pub mod args;
pub mod commands;
pub mod errors;

pub use args::{Cli, Command};
pub use commands::run;
pub use errors::CliError;
