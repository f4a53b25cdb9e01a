//! CLI argument definitions using clap
//!
//! Commands:
//! - coedit serve --config <path>
//! - coedit check-config --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// coedit - collaborative document editing and versioning engine
#[derive(Parser, Debug)]
#[command(name = "coedit")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the collaboration server (HTTP API + WebSocket channel)
    Serve {
        /// Path to configuration file
        #[arg(long, default_value = "./coedit.json")]
        config: PathBuf,
    },

    /// Validate a configuration file and print the effective settings
    CheckConfig {
        /// Path to configuration file
        #[arg(long, default_value = "./coedit.json")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
