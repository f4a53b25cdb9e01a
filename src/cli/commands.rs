//! CLI command dispatch
//!
//! Loads configuration, builds the engine, and runs the servers. A missing
//! config file is not an error; defaults apply.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use super::args::{Cli, Command};
use super::errors::CliError;
use crate::config::AppConfig;
use crate::observability::{Logger, Severity};
use crate::server::CollabServer;
use crate::store::MemoryDocumentStore;

/// Parse arguments and execute the selected command
pub fn run() -> Result<(), CliError> {
    let cli = Cli::parse_args();

    match cli.command {
        Command::Serve { config } => serve(&config),
        Command::CheckConfig { config } => check_config(&config),
    }
}

/// Load config from a JSON file; defaults when the file does not exist
fn load_config(path: &Path) -> Result<AppConfig, CliError> {
    if !path.exists() {
        Logger::log(
            Severity::Info,
            "config.defaults",
            &[("path", &path.display().to_string())],
        );
        return Ok(AppConfig::default());
    }

    let text = fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|e| CliError::Config(e.to_string()))
}

fn serve(path: &Path) -> Result<(), CliError> {
    let config = load_config(path)?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let documents = Arc::new(MemoryDocumentStore::new());
        CollabServer::new(config, documents).run().await
    })?;

    Ok(())
}

fn check_config(path: &Path) -> Result<(), CliError> {
    let config = load_config(path)?;

    Logger::log(
        Severity::Info,
        "config.effective",
        &[
            ("debounce_ms", &config.engine.debounce_ms.to_string()),
            ("http_addr", &config.server.http_addr()),
            ("ws_addr", &config.server.ws_addr()),
            (
                "version_cut_secs",
                &config.engine.version_cut_secs.to_string(),
            ),
        ],
    );

    Ok(())
}
