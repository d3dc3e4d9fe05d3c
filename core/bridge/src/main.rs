//! doc-tracker-bridge: hosts one document tracker over stdio.
//!
//! The host's scripting side spawns this process, writes raw notifications
//! and snapshot answers to its stdin (one JSON object per line), and reads
//! snapshot requests and lifecycle events from its stdout.

mod bridge;
mod config;
mod error;
mod host;
mod logging;

use clap::Parser;
use std::io;
use std::path::PathBuf;
use tracing::{error, info, warn};

use bridge::RunOutcome;
use config::BridgeConfig;

#[derive(Parser)]
#[command(name = "doc-tracker-bridge")]
#[command(about = "Document lifecycle tracker over a JSON-lines stdio bridge")]
#[command(version)]
struct Cli {
    /// Path to the bridge config (default: ~/.config/doc-tracker/bridge.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Namespace prefix of raw host event names (overrides the config file)
    #[arg(long, value_name = "PREFIX")]
    event_prefix: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let (mut config, config_error) = match config::load_config(cli.config) {
        Ok(config) => (config, None),
        Err(err) => (BridgeConfig::default(), Some(err)),
    };
    if let Some(prefix) = cli.event_prefix {
        config.event_prefix = prefix;
    }

    let logging_guard = logging::init(&config);
    if let Some(err) = config_error {
        warn!(error = %err, "Failed to load bridge config; using defaults");
    }
    info!(event_prefix = %config.event_prefix, "Document tracker bridge started");

    let stdin = io::stdin();
    let stdout = io::stdout();
    let exit_code = match bridge::run(stdin.lock(), stdout.lock(), &config) {
        Ok(RunOutcome::EndOfInput) => 0,
        Ok(RunOutcome::Shutdown) => {
            error!("Shutting down after failed tracker initialization");
            1
        }
        Err(err) => {
            error!(error = %err, "Bridge stopped");
            1
        }
    };

    drop(logging_guard);
    std::process::exit(exit_code);
}
