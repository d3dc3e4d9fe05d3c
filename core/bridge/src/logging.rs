//! Log setup. Stdout carries the bridge protocol, so logs go to stderr or to
//! the configured file.

use std::env;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::BridgeConfig;

const DEBUG_ENV: &str = "DOC_TRACKER_DEBUG_LOG";

/// Installs the global subscriber. Keep the guard alive until exit so the
/// file writer flushes.
pub fn init(config: &BridgeConfig) -> Option<WorkerGuard> {
    let debug_enabled = env::var(DEBUG_ENV)
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    let filter = if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
    };

    let log_file = config.log_file.as_ref().and_then(|path| {
        let file_name = path.file_name()?.to_owned();
        let dir = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(|parent| parent.to_path_buf())
            .unwrap_or_else(|| ".".into());
        fs_err::create_dir_all(&dir).ok()?;
        Some((dir, file_name))
    });

    match log_file {
        Some((dir, file_name)) => {
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(writer)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            None
        }
    }
}
