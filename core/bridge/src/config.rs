//! Bridge configuration, read from `~/.config/doc-tracker/bridge.toml`.
//!
//! A missing file is not an error: every key has a default.

use doc_tracker_protocol::DEFAULT_EVENT_PREFIX;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::BridgeError;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// Namespace the host puts in front of raw event names.
    pub event_prefix: String,
    pub log_level: String,
    /// Log to this file instead of stderr.
    pub log_file: Option<PathBuf>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            event_prefix: DEFAULT_EVENT_PREFIX.to_string(),
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

pub fn default_config_path() -> Result<PathBuf, BridgeError> {
    let home = dirs::home_dir().ok_or(BridgeError::HomeDirNotFound)?;
    Ok(home.join(".config").join("doc-tracker").join("bridge.toml"))
}

pub fn load_config(path: Option<PathBuf>) -> Result<BridgeConfig, BridgeError> {
    let config_path = match path {
        Some(path) => path,
        None => default_config_path()?,
    };

    if !config_path.exists() {
        return Ok(BridgeConfig::default());
    }

    read_config(&config_path)
}

fn read_config(path: &Path) -> Result<BridgeConfig, BridgeError> {
    let content = fs_err::read_to_string(path).map_err(|source| BridgeError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str::<BridgeConfig>(&content).map_err(|source| BridgeError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}
