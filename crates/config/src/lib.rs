pub mod schema;
pub mod watcher;

pub use schema::{
    ServerConfig, SourceConfig, SourceKind, StreamConfig, StreamSettings, WindowConfig,
};
pub use watcher::ConfigWatcher;

use rssi_core::{Result, RssiError};
use std::path::{Path, PathBuf};

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV: &str = "RSSI_STREAM_CONFIG";

/// Load configuration from a TOML file.  Returns `StreamConfig::default()` if
/// the file doesn't exist so the server always has sensible defaults.
pub fn load(path: impl AsRef<Path>) -> Result<StreamConfig> {
    let path = path.as_ref();
    if !path.exists() {
        tracing::warn!(
            "Config file not found at '{}'; using defaults.",
            path.display()
        );
        return Ok(StreamConfig::default());
    }

    let raw = std::fs::read_to_string(path)
        .map_err(|e| RssiError::Config(format!("cannot read '{}': {e}", path.display())))?;

    let config: StreamConfig =
        toml::from_str(&raw).map_err(|e| RssiError::Config(format!("TOML parse error: {e}")))?;
    config.validate()?;
    Ok(config)
}

/// Return the config path: `$RSSI_STREAM_CONFIG` if set, otherwise
/// `rssi-stream/config.toml` under `$XDG_CONFIG_HOME`.
pub fn default_path() -> PathBuf {
    if let Ok(explicit) = std::env::var(CONFIG_ENV) {
        return PathBuf::from(explicit);
    }
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("rssi-stream").join("config.toml")
}
