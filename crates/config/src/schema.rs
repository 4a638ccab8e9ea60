use rssi_core::{RssiError, Result, DEFAULT_CAPACITY, DEFAULT_FLOOR};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration structure parsed from `config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StreamConfig {
    /// HTTP listener settings.
    pub server: ServerConfig,
    /// Sliding window shape.
    pub window: WindowConfig,
    /// Viewer stream cadence.
    pub stream: StreamSettings,
    /// Where samples come from.
    pub source: SourceConfig,
}

impl StreamConfig {
    /// Reject values the window and the tick loops can't work with.
    pub fn validate(&self) -> Result<()> {
        if self.window.capacity == 0 {
            return Err(RssiError::Config("window.capacity must be at least 1".into()));
        }
        if !self.window.floor.is_finite() {
            return Err(RssiError::Config("window.floor must be a finite number".into()));
        }
        if self.stream.tick_ms == 0 {
            return Err(RssiError::Config("stream.tick_ms must be at least 1".into()));
        }
        if self.source.period_ms == 0 {
            return Err(RssiError::Config("source.period_ms must be at least 1".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to listen on, e.g. `"0.0.0.0:5000"`.
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5000".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Number of samples every viewer sees.
    pub capacity: usize,
    /// Lowest stored value (dBm); also the initial fill.
    pub floor: f32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            floor: DEFAULT_FLOOR,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSettings {
    /// Interval between two events on every viewer stream (milliseconds).
    pub tick_ms: u64,
}

impl StreamSettings {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self { tick_ms: 100 }
    }
}

/// Which kind of sample source to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Newline-delimited readings from a TCP bridge to the radio driver.
    Tcp,
    /// Synthetic signal, for running without hardware.
    #[default]
    Simulated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,
    /// Address of the TCP bridge (`kind = "tcp"`).
    pub address: String,
    /// Name of the logged variable to accept in `name=value` lines.
    pub variable: String,
    /// Delay before reconnecting after the link drops (seconds).
    pub reconnect_secs: u64,
    /// Sample period of the simulated source (milliseconds).
    pub period_ms: u64,
    /// Radio link the bridge is expected to open; informational.
    pub uri: String,
}

impl SourceConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_secs)
    }

    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms.max(1))
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::default(),
            address: "127.0.0.1:7777".to_string(),
            variable: "radio.rssi".to_string(),
            reconnect_secs: 2,
            period_ms: 100,
            uri: "radio://0/80/2M/E7E7E7E7F2".to_string(),
        }
    }
}
