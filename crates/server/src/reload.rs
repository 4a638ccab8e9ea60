use rssi_config::StreamConfig;
use rssi_publisher::StreamPublisher;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Sections whose changes only take effect after a restart.
pub fn restart_required(old: &StreamConfig, new: &StreamConfig) -> Vec<&'static str> {
    let mut sections = Vec::new();
    if old.server != new.server {
        sections.push("server");
    }
    if old.window != new.window {
        sections.push("window");
    }
    if old.source != new.source {
        sections.push("source");
    }
    sections
}

/// Apply reloaded configs until the watcher goes away.
///
/// Only the stream tick is live-reloadable; everything else is logged.
pub async fn apply_reloads(
    mut rx: mpsc::Receiver<StreamConfig>,
    mut current: StreamConfig,
    publisher: Arc<StreamPublisher>,
) {
    while let Some(next) = rx.recv().await {
        if next == current {
            continue;
        }
        info!("Config reloaded");
        publisher.set_tick(next.stream.tick());

        let stale = restart_required(&current, &next);
        if !stale.is_empty() {
            warn!(
                "Changes to [{}] take effect after a restart",
                stale.join("], [")
            );
        }
        current = next;
    }
}
