use crate::{load, StreamConfig};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Watches the config file and sends the freshly parsed config on every
/// change that loads cleanly.
///
/// The parent directory is watched rather than the file itself, so editors
/// that save by rename and files created after start-up are both picked up.
/// If that directory doesn't exist yet, the nearest existing ancestor is
/// watched until it appears. A file that fails to parse is logged and
/// skipped; the previous config stays in effect.
///
/// # Example
/// ```no_run
/// # async fn demo() {
/// use rssi_config::ConfigWatcher;
/// let (_, mut rx) = ConfigWatcher::spawn("/home/user/.config/rssi-stream/config.toml");
/// while let Some(cfg) = rx.recv().await {
///     println!("tick is now {} ms", cfg.stream.tick_ms);
/// }
/// # }
/// ```
pub struct ConfigWatcher {
    path: PathBuf,
}

impl ConfigWatcher {
    /// Spawn a filesystem watcher for `path`.
    /// Returns the watcher handle and a receiver of reloaded configs.
    pub fn spawn(path: impl AsRef<Path>) -> (Self, mpsc::Receiver<StreamConfig>) {
        let (tx, rx) = mpsc::channel(1);
        let path = path.as_ref().to_path_buf();
        let watcher = Self { path: path.clone() };

        tokio::spawn(watch_loop(path, tx));

        (watcher, rx)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

async fn watch_loop(path: PathBuf, tx: mpsc::Sender<StreamConfig>) {
    use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
    use std::time::Duration;

    let (sync_tx, mut sync_rx) = mpsc::channel::<notify::Result<Event>>(16);

    let mut watcher = match RecommendedWatcher::new(
        move |res| {
            let _ = sync_tx.blocking_send(res);
        },
        Config::default().with_poll_interval(Duration::from_secs(2)),
    ) {
        Ok(w) => w,
        Err(e) => {
            error!("Failed to create filesystem watcher: {e}");
            return;
        }
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let mut watched = nearest_existing(&dir);
    if let Err(e) = watcher.watch(&watched, RecursiveMode::NonRecursive) {
        warn!("Config reload disabled; cannot watch '{}': {e}", watched.display());
        return;
    }

    info!("Watching config file: {}", path.display());

    while let Some(event) = sync_rx.recv().await {
        let event = match event {
            Ok(e) => e,
            Err(e) => {
                warn!("Watcher error: {e}");
                continue;
            }
        };

        // Walk down towards the config directory as it gets created.
        if watched != dir {
            let next = nearest_existing(&dir);
            if next != watched {
                let _ = watcher.unwatch(&watched);
                if let Err(e) = watcher.watch(&next, RecursiveMode::NonRecursive) {
                    warn!("Config reload disabled; cannot watch '{}': {e}", next.display());
                    return;
                }
                debug!("Now watching '{}'", next.display());
                watched = next;
                // The file may have been written before the new watch was in place.
                if watched == dir && path.is_file() && !send_reload(&path, &tx).await {
                    break;
                }
                continue;
            }
        }

        use notify::EventKind::*;
        if !matches!(event.kind, Modify(_) | Create(_))
            || !touches(&event.paths, &path)
            || !path.is_file()
        {
            continue;
        }
        if !send_reload(&path, &tx).await {
            break; // receiver dropped
        }
    }
}

/// Load `path` and forward it. Returns `false` once the receiver is gone.
async fn send_reload(path: &Path, tx: &mpsc::Sender<StreamConfig>) -> bool {
    match load(path) {
        Ok(cfg) => tx.send(cfg).await.is_ok(),
        Err(e) => {
            warn!("Ignoring config change: {e}");
            true
        }
    }
}

/// `dir` itself if it exists, otherwise its closest existing ancestor.
fn nearest_existing(dir: &Path) -> PathBuf {
    dir.ancestors()
        .find(|p| !p.as_os_str().is_empty() && p.is_dir())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn touches(paths: &[PathBuf], target: &Path) -> bool {
    paths
        .iter()
        .any(|p| p == target || (p.file_name().is_some() && p.file_name() == target.file_name()))
}
