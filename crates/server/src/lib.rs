//! HTTP front end for `rssi-stream`.
//!
//! Wires together all background tasks:
//! - sample source (TCP bridge or simulated signal) feeding the window
//! - per-viewer stream tasks behind `/stream`
//! - config file watcher (live tick changes)

pub mod reload;
pub mod routes;

pub use routes::{router, AppState, StatusResponse};

use chrono::Utc;
use rssi_config::{default_path, load as load_config, ConfigWatcher, SourceKind, StreamConfig};
use rssi_core::{Result, RssiError, SlidingWindowBuffer};
use rssi_publisher::StreamPublisher;
use rssi_source::{spawn_source, window_handler, SimulatedSource, TcpLineSource};
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

// ── Entry point ───────────────────────────────────────────────────────────────

/// Load the config, start everything and serve until Ctrl+C.
pub async fn run() -> Result<()> {
    let path = default_path();
    let config = load_config(&path)?;

    Server::start(config)
        .await?
        .watch_config(path)
        .run_until(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Ctrl+C received; shutting down"),
        Err(e) => warn!("Cannot listen for Ctrl+C ({e}); running until killed"),
    }
}

// ── Server ────────────────────────────────────────────────────────────────────

/// A bound listener plus its running sample source.
pub struct Server {
    listener: TcpListener,
    state: Arc<AppState>,
    config: StreamConfig,
    config_path: Option<PathBuf>,
    cancel: CancellationToken,
    source_task: JoinHandle<()>,
}

impl Server {
    /// Create the window, start the sample source and bind the listener.
    pub async fn start(config: StreamConfig) -> Result<Self> {
        config.validate()?;

        let cancel = CancellationToken::new();
        let buffer = Arc::new(SlidingWindowBuffer::new(
            config.window.capacity,
            config.window.floor,
        ));
        let handler = window_handler(Arc::clone(&buffer));

        let src = &config.source;
        let (source_task, source) = match src.kind {
            SourceKind::Tcp => {
                info!("Bridge expected to relay {} from {}", src.variable, src.uri);
                let source =
                    TcpLineSource::new(&src.address, &src.variable, src.reconnect_delay());
                spawn_source(source, handler, cancel.clone())
            }
            SourceKind::Simulated => {
                spawn_source(SimulatedSource::new(src.period()), handler, cancel.clone())
            }
        };

        let publisher = Arc::new(StreamPublisher::new(
            buffer,
            config.stream.tick(),
            cancel.child_token(),
        ));

        let listener = match TcpListener::bind(&config.server.bind).await {
            Ok(l) => l,
            Err(e) => {
                cancel.cancel();
                return Err(RssiError::Server(format!(
                    "cannot bind '{}': {e}",
                    config.server.bind
                )));
            }
        };

        let state = Arc::new(AppState {
            publisher,
            source,
            started_at: Utc::now(),
        });

        Ok(Self {
            listener,
            state,
            config,
            config_path: None,
            cancel,
            source_task,
        })
    }

    /// Reload `path` on change and apply the new tick to running viewers.
    pub fn watch_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Serve until `shutdown` resolves, then stop viewers and the source.
    pub async fn run_until(self, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
        let Self {
            listener,
            state,
            config,
            config_path,
            cancel,
            source_task,
        } = self;

        if let Some(path) = config_path {
            let (_watcher, rx) = ConfigWatcher::spawn(path);
            tokio::spawn(reload::apply_reloads(rx, config, Arc::clone(&state.publisher)));
        }

        let addr = listener.local_addr()?;
        info!("Listening on http://{addr}");
        info!("  Stream:  http://{addr}/stream");
        info!("  Status:  http://{addr}/status");

        // Open event streams never finish on their own, so the viewers are
        // cancelled as soon as shutdown starts to let the server drain.
        let stop = cancel.clone();
        let served = axum::serve(listener, router(state))
            .with_graceful_shutdown(async move {
                shutdown.await;
                stop.cancel();
            })
            .await;

        cancel.cancel();
        if let Err(e) = source_task.await {
            warn!("Sample source task failed: {e}");
        }

        served.map_err(|e| RssiError::Server(format!("serve: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rssi_config::{ServerConfig, SourceConfig, StreamSettings, WindowConfig};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;

    /// Config with a source that never connects, so only the test pushes.
    async fn quiet_config(capacity: usize, floor: f32, tick_ms: u64) -> StreamConfig {
        let dead = {
            let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
            l.local_addr().unwrap().to_string()
        };
        StreamConfig {
            server: ServerConfig {
                bind: "127.0.0.1:0".into(),
            },
            window: WindowConfig { capacity, floor },
            stream: StreamSettings { tick_ms },
            source: SourceConfig {
                kind: SourceKind::Tcp,
                address: dead,
                reconnect_secs: 60,
                ..SourceConfig::default()
            },
        }
    }

    struct Running {
        addr: SocketAddr,
        state: Arc<AppState>,
        stop: oneshot::Sender<()>,
        task: JoinHandle<Result<()>>,
    }

    async fn spawn_server(config: StreamConfig) -> Running {
        let server = Server::start(config).await.unwrap();
        let addr = server.local_addr().unwrap();
        let state = Arc::clone(server.state());
        let (stop, stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(server.run_until(async move {
            let _ = stopped.await;
        }));
        Running {
            addr,
            state,
            stop,
            task,
        }
    }

    async fn send_get(addr: SocketAddr, path: &str) -> TcpStream {
        let mut conn = TcpStream::connect(addr).await.unwrap();
        let req = format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
        conn.write_all(req.as_bytes()).await.unwrap();
        conn
    }

    async fn get(addr: SocketAddr, path: &str) -> String {
        let mut conn = send_get(addr, path).await;
        let mut raw = Vec::new();
        tokio::time::timeout(Duration::from_secs(5), conn.read_to_end(&mut raw))
            .await
            .unwrap()
            .unwrap();
        String::from_utf8(raw).unwrap()
    }

    /// Read from `conn` until `needle` shows up, returning everything read.
    async fn read_until(conn: &mut TcpStream, needle: &str) -> String {
        let mut seen = String::new();
        let mut chunk = [0u8; 4096];
        tokio::time::timeout(Duration::from_secs(5), async {
            while !seen.contains(needle) {
                let n = conn.read(&mut chunk).await.unwrap();
                assert!(n > 0, "connection closed before {needle:?}; got {seen:?}");
                seen.push_str(&String::from_utf8_lossy(&chunk[..n]));
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {needle:?}; got {seen:?}"));
        seen
    }

    async fn wait_for_viewers(state: &AppState, want: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while state.publisher.viewer_count() != want {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("viewer count never reached {want}"));
    }

    #[tokio::test]
    async fn stream_emits_window_as_event_stream() {
        let srv = spawn_server(quiet_config(4, -10.0, 20).await).await;
        for v in [5.0, -20.0, 3.0, 8.0, -5.0] {
            srv.state.publisher.buffer().push(v);
        }

        let mut conn = send_get(srv.addr, "/stream").await;
        let seen = read_until(&mut conn, "data: [-10, 3, 8, -5]\n\n").await;
        let head = seen.to_ascii_lowercase();
        assert!(head.starts_with("http/1.1 200"));
        assert!(head.contains("content-type: text/event-stream"));

        // Later pushes show up on a later tick of the same connection.
        srv.state.publisher.buffer().push(-1.0);
        read_until(&mut conn, "data: [3, 8, -5, -1]\n\n").await;

        drop(conn);
        let _ = srv.stop.send(());
        srv.task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn closing_a_viewer_leaves_others_streaming() {
        let srv = spawn_server(quiet_config(3, -140.0, 20).await).await;

        let mut stays = send_get(srv.addr, "/stream").await;
        let mut leaves = send_get(srv.addr, "/stream").await;
        read_until(&mut stays, "data: [-140, -140, -140]\n\n").await;
        read_until(&mut leaves, "data: [-140, -140, -140]\n\n").await;
        wait_for_viewers(&srv.state, 2).await;

        drop(leaves);
        wait_for_viewers(&srv.state, 1).await;

        srv.state.publisher.buffer().push(-77.0);
        read_until(&mut stays, "data: [-140, -140, -77]\n\n").await;

        let _ = srv.stop.send(());
        srv.task.await.unwrap().unwrap();
        assert_eq!(srv.state.publisher.viewer_count(), 0);
    }

    #[tokio::test]
    async fn shutdown_closes_open_streams() {
        let srv = spawn_server(quiet_config(2, -140.0, 20).await).await;
        let mut conn = send_get(srv.addr, "/stream").await;
        read_until(&mut conn, "data: ").await;

        let _ = srv.stop.send(());
        tokio::time::timeout(Duration::from_secs(5), srv.task)
            .await
            .expect("server did not drain")
            .unwrap()
            .unwrap();

        let mut rest = Vec::new();
        let _ = tokio::time::timeout(Duration::from_secs(5), conn.read_to_end(&mut rest)).await;
    }

    #[tokio::test]
    async fn index_health_and_status() {
        let srv = spawn_server(quiet_config(8, -120.0, 50).await).await;
        srv.state.publisher.buffer().push(-64.0);

        let index = get(srv.addr, "/").await;
        assert!(index.to_ascii_lowercase().contains("content-type: text/html"));
        assert!(index.contains("new EventSource(\"/stream\")"));

        let health = get(srv.addr, "/health").await;
        assert!(health.contains("\"status\":\"ok\""));

        let status = get(srv.addr, "/status").await;
        let body = status.split("\r\n\r\n").nth(1).unwrap();
        let json: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(json["capacity"], 8);
        assert_eq!(json["floor"], -120.0);
        assert_eq!(json["tick_ms"], 50);
        assert_eq!(json["pushes"], 1);
        assert_eq!(json["latest"], -64.0);
        assert_eq!(json["viewers"], 0);
        assert!(json["source"]["state"].is_string());

        let _ = srv.stop.send(());
        srv.task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn bind_failure_is_server_error() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut config = quiet_config(4, -140.0, 100).await;
        config.server.bind = taken.local_addr().unwrap().to_string();

        assert!(matches!(
            Server::start(config).await,
            Err(RssiError::Server(_))
        ));
    }
}
