use axum::{
    extract::State,
    response::{
        sse::{Event, Sse},
        Html, IntoResponse,
    },
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use rssi_core::SourceStatus;
use rssi_publisher::{event_data, StreamPublisher};
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::watch;

const INDEX_HTML: &str = include_str!("../static/index.html");

/// Shared state handed to every request handler.
pub struct AppState {
    pub publisher: Arc<StreamPublisher>,
    pub source: watch::Receiver<SourceStatus>,
    pub started_at: DateTime<Utc>,
}

/// One-shot JSON status for `/status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    /// Samples per window.
    pub capacity: usize,
    /// Clamp floor (dBm).
    pub floor: f32,
    pub tick_ms: u64,
    /// Viewers currently streaming.
    pub viewers: usize,
    /// Samples received since start-up.
    pub pushes: u64,
    /// Newest value in the window.
    pub latest: f32,
    pub source: SourceStatus,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn status(&self) -> StatusResponse {
        let buffer = self.publisher.buffer();
        let (pushes, latest) = buffer.progress();
        StatusResponse {
            capacity: buffer.capacity(),
            floor: buffer.floor(),
            tick_ms: self.publisher.tick().as_millis() as u64,
            viewers: self.publisher.viewer_count(),
            pushes,
            latest,
            source: self.source.borrow().clone(),
            started_at: self.started_at,
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/stream", get(stream_handler))
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .with_state(state)
}

/// Static page that opens `/stream` and plots the window.
async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Server-Sent Events: one `data: [v0, ..., vN-1]` event per tick.
///
/// The stream lives as long as the HTTP response; when the client goes away
/// the response body is dropped and the viewer's tick task ends with it.
async fn stream_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let viewer = state.publisher.subscribe();
    Sse::new(viewer.map(|snapshot| Ok(Event::default().data(event_data(&snapshot)))))
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "rssi-stream",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(state.status())
}
