//! Sample producers for the RSSI window.
//!
//! A [`SampleSource`] owns the link to the telemetry hardware (or a stand-in)
//! and calls a [`SampleHandler`] once per reading. The handler is the only
//! way samples enter the core; it is cheap, synchronous, and safe to call
//! from any thread.

pub mod parse;
pub mod simulated;
pub mod tcp;

pub use parse::parse_sample;
pub use simulated::SimulatedSource;
pub use tcp::TcpLineSource;

use rssi_core::{SlidingWindowBuffer, SourceState, SourceStatus};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Callback invoked with every new reading.
pub type SampleHandler = Arc<dyn Fn(f32) + Send + Sync>;

/// Build the handler that feeds readings into `buffer`.
pub fn window_handler(buffer: Arc<SlidingWindowBuffer>) -> SampleHandler {
    Arc::new(move |value| buffer.push(value))
}

/// Publishes link state changes to whoever holds the matching receiver.
#[derive(Debug, Clone)]
pub struct StatusReporter {
    tx: watch::Sender<SourceStatus>,
}

impl StatusReporter {
    pub fn channel() -> (Self, watch::Receiver<SourceStatus>) {
        let (tx, rx) = watch::channel(SourceStatus::default());
        (Self { tx }, rx)
    }

    /// Record `state`, keeping the original timestamp if nothing changed.
    pub fn set(&self, state: SourceState) {
        self.tx.send_if_modified(|current| {
            if current.state == state {
                return false;
            }
            *current = SourceStatus::now(state);
            true
        });
    }
}

/// A producer of samples.
///
/// `run` drives the source until `cancel` fires, calling `handler` for each
/// reading and reporting link changes through `status`. It must not return
/// on a dropped link; retrying is the source's own business.
pub trait SampleSource: Send + 'static {
    /// Short human-readable description for logs.
    fn describe(&self) -> String;

    fn run(
        self,
        handler: SampleHandler,
        status: StatusReporter,
        cancel: CancellationToken,
    ) -> impl Future<Output = ()> + Send;
}

/// Spawn `source` on the Tokio runtime.
///
/// Returns the task handle and a receiver that tracks the source's link
/// state. The state ends as [`SourceState::Stopped`] once the task exits.
pub fn spawn_source<S: SampleSource>(
    source: S,
    handler: SampleHandler,
    cancel: CancellationToken,
) -> (JoinHandle<()>, watch::Receiver<SourceStatus>) {
    let (status, rx) = StatusReporter::channel();
    info!("Starting sample source: {}", source.describe());

    let handle = tokio::spawn(async move {
        source.run(handler, status.clone(), cancel).await;
        status.set(SourceState::Stopped);
        info!("Sample source stopped");
    });

    (handle, rx)
}
