//! Per-viewer live streams over the shared RSSI window.
//!
//! Every viewer gets its own Tokio task that wakes on a fixed tick, copies
//! the window and hands the copy to the viewer's one-slot channel. Ticks are
//! independent of sample arrival, so viewers see a steady, rate-limited feed
//! no matter how fast the radio reports.
//!
//! A viewer that stops reading only loses ticks: when its slot is still
//! full the new snapshot is dropped, and nothing ever waits on it. Dropping
//! the [`ViewerStream`] (client went away) ends its task straight away.

pub mod event;

pub use event::{event_data, format_values};

use futures::Stream;
use rssi_core::{SlidingWindowBuffer, Snapshot};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

/// Fans the shared window out to any number of viewers.
#[derive(Debug)]
pub struct StreamPublisher {
    buffer: Arc<SlidingWindowBuffer>,
    tick: watch::Sender<Duration>,
    viewers: Arc<AtomicUsize>,
    next_id: AtomicU64,
    shutdown: CancellationToken,
}

impl StreamPublisher {
    /// Create a publisher ticking every `tick`. Cancelling `shutdown` ends
    /// every viewer stream.
    pub fn new(buffer: Arc<SlidingWindowBuffer>, tick: Duration, shutdown: CancellationToken) -> Self {
        let (tick, _) = watch::channel(clamp_tick(tick));
        Self {
            buffer,
            tick,
            viewers: Arc::new(AtomicUsize::new(0)),
            next_id: AtomicU64::new(1),
            shutdown,
        }
    }

    /// Register a new viewer and start its tick task.
    ///
    /// The first snapshot is sent immediately; later ones follow every tick
    /// until the returned stream is dropped or the publisher shuts down.
    pub fn subscribe(&self) -> ViewerStream {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(1);

        let live = self.viewers.fetch_add(1, Ordering::Relaxed) + 1;
        info!("Viewer {id} connected ({live} live)");

        let task = ViewerTask {
            id,
            buffer: Arc::clone(&self.buffer),
            tick: self.tick.subscribe(),
            tx,
            shutdown: self.shutdown.clone(),
            _guard: ViewerGuard {
                id,
                viewers: Arc::clone(&self.viewers),
            },
        };
        tokio::spawn(task.run());

        ViewerStream {
            inner: ReceiverStream::new(rx),
        }
    }

    /// Change the tick interval for every current and future viewer.
    pub fn set_tick(&self, tick: Duration) {
        let tick = clamp_tick(tick);
        let changed = self.tick.send_if_modified(|current| {
            if *current == tick {
                return false;
            }
            *current = tick;
            true
        });
        if changed {
            info!("Stream tick set to {tick:?}");
        }
    }

    pub fn tick(&self) -> Duration {
        *self.tick.borrow()
    }

    /// Number of viewers whose task is still running.
    pub fn viewer_count(&self) -> usize {
        self.viewers.load(Ordering::Relaxed)
    }

    pub fn buffer(&self) -> &Arc<SlidingWindowBuffer> {
        &self.buffer
    }
}

fn clamp_tick(tick: Duration) -> Duration {
    tick.max(Duration::from_millis(1))
}

/// Snapshots for one viewer, one per tick.
///
/// Ends when the publisher shuts down. Dropping it disconnects the viewer.
#[derive(Debug)]
pub struct ViewerStream {
    inner: ReceiverStream<Snapshot>,
}

impl Stream for ViewerStream {
    type Item = Snapshot;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Snapshot>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

struct ViewerTask {
    id: u64,
    buffer: Arc<SlidingWindowBuffer>,
    tick: watch::Receiver<Duration>,
    tx: mpsc::Sender<Snapshot>,
    shutdown: CancellationToken,
    _guard: ViewerGuard,
}

impl ViewerTask {
    async fn run(mut self) {
        let mut ticker = ticker(*self.tick.borrow_and_update(), Instant::now());
        let mut tick_open = true;
        let mut skipped: u64 = 0;

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    debug!("Viewer {}: shutting down", self.id);
                    break;
                }
                _ = self.tx.closed() => break,
                changed = self.tick.changed(), if tick_open => {
                    if changed.is_err() {
                        // Publisher gone; keep the current cadence.
                        tick_open = false;
                        continue;
                    }
                    let period = *self.tick.borrow_and_update();
                    ticker = ticker_after(period);
                }
                _ = ticker.tick() => {
                    match self.tx.try_send(self.buffer.snapshot()) {
                        Ok(()) => {}
                        Err(mpsc::error::TrySendError::Full(_)) => {
                            skipped += 1;
                            trace!("Viewer {}: still busy, skipped tick", self.id);
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => break,
                    }
                }
            }
        }

        if skipped > 0 {
            debug!("Viewer {}: {skipped} ticks skipped while lagging", self.id);
        }
    }
}

/// Interval whose first tick fires at `start`.
fn ticker(period: Duration, start: Instant) -> Interval {
    let mut ticker = time::interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

/// Interval whose first tick is one `period` from now.
fn ticker_after(period: Duration) -> Interval {
    ticker(period, Instant::now() + period)
}

/// Keeps the live-viewer count honest however the task exits.
struct ViewerGuard {
    id: u64,
    viewers: Arc<AtomicUsize>,
}

impl Drop for ViewerGuard {
    fn drop(&mut self) {
        let live = self.viewers.fetch_sub(1, Ordering::Relaxed) - 1;
        info!("Viewer {} disconnected ({live} live)", self.id);
    }
}
