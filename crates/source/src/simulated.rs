use crate::{SampleHandler, SampleSource, StatusReporter};
use rssi_core::SourceState;
use std::f32::consts::TAU;
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Synthetic RSSI for running the server without a radio attached.
///
/// Produces a slow fade around -60 dBm with a faster ripple on top, rounded
/// to whole dBm like the radio's `int8_t` log variable.
#[derive(Debug, Clone)]
pub struct SimulatedSource {
    period: Duration,
}

impl SimulatedSource {
    pub fn new(period: Duration) -> Self {
        Self { period }
    }

    /// Reading at sample index `n`.
    pub fn value_at(&self, n: u64) -> f32 {
        let t = n as f32 * self.period.as_secs_f32();
        let fade = 15.0 * (TAU * t / 20.0).sin();
        let ripple = 4.0 * (TAU * t / 1.5).sin();
        (-60.0 + fade + ripple).round()
    }
}

impl SampleSource for SimulatedSource {
    fn describe(&self) -> String {
        format!("simulated signal every {:?}", self.period)
    }

    async fn run(self, handler: SampleHandler, status: StatusReporter, cancel: CancellationToken) {
        let mut ticker = time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        status.set(SourceState::Connected);

        let mut n: u64 = 0;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = ticker.tick() => {}
            }
            handler(self.value_at(n));
            n = n.wrapping_add(1);
        }
    }
}
