use chrono::{DateTime, Utc};
use serde::Serialize;

/// Link state of the sample source, as reported by the producer task.
///
/// While the source is anything other than `Connected` the window simply
/// stops advancing; viewers keep receiving the last-known samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceState {
    /// Trying to reach the source (first attempt or a retry).
    Connecting,
    /// Samples are flowing.
    Connected,
    /// Link lost or refused; a retry is scheduled.
    Disconnected,
    /// The producer task has exited and no more samples will arrive.
    Stopped,
}

/// [`SourceState`] plus the moment it was entered.
#[derive(Debug, Clone, Serialize)]
pub struct SourceStatus {
    pub state: SourceState,
    pub since: DateTime<Utc>,
}

impl SourceStatus {
    pub fn now(state: SourceState) -> Self {
        Self {
            state,
            since: Utc::now(),
        }
    }
}

impl Default for SourceStatus {
    fn default() -> Self {
        Self::now(SourceState::Connecting)
    }
}
