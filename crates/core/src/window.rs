use crate::sample::clamp_to_floor;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Number of samples kept when the config doesn't say otherwise.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Fixed-length history of the most recent samples, shared between the
/// sample producer and every viewer.
///
/// The window always holds exactly `capacity` values: it starts out filled
/// with `floor` and each [`push`](Self::push) evicts the oldest value.
/// Readers never see the live storage, only [`Snapshot`] copies.
///
/// `push` and `snapshot` go through one mutex and hold it only for the
/// shift or the copy, so a snapshot is never a mix of two windows and a
/// slow viewer can't stall the producer.
#[derive(Debug)]
pub struct SlidingWindowBuffer {
    floor: f32,
    capacity: usize,
    inner: Mutex<Window>,
}

#[derive(Debug)]
struct Window {
    samples: VecDeque<f32>,
    /// Total pushes since creation.
    pushes: u64,
}

impl SlidingWindowBuffer {
    /// Create a window of `capacity` slots, all set to `floor`.
    ///
    /// A zero capacity is bumped to one so the window always has a newest
    /// sample.
    pub fn new(capacity: usize, floor: f32) -> Self {
        let capacity = capacity.max(1);
        Self {
            floor,
            capacity,
            inner: Mutex::new(Window {
                samples: std::iter::repeat(floor).take(capacity).collect(),
                pushes: 0,
            }),
        }
    }

    /// Append `value` (clamped to the floor) as the newest sample and drop
    /// the oldest one.
    ///
    /// Safe to call from any thread; blocks only for the shift itself.
    pub fn push(&self, value: f32) {
        let value = clamp_to_floor(value, self.floor);
        let mut window = self.lock();
        window.samples.pop_front();
        window.samples.push_back(value);
        window.pushes += 1;
    }

    /// Copy the current window, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        let window = self.lock();
        Snapshot {
            values: window.samples.iter().copied().collect(),
            pushes: window.pushes,
        }
    }

    /// Newest stored value.
    #[must_use]
    pub fn latest(&self) -> f32 {
        self.progress().1
    }

    /// Total number of pushes since the window was created.
    #[must_use]
    pub fn push_count(&self) -> u64 {
        self.progress().0
    }

    /// Push count and newest value, read under one lock without copying the
    /// window.
    #[must_use]
    pub fn progress(&self) -> (u64, f32) {
        let window = self.lock();
        let newest = window.samples.back().copied().unwrap_or(self.floor);
        (window.pushes, newest)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn floor(&self) -> f32 {
        self.floor
    }

    // A panic while holding the lock can't leave the deque half-shifted
    // (pop/push are each complete), so a poisoned window is still valid.
    fn lock(&self) -> MutexGuard<'_, Window> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SlidingWindowBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, crate::sample::DEFAULT_FLOOR)
    }
}

/// Point-in-time copy of a [`SlidingWindowBuffer`].
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    values: Vec<f32>,
    pushes: u64,
}

impl Snapshot {
    /// Window contents, oldest first.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Number of pushes the window had seen when this copy was taken.
    pub fn pushes(&self) -> u64 {
        self.pushes
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
