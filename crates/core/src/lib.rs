pub mod error;
pub mod sample;
pub mod status;
pub mod window;

pub use error::{Result, RssiError};
pub use sample::{clamp_to_floor, DEFAULT_FLOOR};
pub use status::{SourceState, SourceStatus};
pub use window::{SlidingWindowBuffer, Snapshot, DEFAULT_CAPACITY};
