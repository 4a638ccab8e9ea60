use rssi_core::Snapshot;
use std::fmt::Write;

/// Render window values as `[v0, v1, ..., vN-1]`, oldest first.
///
/// Each value uses the shortest decimal form that round-trips, so whole dBm
/// readings come out as `-57` and fractional ones as `-57.5`. The result is
/// also a valid JSON array.
pub fn format_values(values: &[f32]) -> String {
    // "-140, " is the common case.
    let mut out = String::with_capacity(2 + values.len() * 6);
    out.push('[');
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "{v}");
    }
    out.push(']');
    out
}

/// Payload of one stream event for `snapshot`.
pub fn event_data(snapshot: &Snapshot) -> String {
    format_values(snapshot.values())
}
