/// Lowest signal strength the window will store (dBm).
///
/// Also the neutral value every window slot starts out with.
pub const DEFAULT_FLOOR: f32 = -140.0;

/// Clamp a raw reading to `floor`.
///
/// Only the floor is enforced; readings are naturally bounded above by the
/// radio. Non-finite readings (NaN, ±inf) collapse to the floor so the
/// window always holds plain decimal numbers.
#[must_use]
pub fn clamp_to_floor(value: f32, floor: f32) -> f32 {
    if !value.is_finite() {
        return floor;
    }
    value.max(floor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_below_floor_are_raised() {
        assert_eq!(clamp_to_floor(-200.0, DEFAULT_FLOOR), DEFAULT_FLOOR);
        assert_eq!(clamp_to_floor(-140.5, DEFAULT_FLOOR), DEFAULT_FLOOR);
    }

    #[test]
    fn values_above_floor_pass_through() {
        assert_eq!(clamp_to_floor(-57.0, DEFAULT_FLOOR), -57.0);
        assert_eq!(clamp_to_floor(-140.0, DEFAULT_FLOOR), -140.0);
        // No ceiling.
        assert_eq!(clamp_to_floor(30.0, DEFAULT_FLOOR), 30.0);
    }

    #[test]
    fn non_finite_becomes_floor() {
        assert_eq!(clamp_to_floor(f32::NAN, -10.0), -10.0);
        assert_eq!(clamp_to_floor(f32::INFINITY, -10.0), -10.0);
        assert_eq!(clamp_to_floor(f32::NEG_INFINITY, -10.0), -10.0);
    }
}
