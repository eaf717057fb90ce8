use std::time::Duration;

/// Exponent used by the comms LEDs. Anything above 1 gives a slow start and a
/// fast middle, which reads as an even fade to the eye.
pub const DEFAULT_EXPONENT: f64 = 2.5;

/// Time between two brightness writes.
pub const STEP_INTERVAL: Duration = Duration::from_millis(20);

/// Brightness while fading in, `progress` in [0, 1].
pub fn fade_in(progress: f64, exponent: f64) -> f64 {
    progress.clamp(0.0, 1.0).powf(exponent)
}

/// Brightness while fading out, `progress` in [0, 1].
pub fn fade_out(progress: f64, exponent: f64) -> f64 {
    fade_in(1.0 - progress.clamp(0.0, 1.0), exponent)
}

/// Number of whole step intervals that fit into `duration`.
///
/// A zero interval yields zero steps so callers never divide by it.
pub fn steps(duration: Duration, interval: Duration) -> u32 {
    if interval.is_zero() {
        return 0;
    }
    let count = duration.as_nanos() / interval.as_nanos();
    u32::try_from(count).unwrap_or(u32::MAX)
}

/// Normalized position of `step` within a phase of `total` steps.
pub fn progress(step: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    f64::from(step) / f64::from(total)
}
