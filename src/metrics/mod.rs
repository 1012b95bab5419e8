mod types;

pub use types::{MetricsEvent, VideoMetrics};

/// `numerator / duration` rounded to two decimals. Yields 0 when either side is
/// non-positive (or not finite) instead of NaN or infinity.
pub fn ratio_of_duration(numerator: f64, duration: f64) -> f64 {
    if !(numerator > 0.0 && duration > 0.0) || !numerator.is_finite() || !duration.is_finite() {
        return 0.0;
    }

    round_to_hundredths(numerator / duration)
}

fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
