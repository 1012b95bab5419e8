//! Property-based tests for the per-video state machine.

use chrono::Utc;
use proptest::prelude::*;
use videometrics_lib::host::PlaybackSample;
use videometrics_lib::metrics::ratio_of_duration;
use videometrics_lib::tracker::TrackedVideo;

fn sample(position: f64, duration: f64, playing: bool) -> PlaybackSample {
    PlaybackSample {
        current_time: position,
        duration,
        paused: !playing,
        ended: false,
        ready_state: 4,
    }
}

// =============================================================================
// Derived ratios
// =============================================================================

proptest! {
    /// Unique-viewed fraction is u/d rounded to hundredths, or 0 when either is 0.
    #[test]
    fn ratio_matches_rounded_quotient(unique in 0u32..20_000, duration in 0.01f64..10_000.0) {
        let expected = if unique == 0 {
            0.0
        } else {
            ((unique as f64 / duration) * 100.0).round() / 100.0
        };
        prop_assert_eq!(ratio_of_duration(unique as f64, duration), expected);
        prop_assert_eq!(ratio_of_duration(unique as f64, 0.0), 0.0);
    }

    /// Elapsed fraction follows the same rule with the furthest position.
    #[test]
    fn elapsed_fraction_uses_max_position(
        positions in prop::collection::vec(0.5f64..500.0, 1..40),
        duration in 1.0f64..1_000.0,
    ) {
        let mut video = TrackedVideo::new(Utc::now());
        for position in &positions {
            video.tick(sample(*position, duration, true), true);
        }
        let max = positions.iter().cloned().fold(0.0, f64::max);
        prop_assert_eq!(video.max_position_reached, max);
        prop_assert_eq!(video.metrics.percentage_elapsed, ratio_of_duration(max, duration));
    }
}

// =============================================================================
// Seek classification
// =============================================================================

proptest! {
    #[test]
    fn seek_moves_exactly_one_counter(p0 in 0.0f64..1_000.0, p1 in 0.0f64..1_000.0) {
        let mut video = TrackedVideo::new(Utc::now());
        video.tick(sample(p0, 1_000.0, false), false);
        video.record_seek(p1);

        let (ff, rw) = (video.metrics.ff_seek_count, video.metrics.rw_seek_count);
        if p1 > p0 {
            prop_assert_eq!((ff, rw), (1, 0));
        } else if p1 < p0 {
            prop_assert_eq!((ff, rw), (0, 1));
        } else {
            prop_assert_eq!((ff, rw), (0, 0));
        }
    }
}

// =============================================================================
// Monotonic accumulators
// =============================================================================

proptest! {
    /// Watch time grows by exactly each segment's positive length.
    #[test]
    fn watch_time_only_increases(
        segments in prop::collection::vec((0.0f64..500.0, prop_oneof![Just(0.0f64), 0.01f64..60.0]), 1..30),
    ) {
        let mut video = TrackedVideo::new(Utc::now());
        let mut previous = 0.0;
        for (start, length) in segments {
            video.begin_segment(start);
            video.stop_segment(start + length);

            let current = video.accumulated_playback_seconds;
            prop_assert!(current >= previous);
            if length > 0.0 {
                prop_assert!(current > previous);
            } else {
                prop_assert_eq!(current, previous);
            }
            prop_assert_eq!(video.metrics.watch_time_sec, current);
            previous = current;
        }
    }

    /// The set of on-screen seconds never shrinks, whatever the visibility.
    #[test]
    fn unique_seconds_never_shrink(
        ticks in prop::collection::vec((0.0f64..300.0, any::<bool>(), any::<bool>()), 1..60),
    ) {
        let mut video = TrackedVideo::new(Utc::now());
        let mut previous = 0;
        for (position, playing, in_viewport) in ticks {
            video.tick(sample(position, 300.0, playing), in_viewport);
            let count = video.unique_seconds_visited.len();
            prop_assert!(count >= previous);
            prop_assert_eq!(video.metrics.on_screen_sec as usize, count);
            previous = count;
        }
    }
}
