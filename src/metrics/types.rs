use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::host::VideoId;

/// Engagement counters for one video. Field names are the public contract of
/// the emitted event payload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VideoMetrics {
    pub ff_seek_count: u32,
    pub rw_seek_count: u32,
    pub replay_count: u32,
    pub fs_count: u32,
    /// Furthest position reached as a fraction of the duration.
    pub percentage_elapsed: f64,
    /// Distinct seconds watched on screen as a fraction of the duration.
    pub percentage_unique_seconds_viewed: f64,
    pub watch_time_sec: f64,
    pub on_screen_sec: u32,
    pub duration_sec: f64,
    pub current_time_sec: f64,
}

/// Payload of the custom event dispatched on every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsEvent {
    pub metrics: VideoMetrics,
    pub video: VideoId,
    pub session_started_at: DateTime<Utc>,
}
