use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::host::{MediaEvent, PlaybackSample, SubscriptionHandle};
use crate::metrics::{ratio_of_duration, VideoMetrics};

/// Replays are only counted when playback restarts from within the first
/// second after having been past it.
const REPLAY_THRESHOLD_SECS: f64 = 1.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SegmentStatus {
    Idle,
    Active,
}

impl Default for SegmentStatus {
    fn default() -> Self {
        SegmentStatus::Idle
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekDirection {
    Forward,
    Reverse,
}

/// Bookkeeping for one registered video.
#[derive(Debug, Clone)]
pub struct TrackedVideo {
    pub metrics: VideoMetrics,
    pub metadata_loaded: bool,
    /// Floored second offsets seen while the video was visible and playing.
    /// Only ever grows.
    pub unique_seconds_visited: HashSet<i64>,
    pub max_position_reached: f64,
    pub is_currently_visible: bool,
    /// Position at which the open playing segment began; `None` while idle.
    pub active_segment_start: Option<f64>,
    /// Sum of all closed segments; mirrored into `metrics.watch_time_sec`.
    pub accumulated_playback_seconds: f64,
    pub last_observed_position: f64,
    pub session_start: DateTime<Utc>,
    pub(crate) subscriptions: Vec<SubscriptionHandle>,
}

impl TrackedVideo {
    pub fn new(session_start: DateTime<Utc>) -> Self {
        Self {
            metrics: VideoMetrics::default(),
            metadata_loaded: false,
            unique_seconds_visited: HashSet::new(),
            max_position_reached: 0.0,
            is_currently_visible: false,
            active_segment_start: None,
            accumulated_playback_seconds: 0.0,
            last_observed_position: 0.0,
            session_start,
            subscriptions: Vec::new(),
        }
    }

    pub fn status(&self) -> SegmentStatus {
        match self.active_segment_start {
            Some(_) => SegmentStatus::Active,
            None => SegmentStatus::Idle,
        }
    }

    pub fn snapshot(&self) -> VideoMetrics {
        self.metrics.clone()
    }

    /// Routes a media event to the matching transition.
    pub fn apply(&mut self, event: MediaEvent, position: f64) {
        match event {
            MediaEvent::Play => {
                self.detect_replay(position);
                self.begin_segment(position);
            }
            MediaEvent::TimeUpdate => {
                self.begin_segment(position);
            }
            MediaEvent::Pause | MediaEvent::Ended | MediaEvent::Waiting => {
                self.stop_segment(position);
            }
            MediaEvent::Seeking => {
                self.record_seek(position);
            }
            MediaEvent::Seeked => {
                self.detect_replay(position);
            }
            MediaEvent::LoadedMetadata => {
                self.metadata_loaded = true;
            }
        }
    }

    /// Opens a playing segment at `position`. A segment that is already open
    /// keeps its original start.
    pub fn begin_segment(&mut self, position: f64) -> bool {
        if self.active_segment_start.is_some() {
            return false;
        }
        self.active_segment_start = Some(position);
        true
    }

    /// Closes the open segment and folds its positive length into the
    /// accumulated watch time. Returns the length that was added.
    pub fn stop_segment(&mut self, position: f64) -> Option<f64> {
        let start = self.active_segment_start.take()?;
        let delta = position - start;
        if delta > 0.0 {
            self.accumulated_playback_seconds += delta;
            self.metrics.watch_time_sec = self.accumulated_playback_seconds;
            Some(delta)
        } else {
            None
        }
    }

    /// Classifies a seek against the position recorded at the last tick.
    pub fn record_seek(&mut self, position: f64) -> Option<SeekDirection> {
        let reference = self.metrics.current_time_sec;
        if position > reference {
            self.metrics.ff_seek_count += 1;
            Some(SeekDirection::Forward)
        } else if position < reference {
            self.metrics.rw_seek_count += 1;
            Some(SeekDirection::Reverse)
        } else {
            None
        }
    }

    /// Counts a replay when playback jumps back to the start after having
    /// progressed past it. The observed position is updated either way.
    pub fn detect_replay(&mut self, position: f64) -> bool {
        let replayed = self.last_observed_position > REPLAY_THRESHOLD_SECS
            && position < REPLAY_THRESHOLD_SECS;
        if replayed {
            self.metrics.replay_count += 1;
        }
        self.last_observed_position = position;
        replayed
    }

    pub fn record_fullscreen_entry(&mut self) {
        self.metrics.fs_count += 1;
    }

    /// Periodic sampling: progress high-water mark, on-screen seconds and the
    /// derived fractions. `in_viewport` is the layout half of visibility; the
    /// playing half comes from `sample`.
    pub fn tick(&mut self, sample: PlaybackSample, in_viewport: bool) {
        let position = sample.current_time;
        let duration = sample.known_duration();

        self.max_position_reached = self.max_position_reached.max(position);
        self.is_currently_visible = in_viewport && sample.is_playing();

        if self.is_currently_visible {
            self.unique_seconds_visited.insert(position.floor() as i64);
            self.metrics.on_screen_sec = self.unique_seconds_visited.len() as u32;
            self.metrics.percentage_unique_seconds_viewed =
                ratio_of_duration(self.metrics.on_screen_sec as f64, duration);
            self.metrics.percentage_elapsed =
                ratio_of_duration(self.max_position_reached, duration);
        }

        self.metrics.current_time_sec = position;
        self.metrics.duration_sec = duration;
    }
}
