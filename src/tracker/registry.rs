use chrono::Utc;

use crate::host::{
    is_in_viewport, EventSink, EventTarget, HostEnvironment, HostEvent, MediaEvent,
    SubscriptionHandle, VideoId, FULLSCREEN_CHANGE_EVENTS, MUTATION_EVENT,
    VISIBILITY_CHANGE_EVENT,
};
use crate::metrics::{MetricsEvent, VideoMetrics};

use super::state::TrackedVideo;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// Tracked videos in registration order, plus the document-level listeners
/// shared by all of them.
///
/// Every method takes the host explicitly; the registry never reaches for
/// ambient page state.
pub struct Registry {
    entries: Vec<(VideoId, TrackedVideo)>,
    event_name: String,
    sink: EventSink,
    document_subscriptions: Vec<SubscriptionHandle>,
    mutation_observer: Option<SubscriptionHandle>,
    destroyed: bool,
}

impl Registry {
    /// Subscribes the document listeners (fullscreen, visibility, mutations)
    /// that route into `sink`.
    pub fn new(host: &dyn HostEnvironment, event_name: impl Into<String>, sink: EventSink) -> Self {
        let mut document_subscriptions = Vec::with_capacity(FULLSCREEN_CHANGE_EVENTS.len() + 1);
        for event in FULLSCREEN_CHANGE_EVENTS {
            document_subscriptions.push(host.add_listener(
                EventTarget::Document,
                event,
                sink.clone(),
            ));
        }
        document_subscriptions.push(host.add_listener(
            EventTarget::Document,
            VISIBILITY_CHANGE_EVENT,
            sink.clone(),
        ));

        let mutation_observer = host.observe_mutations(sink.clone());
        if mutation_observer.is_none() {
            log_debug!("mutation observation unavailable; detached videos stay tracked until removed");
        }

        Self {
            entries: Vec::new(),
            event_name: event_name.into(),
            sink,
            document_subscriptions,
            mutation_observer,
            destroyed: false,
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn is_tracked(&self, video: VideoId) -> bool {
        self.entries.iter().any(|(id, _)| *id == video)
    }

    pub fn entry(&self, video: VideoId) -> Option<&TrackedVideo> {
        self.entries
            .iter()
            .find(|(id, _)| *id == video)
            .map(|(_, entry)| entry)
    }

    fn entry_mut(&mut self, video: VideoId) -> Option<&mut TrackedVideo> {
        self.entries
            .iter_mut()
            .find(|(id, _)| *id == video)
            .map(|(_, entry)| entry)
    }

    /// Registers `video` and subscribes its media listeners. Returns `false`
    /// when it was already tracked or the registry is destroyed.
    pub fn add(&mut self, host: &dyn HostEnvironment, video: VideoId) -> bool {
        if self.destroyed || self.is_tracked(video) {
            return false;
        }

        let mut entry = TrackedVideo::new(Utc::now());
        if let Some(sample) = host.playback(video) {
            entry.metadata_loaded = sample.has_metadata();
            entry.last_observed_position = sample.current_time;
        }

        entry.subscriptions = MediaEvent::ALL
            .iter()
            .map(|event| host.add_listener(EventTarget::Video(video), event.name(), self.sink.clone()))
            .collect();

        log_info!(
            "Tracking {} (metadata loaded: {})",
            video,
            entry.metadata_loaded
        );
        self.entries.push((video, entry));
        true
    }

    /// Unsubscribes and discards `video`. Returns `false` when it was not tracked.
    pub fn remove(&mut self, host: &dyn HostEnvironment, video: VideoId) -> bool {
        let Some(index) = self.entries.iter().position(|(id, _)| *id == video) else {
            return false;
        };

        let (_, entry) = self.entries.remove(index);
        for handle in &entry.subscriptions {
            host.remove_listener(*handle);
        }

        log_info!(
            "Stopped tracking {} after {:.1}s of playback",
            video,
            entry.accumulated_playback_seconds
        );
        true
    }

    pub fn tracked_videos(&self) -> Vec<VideoId> {
        self.entries.iter().map(|(id, _)| *id).collect()
    }

    pub fn metrics(&self, video: VideoId) -> Option<VideoMetrics> {
        self.entry(video).map(TrackedVideo::snapshot)
    }

    pub fn all_metrics(&self) -> Vec<(VideoId, VideoMetrics)> {
        self.entries
            .iter()
            .map(|(id, entry)| (*id, entry.snapshot()))
            .collect()
    }

    /// Routes one host notification to the matching transition.
    pub fn handle_event(&mut self, host: &dyn HostEnvironment, event: HostEvent) {
        if self.destroyed {
            return;
        }

        match event.target {
            EventTarget::Document => {
                let name = event.name.as_str();
                if FULLSCREEN_CHANGE_EVENTS.contains(&name) {
                    self.on_fullscreen_change(host);
                } else if name == VISIBILITY_CHANGE_EVENT {
                    self.on_visibility_change(host);
                } else if name == MUTATION_EVENT {
                    self.prune_detached(host);
                }
            }
            EventTarget::Video(video) => {
                let Some(media_event) = MediaEvent::from_name(&event.name) else {
                    return;
                };
                let position = host.playback(video).map(|sample| sample.current_time);
                match (self.entry_mut(video), position) {
                    (Some(entry), Some(position)) => entry.apply(media_event, position),
                    (None, _) => {
                        log_debug!("Dropping {} for untracked {}", event.name, video);
                    }
                    (Some(_), None) => {
                        log_debug!("No playback state for {}; ignoring {}", video, event.name);
                    }
                }
            }
        }
    }

    /// Counts a fullscreen entry for whichever tracked video is now fullscreen.
    pub fn on_fullscreen_change(&mut self, host: &dyn HostEnvironment) {
        let fullscreen = host.fullscreen_element();
        for (video, entry) in self.entries.iter_mut() {
            if fullscreen == Some(*video) {
                entry.record_fullscreen_entry();
            }
        }
    }

    pub fn on_visibility_change(&mut self, host: &dyn HostEnvironment) {
        if !host.is_page_visible() {
            self.stop_all_segments(host);
        }
    }

    /// Closes every open playing segment without untracking anything.
    pub fn stop_all_segments(&mut self, host: &dyn HostEnvironment) {
        for (video, entry) in self.entries.iter_mut() {
            if entry.active_segment_start.is_none() {
                continue;
            }
            let position = host
                .playback(*video)
                .map(|sample| sample.current_time)
                .unwrap_or(entry.metrics.current_time_sec);
            entry.stop_segment(position);
        }
    }

    /// Removes every tracked video that is no longer attached to the document.
    pub fn prune_detached(&mut self, host: &dyn HostEnvironment) -> Vec<VideoId> {
        let detached: Vec<VideoId> = self
            .entries
            .iter()
            .map(|(id, _)| *id)
            .filter(|id| !host.is_connected(*id))
            .collect();

        for video in &detached {
            self.remove(host, *video);
        }
        detached
    }

    /// One periodic update: samples every video whose metadata is loaded and
    /// dispatches its snapshot, in registration order.
    pub fn tick(&mut self, host: &dyn HostEnvironment) {
        if self.destroyed {
            return;
        }

        for (video, entry) in self.entries.iter_mut() {
            if !entry.metadata_loaded {
                continue;
            }
            let Some(sample) = host.playback(*video) else {
                continue;
            };

            entry.tick(sample, is_in_viewport(host, *video));

            let event = MetricsEvent {
                metrics: entry.snapshot(),
                video: *video,
                session_started_at: entry.session_start,
            };
            host.dispatch(*video, &self.event_name, &event);
        }
    }

    /// Drops every listener and tracked video. Later calls are no-ops.
    pub fn destroy(&mut self, host: &dyn HostEnvironment) {
        if self.destroyed {
            return;
        }

        for handle in self.document_subscriptions.drain(..) {
            host.remove_listener(handle);
        }
        if let Some(handle) = self.mutation_observer.take() {
            host.remove_listener(handle);
        }

        for video in self.tracked_videos() {
            self.remove(host, video);
        }

        self.destroyed = true;
    }
}
