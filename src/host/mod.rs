//! Capabilities the tracker needs from the page hosting the videos.
//!
//! Everything the tracker knows about documents, layout and media elements goes
//! through [`HostEnvironment`], so a real page binding and the in-memory
//! [`memory::MemoryPage`] are interchangeable.

pub mod memory;

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::metrics::MetricsEvent;

pub use memory::MemoryPage;

/// `HTMLMediaElement.HAVE_METADATA`
pub const HAVE_METADATA: u8 = 1;

pub const FULLSCREEN_CHANGE_EVENTS: [&str; 4] = [
    "fullscreenchange",
    "webkitfullscreenchange",
    "mozfullscreenchange",
    "MSFullscreenChange",
];

pub const VISIBILITY_CHANGE_EVENT: &str = "visibilitychange";

/// Synthetic name used for DOM mutation notifications.
pub const MUTATION_EVENT: &str = "mutation";

/// Opaque identity of a video element on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(pub u64);

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "video#{}", self.0)
    }
}

/// Media events the per-video state machine reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaEvent {
    Play,
    Pause,
    Ended,
    Waiting,
    TimeUpdate,
    Seeking,
    Seeked,
    LoadedMetadata,
}

impl MediaEvent {
    pub const ALL: [MediaEvent; 8] = [
        MediaEvent::Play,
        MediaEvent::Pause,
        MediaEvent::Ended,
        MediaEvent::Waiting,
        MediaEvent::TimeUpdate,
        MediaEvent::Seeking,
        MediaEvent::Seeked,
        MediaEvent::LoadedMetadata,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MediaEvent::Play => "play",
            MediaEvent::Pause => "pause",
            MediaEvent::Ended => "ended",
            MediaEvent::Waiting => "waiting",
            MediaEvent::TimeUpdate => "timeupdate",
            MediaEvent::Seeking => "seeking",
            MediaEvent::Seeked => "seeked",
            MediaEvent::LoadedMetadata => "loadedmetadata",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|event| event.name() == name)
    }
}

/// Where a listener is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTarget {
    Document,
    Video(VideoId),
}

/// A notification delivered by the host to a subscribed sink.
#[derive(Debug, Clone, PartialEq)]
pub struct HostEvent {
    pub target: EventTarget,
    pub name: String,
}

impl HostEvent {
    pub fn new(target: EventTarget, name: impl Into<String>) -> Self {
        Self {
            target,
            name: name.into(),
        }
    }
}

/// Receiving end for host notifications. All listeners owned by one tracker
/// share a single sink, which makes the tracker's task the only consumer.
pub type EventSink = mpsc::UnboundedSender<HostEvent>;

/// Identifies exactly one registered listener so it can be removed later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(Uuid);

impl SubscriptionHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time playback properties of one element.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlaybackSample {
    pub current_time: f64,
    pub duration: f64,
    pub paused: bool,
    pub ended: bool,
    pub ready_state: u8,
}

impl PlaybackSample {
    /// Duration in seconds, or 0 when the element reports NaN, infinity or a
    /// non-positive value (live streams, metadata not loaded).
    pub fn known_duration(&self) -> f64 {
        if self.duration.is_finite() && self.duration > 0.0 {
            self.duration
        } else {
            0.0
        }
    }

    pub fn is_playing(&self) -> bool {
        !self.paused && !self.ended && self.current_time > 0.0
    }

    pub fn has_metadata(&self) -> bool {
        self.ready_state >= HAVE_METADATA
    }
}

/// Element bounding box in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn has_area(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    pub fn intersects(&self, viewport: Viewport) -> bool {
        self.top < viewport.height
            && self.bottom() > 0.0
            && self.left < viewport.width
            && self.right() > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 720.0,
        }
    }
}

/// Document, layout and media capabilities of the hosting page.
pub trait HostEnvironment: Send + Sync {
    /// Resolves a CSS selector to the matching video elements, in document order.
    fn query_selector_all(&self, selector: &str) -> Vec<VideoId>;

    fn playback(&self, video: VideoId) -> Option<PlaybackSample>;

    fn bounding_rect(&self, video: VideoId) -> Option<Rect>;

    fn viewport(&self) -> Viewport;

    fn is_page_visible(&self) -> bool;

    /// Element currently shown fullscreen, whichever vendor API reports it.
    fn fullscreen_element(&self) -> Option<VideoId>;

    /// Whether the element is still attached to the document.
    fn is_connected(&self, video: VideoId) -> bool;

    fn add_listener(&self, target: EventTarget, event: &str, sink: EventSink) -> SubscriptionHandle;

    fn remove_listener(&self, handle: SubscriptionHandle);

    /// Starts observing document membership changes. Returns `None` when the
    /// environment cannot observe mutations.
    fn observe_mutations(&self, _sink: EventSink) -> Option<SubscriptionHandle> {
        None
    }

    /// Fires a custom event on the video element.
    fn dispatch(&self, video: VideoId, event_name: &str, event: &MetricsEvent);
}

/// Page visible, element intersecting the viewport, and rendered with a
/// non-zero size.
pub fn is_in_viewport(host: &dyn HostEnvironment, video: VideoId) -> bool {
    if !host.is_page_visible() {
        return false;
    }

    match host.bounding_rect(video) {
        Some(rect) => rect.has_area() && rect.intersects(host.viewport()),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_outside_viewport_does_not_intersect() {
        let viewport = Viewport::default();
        assert!(Rect::new(0.0, 0.0, 640.0, 360.0).intersects(viewport));
        assert!(!Rect::new(0.0, 720.0, 640.0, 360.0).intersects(viewport));
        assert!(!Rect::new(0.0, -360.0, 640.0, 360.0).intersects(viewport));
        assert!(Rect::new(-600.0, 0.0, 640.0, 360.0).intersects(viewport));
    }

    #[test]
    fn sample_duration_guards_invalid_values() {
        let mut sample = PlaybackSample::default();
        sample.duration = f64::NAN;
        assert_eq!(sample.known_duration(), 0.0);
        sample.duration = f64::INFINITY;
        assert_eq!(sample.known_duration(), 0.0);
        sample.duration = -3.0;
        assert_eq!(sample.known_duration(), 0.0);
        sample.duration = 42.5;
        assert_eq!(sample.known_duration(), 42.5);
    }

    #[test]
    fn playing_requires_progress() {
        let sample = PlaybackSample {
            current_time: 0.0,
            paused: false,
            ..Default::default()
        };
        assert!(!sample.is_playing());

        let sample = PlaybackSample {
            current_time: 3.0,
            paused: false,
            ended: true,
            ..Default::default()
        };
        assert!(!sample.is_playing());
    }

    #[test]
    fn media_event_names_round_trip() {
        for event in MediaEvent::ALL {
            assert_eq!(MediaEvent::from_name(event.name()), Some(event));
        }
        assert_eq!(MediaEvent::from_name("volumechange"), None);
    }
}
