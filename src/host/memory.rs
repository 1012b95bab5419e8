//! In-process page used by the demo binary and the test-suite.
//!
//! It models just enough of a document to exercise the tracker: media elements
//! with playback state and layout, page visibility, a fullscreen element,
//! listener bookkeeping and a mutation observer.

use std::sync::Mutex;

use tokio::sync::mpsc;

use super::{
    EventSink, EventTarget, HostEnvironment, HostEvent, PlaybackSample, Rect, SubscriptionHandle,
    VideoId, Viewport, HAVE_METADATA, MUTATION_EVENT, VISIBILITY_CHANGE_EVENT,
};
use crate::metrics::MetricsEvent;

const HAVE_ENOUGH_DATA: u8 = 4;

/// Recorded dispatches kept for inspection; older ones are dropped first.
pub const MAX_RECORDED_DISPATCHES: usize = 1024;

#[derive(Debug, Clone)]
struct FakeVideo {
    id: VideoId,
    selectors: Vec<String>,
    sample: PlaybackSample,
    rect: Rect,
    connected: bool,
}

struct Listener {
    handle: SubscriptionHandle,
    target: EventTarget,
    event: String,
    sink: EventSink,
}

/// A metrics event as recorded by the page.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchedEvent {
    pub video: VideoId,
    pub name: String,
    pub payload: MetricsEvent,
}

struct PageState {
    videos: Vec<FakeVideo>,
    next_id: u64,
    visible: bool,
    viewport: Viewport,
    fullscreen: Option<VideoId>,
    listeners: Vec<Listener>,
    observers: Vec<(SubscriptionHandle, EventSink)>,
    supports_mutation_observer: bool,
    custom_listeners: Vec<(VideoId, String, mpsc::UnboundedSender<MetricsEvent>)>,
    dispatched: Vec<DispatchedEvent>,
}

pub struct MemoryPage {
    state: Mutex<PageState>,
}

impl Default for MemoryPage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPage {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PageState {
                videos: Vec::new(),
                next_id: 1,
                visible: true,
                viewport: Viewport::default(),
                fullscreen: None,
                listeners: Vec::new(),
                observers: Vec::new(),
                supports_mutation_observer: true,
                custom_listeners: Vec::new(),
                dispatched: Vec::new(),
            }),
        }
    }

    /// A page whose environment has no mutation observer.
    pub fn without_mutation_observer() -> Self {
        let page = Self::new();
        page.lock().supports_mutation_observer = false;
        page
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PageState> {
        self.state.lock().expect("memory page mutex poisoned")
    }

    fn with_video<R>(&self, video: VideoId, f: impl FnOnce(&mut FakeVideo) -> R) -> Option<R> {
        let mut state = self.lock();
        state.videos.iter_mut().find(|v| v.id == video).map(f)
    }

    /// Appends a paused, not-yet-loaded video element matched by `selector`
    /// (and by the plain `video` selector) and laid out at the top of the page.
    pub fn insert_video(&self, selector: &str) -> VideoId {
        let mut state = self.lock();
        let id = VideoId(state.next_id);
        state.next_id += 1;

        let mut selectors = vec!["video".to_string()];
        if selector != "video" {
            selectors.push(selector.to_string());
        }

        state.videos.push(FakeVideo {
            id,
            selectors,
            sample: PlaybackSample {
                current_time: 0.0,
                duration: f64::NAN,
                paused: true,
                ended: false,
                ready_state: 0,
            },
            rect: Rect::new(0.0, 0.0, 640.0, 360.0),
            connected: true,
        });
        id
    }

    /// Detaches the element from the document and notifies mutation observers.
    pub fn remove_video(&self, video: VideoId) {
        let observers: Vec<EventSink> = {
            let mut state = self.lock();
            if let Some(entry) = state.videos.iter_mut().find(|v| v.id == video) {
                entry.connected = false;
            }
            state.observers.iter().map(|(_, sink)| sink.clone()).collect()
        };

        for sink in observers {
            let _ = sink.send(HostEvent::new(EventTarget::Document, MUTATION_EVENT));
        }
    }

    /// Metadata becomes available: duration is known and `loadedmetadata` fires.
    pub fn load_metadata(&self, video: VideoId, duration: f64) {
        self.with_video(video, |v| {
            v.sample.duration = duration;
            v.sample.ready_state = HAVE_METADATA;
        });
        self.fire(EventTarget::Video(video), "loadedmetadata");
    }

    /// Marks metadata as already loaded without firing an event, like an
    /// element that finished loading before anyone listened.
    pub fn preload(&self, video: VideoId, duration: f64) {
        self.with_video(video, |v| {
            v.sample.duration = duration;
            v.sample.ready_state = HAVE_ENOUGH_DATA;
        });
    }

    pub fn play(&self, video: VideoId) {
        self.with_video(video, |v| {
            v.sample.paused = false;
            v.sample.ended = false;
        });
        self.fire(EventTarget::Video(video), "play");
    }

    pub fn pause(&self, video: VideoId) {
        self.with_video(video, |v| v.sample.paused = true);
        self.fire(EventTarget::Video(video), "pause");
    }

    /// Playback stalls waiting for data.
    pub fn stall(&self, video: VideoId) {
        self.fire(EventTarget::Video(video), "waiting");
    }

    pub fn seek(&self, video: VideoId, position: f64) {
        self.with_video(video, |v| v.sample.current_time = position);
        self.fire(EventTarget::Video(video), "seeking");
        self.fire(EventTarget::Video(video), "seeked");
    }

    /// Sets the position without firing anything.
    pub fn set_current_time(&self, video: VideoId, position: f64) {
        self.with_video(video, |v| v.sample.current_time = position);
    }

    /// Moves every playing video forward by `secs`, firing `timeupdate`, and
    /// `pause` + `ended` for videos that reach their duration.
    pub fn advance(&self, secs: f64) {
        let mut progressed = Vec::new();
        let mut finished = Vec::new();
        {
            let mut state = self.lock();
            for video in state.videos.iter_mut() {
                let sample = &mut video.sample;
                if sample.paused || sample.ended {
                    continue;
                }
                sample.current_time += secs;
                progressed.push(video.id);

                let duration = sample.known_duration();
                if duration > 0.0 && sample.current_time >= duration {
                    sample.current_time = duration;
                    sample.paused = true;
                    sample.ended = true;
                    finished.push(video.id);
                }
            }
        }

        for video in progressed {
            self.fire(EventTarget::Video(video), "timeupdate");
        }
        for video in finished {
            self.fire(EventTarget::Video(video), "pause");
            self.fire(EventTarget::Video(video), "ended");
        }
    }

    pub fn set_rect(&self, video: VideoId, rect: Rect) {
        self.with_video(video, |v| v.rect = rect);
    }

    pub fn set_page_visible(&self, visible: bool) {
        self.lock().visible = visible;
        self.fire(EventTarget::Document, VISIBILITY_CHANGE_EVENT);
    }

    pub fn enter_fullscreen(&self, video: VideoId) {
        self.lock().fullscreen = Some(video);
        self.fire(EventTarget::Document, "fullscreenchange");
    }

    pub fn exit_fullscreen(&self) {
        self.lock().fullscreen = None;
        self.fire(EventTarget::Document, "fullscreenchange");
    }

    /// Delivers `event` to every listener registered for it on `target`.
    pub fn fire(&self, target: EventTarget, event: &str) {
        let sinks: Vec<EventSink> = {
            let state = self.lock();
            state
                .listeners
                .iter()
                .filter(|l| l.target == target && l.event == event)
                .map(|l| l.sink.clone())
                .collect()
        };

        for sink in sinks {
            let _ = sink.send(HostEvent::new(target, event));
        }
    }

    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    pub fn listener_count_for(&self, target: EventTarget) -> usize {
        self.lock()
            .listeners
            .iter()
            .filter(|l| l.target == target)
            .count()
    }

    pub fn observer_count(&self) -> usize {
        self.lock().observers.len()
    }

    /// Subscribes to the custom metrics events dispatched on `video`.
    pub fn listen(&self, video: VideoId, event_name: &str) -> mpsc::UnboundedReceiver<MetricsEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock()
            .custom_listeners
            .push((video, event_name.to_string(), tx));
        rx
    }

    /// The most recent dispatches, oldest first, up to
    /// [`MAX_RECORDED_DISPATCHES`].
    pub fn dispatched(&self) -> Vec<DispatchedEvent> {
        self.lock().dispatched.clone()
    }

    pub fn dispatched_for(&self, video: VideoId) -> Vec<DispatchedEvent> {
        self.lock()
            .dispatched
            .iter()
            .filter(|event| event.video == video)
            .cloned()
            .collect()
    }
}

impl HostEnvironment for MemoryPage {
    fn query_selector_all(&self, selector: &str) -> Vec<VideoId> {
        self.lock()
            .videos
            .iter()
            .filter(|v| v.connected && v.selectors.iter().any(|s| s == selector))
            .map(|v| v.id)
            .collect()
    }

    fn playback(&self, video: VideoId) -> Option<PlaybackSample> {
        self.lock()
            .videos
            .iter()
            .find(|v| v.id == video)
            .map(|v| v.sample)
    }

    fn bounding_rect(&self, video: VideoId) -> Option<Rect> {
        self.lock()
            .videos
            .iter()
            .find(|v| v.id == video && v.connected)
            .map(|v| v.rect)
    }

    fn viewport(&self) -> Viewport {
        self.lock().viewport
    }

    fn is_page_visible(&self) -> bool {
        self.lock().visible
    }

    fn fullscreen_element(&self) -> Option<VideoId> {
        self.lock().fullscreen
    }

    fn is_connected(&self, video: VideoId) -> bool {
        self.lock()
            .videos
            .iter()
            .any(|v| v.id == video && v.connected)
    }

    fn add_listener(&self, target: EventTarget, event: &str, sink: EventSink) -> SubscriptionHandle {
        let handle = SubscriptionHandle::new();
        self.lock().listeners.push(Listener {
            handle,
            target,
            event: event.to_string(),
            sink,
        });
        handle
    }

    fn remove_listener(&self, handle: SubscriptionHandle) {
        let mut state = self.lock();
        state.listeners.retain(|l| l.handle != handle);
        state.observers.retain(|(h, _)| *h != handle);
    }

    fn observe_mutations(&self, sink: EventSink) -> Option<SubscriptionHandle> {
        let mut state = self.lock();
        if !state.supports_mutation_observer {
            return None;
        }
        let handle = SubscriptionHandle::new();
        state.observers.push((handle, sink));
        Some(handle)
    }

    fn dispatch(&self, video: VideoId, event_name: &str, event: &MetricsEvent) {
        let mut state = self.lock();
        if state.dispatched.len() >= MAX_RECORDED_DISPATCHES {
            state.dispatched.remove(0);
        }
        state.dispatched.push(DispatchedEvent {
            video,
            name: event_name.to_string(),
            payload: event.clone(),
        });
        state
            .custom_listeners
            .retain(|(target, name, tx)| {
                if *target != video || name != event_name {
                    return !tx.is_closed();
                }
                tx.send(event.clone()).is_ok()
            });
    }
}
