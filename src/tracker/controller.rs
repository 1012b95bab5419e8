use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
    time::{self, Duration, Instant, MissedTickBehavior},
};
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::host::{HostEnvironment, HostEvent, VideoId};
use crate::metrics::VideoMetrics;
use crate::source::VideoSource;

use super::{config::TrackerConfig, registry::Registry};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Public handle to a set of tracked videos.
///
/// One spawned task is the single execution queue: host notifications and the
/// periodic tick are applied to the registry one at a time, with pending
/// notifications always handled before the next tick. Clones share the same
/// registry; the task is cancelled by [`destroy`](Self::destroy) or when the
/// last clone is dropped, and releases every host listener on its way out.
#[derive(Clone)]
pub struct VideoTracker {
    registry: Arc<Mutex<Registry>>,
    host: Arc<dyn HostEnvironment>,
    config: TrackerConfig,
    ticker: Arc<Mutex<Option<JoinHandle<()>>>>,
    cancel_token: CancellationToken,
    _drop_guard: Arc<DropGuard>,
}

impl VideoTracker {
    /// Resolves `source`, registers every video it names and starts ticking.
    /// Must be called from within a Tokio runtime.
    pub fn new(
        host: Arc<dyn HostEnvironment>,
        source: impl Into<VideoSource>,
        config: TrackerConfig,
    ) -> Self {
        let config = config.sanitized();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let source: VideoSource = source.into();

        let mut registry = Registry::new(host.as_ref(), config.event_name.clone(), event_tx);
        for video in source.resolve(host.as_ref()) {
            registry.add(host.as_ref(), video);
        }
        log_info!(
            "Video tracker started with {} videos, ticking every {:.2}s as '{}'",
            registry.tracked_videos().len(),
            config.interval_secs,
            config.event_name
        );

        let registry = Arc::new(Mutex::new(registry));
        let cancel_token = CancellationToken::new();

        let handle = tokio::spawn(tracker_loop(
            registry.clone(),
            host.clone(),
            event_rx,
            config.interval(),
            cancel_token.clone(),
        ));

        Self {
            registry,
            host,
            config,
            ticker: Arc::new(Mutex::new(Some(handle))),
            _drop_guard: Arc::new(cancel_token.clone().drop_guard()),
            cancel_token,
        }
    }

    pub fn with_defaults(host: Arc<dyn HostEnvironment>, source: impl Into<VideoSource>) -> Self {
        Self::new(host, source, TrackerConfig::default())
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Starts tracking `video`. No-op when it is already tracked.
    pub async fn add(&self, video: VideoId) -> bool {
        let mut registry = self.registry.lock().await;
        if registry.is_destroyed() {
            log_warn!("Ignoring add of {} on a destroyed tracker", video);
            return false;
        }
        registry.add(self.host.as_ref(), video)
    }

    /// Stops tracking `video` and drops its state. No-op when untracked.
    pub async fn remove(&self, video: VideoId) -> bool {
        self.registry.lock().await.remove(self.host.as_ref(), video)
    }

    pub async fn get_tracked_videos(&self) -> Vec<VideoId> {
        self.registry.lock().await.tracked_videos()
    }

    pub async fn get_metrics(&self, video: VideoId) -> Option<VideoMetrics> {
        self.registry.lock().await.metrics(video)
    }

    pub async fn get_all_metrics(&self) -> Vec<(VideoId, VideoMetrics)> {
        self.registry.lock().await.all_metrics()
    }

    pub async fn is_destroyed(&self) -> bool {
        self.registry.lock().await.is_destroyed()
    }

    /// Stops the tick, disconnects every listener and forgets all videos.
    /// Safe to call more than once.
    pub async fn destroy(&self) -> Result<()> {
        self.cancel_token.cancel();

        let handle = self.ticker.lock().await.take();
        if let Some(handle) = handle {
            handle.await.context("tracker loop task failed to join")?;
        }

        // The loop already tore the registry down; this covers a loop that
        // ended before it could.
        self.registry.lock().await.destroy(self.host.as_ref());
        Ok(())
    }
}

async fn tracker_loop(
    registry: Arc<Mutex<Registry>>,
    host: Arc<dyn HostEnvironment>,
    mut events: mpsc::UnboundedReceiver<HostEvent>,
    period: Duration,
    cancel_token: CancellationToken,
) {
    // The first tick lands one full period after start.
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                log_info!("tracker loop shutting down");
                break;
            }
            Some(event) = events.recv() => {
                registry.lock().await.handle_event(host.as_ref(), event);
            }
            _ = ticker.tick() => {
                registry.lock().await.tick(host.as_ref());
            }
        }
    }

    let mut registry = registry.lock().await;
    if !registry.is_destroyed() {
        registry.destroy(host.as_ref());
        log_info!("Video tracker destroyed");
    }
}
