//! Engagement metrics for video elements: watch time, seeks, replays,
//! fullscreen entries and on-screen coverage, sampled on a fixed tick and
//! dispatched as a custom event on each video.

pub mod host;
pub mod metrics;
pub mod source;
pub mod tracker;
mod utils;

use std::sync::Arc;

use anyhow::Result;
use log::info;
use tokio::time::{sleep, Duration};

pub use host::{HostEnvironment, MemoryPage, VideoId};
pub use metrics::{MetricsEvent, VideoMetrics};
pub use source::VideoSource;
pub use tracker::{TrackerConfig, VideoTracker};

const DEMO_STEPS_PER_TICK: u32 = 4;
const DEMO_TICKS: u32 = 12;

/// Plays a scripted session on an in-memory page and prints every emitted
/// snapshot as a JSON line.
pub async fn run() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    info!("videometrics demo starting up...");

    let page = Arc::new(MemoryPage::new());
    let hero = page.insert_video("#hero");
    let feed = page.insert_video(".feed video");
    page.preload(hero, 20.0);

    let tracker = VideoTracker::new(page.clone(), "video", TrackerConfig::from_env());
    // Sanitized copy: the interval drives the script below.
    let config = tracker.config().clone();

    let mut printers = Vec::new();
    for video in [hero, feed] {
        let mut rx = page.listen(video, &config.event_name);
        printers.push(tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match serde_json::to_string(&event) {
                    Ok(line) => println!("{line}"),
                    Err(err) => log::error!("failed to serialize metrics for {video}: {err}"),
                }
            }
        }));
    }

    page.load_metadata(feed, 8.0);
    page.play(hero);
    page.play(feed);

    let step = config.interval_secs / DEMO_STEPS_PER_TICK as f64;
    for index in 0..DEMO_TICKS * DEMO_STEPS_PER_TICK {
        sleep(Duration::from_secs_f64(step)).await;
        page.advance(step);

        match index {
            8 => page.seek(hero, 15.0),
            12 => page.enter_fullscreen(hero),
            16 => page.seek(hero, 0.0),
            20 => page.exit_fullscreen(),
            24 => page.pause(hero),
            32 => page.set_page_visible(false),
            _ => {}
        }
    }

    for (video, metrics) in tracker.get_all_metrics().await {
        info!(
            "{video}: watched {:.1}s, {} on-screen seconds, {} replays",
            metrics.watch_time_sec, metrics.on_screen_sec, metrics.replay_count
        );
    }

    tracker.destroy().await?;
    for printer in printers {
        printer.abort();
    }

    Ok(())
}
