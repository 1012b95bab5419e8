use crate::host::{HostEnvironment, VideoId};

/// What the tracker was asked to watch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum VideoSource {
    /// CSS selector, resolved once when the tracker is built.
    Selector(String),
    Collection(Vec<VideoId>),
    Single(VideoId),
    /// Anything unrecognised resolves to no videos.
    #[default]
    Nothing,
}

impl VideoSource {
    /// Resolves to the videos to register, in order, without duplicates.
    pub fn resolve(&self, host: &dyn HostEnvironment) -> Vec<VideoId> {
        let candidates = match self {
            VideoSource::Selector(selector) => host.query_selector_all(selector),
            VideoSource::Collection(videos) => videos.clone(),
            VideoSource::Single(video) => vec![*video],
            VideoSource::Nothing => Vec::new(),
        };

        let mut resolved: Vec<VideoId> = Vec::with_capacity(candidates.len());
        for video in candidates {
            if !resolved.contains(&video) {
                resolved.push(video);
            }
        }
        resolved
    }
}

impl From<&str> for VideoSource {
    fn from(selector: &str) -> Self {
        VideoSource::Selector(selector.to_string())
    }
}

impl From<String> for VideoSource {
    fn from(selector: String) -> Self {
        VideoSource::Selector(selector)
    }
}

impl From<Vec<VideoId>> for VideoSource {
    fn from(videos: Vec<VideoId>) -> Self {
        VideoSource::Collection(videos)
    }
}

impl From<&[VideoId]> for VideoSource {
    fn from(videos: &[VideoId]) -> Self {
        VideoSource::Collection(videos.to_vec())
    }
}

impl From<VideoId> for VideoSource {
    fn from(video: VideoId) -> Self {
        VideoSource::Single(video)
    }
}

impl From<Option<VideoId>> for VideoSource {
    fn from(video: Option<VideoId>) -> Self {
        video.map(VideoSource::Single).unwrap_or_default()
    }
}
