pub mod config;
pub mod controller;
pub mod registry;
pub mod state;

pub use config::TrackerConfig;
pub use controller::VideoTracker;
pub use registry::Registry;
pub use state::{SeekDirection, SegmentStatus, TrackedVideo};
