//! Logging macros gated by a module-level `ENABLE_LOGS` flag.
//!
//! The tracker logs lifecycle transitions (videos added and removed, the tick
//! loop starting and stopping) through the `log` facade. Modules that get
//! chatty can silence themselves without touching the global filter:
//!
//! ```ignore
//! const ENABLE_LOGS: bool = false;
//!
//! use crate::{log_debug, log_info};
//!
//! log_info!("tracking {} videos", count);
//! ```

/// `log::info!` when the calling module's `ENABLE_LOGS` is true.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

/// `log::warn!` when the calling module's `ENABLE_LOGS` is true.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

/// `log::debug!` when the calling module's `ENABLE_LOGS` is true. Used for
/// per-event noise such as notifications that arrive for untracked videos.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::debug!($($arg)*);
        }
    };
}
