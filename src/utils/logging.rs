//! Logging macros gated on a module-level `ENABLE_LOGS` flag.
//!
//! The periodic loops (clock, detection) log on every tick; the flag lets a
//! module silence that chatter without touching `RUST_LOG` for the whole crate.
//!
//! ```rust,ignore
//! const ENABLE_LOGS: bool = true;
//! use crate::{log_debug, log_warn};
//!
//! log_debug!("tick {}", n);
//! ```

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::debug!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}
