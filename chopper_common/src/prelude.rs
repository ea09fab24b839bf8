//! Prelude module for common re-exports.
//!
//! ```rust
//! use chopper_common::prelude::*;
//! ```

// ─── Logging ────────────────────────────────────────────────────────
pub use crate::config::LogLevel;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, SharedConfig};

// ─── Time ───────────────────────────────────────────────────────────
pub use crate::clock::{Clock, ManualClock, Millis, MonotonicClock};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{
    DEFAULT_SAFETY_EXPIRATION_MS, MAX_SERVO_CHANNELS, WATCHDOG_WAKE_INTERVAL_MS,
    WATCHDOG_WAKES_PER_CHECK,
};
