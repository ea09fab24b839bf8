//! Setup-time errors.
//!
//! Runtime control paths never fail: out-of-range settings are rejected with
//! a warning and the previous value kept. Only construction and bring-up
//! return [`ControlError`].

use chopper_common::config::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControlError {
    /// Configuration file missing, malformed or out of range.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Servo table built with zero channels or more than the peripheral has.
    #[error("servo channel count {requested} outside 1..={max}")]
    InvalidChannelCount { requested: usize, max: usize },

    /// The safety watchdog thread could not be started.
    #[error("failed to spawn safety watchdog: {0}")]
    WatchdogSpawn(#[source] std::io::Error),

    /// Memory locking, CPU affinity or scheduler call failed.
    #[error("RT setup error: {0}")]
    RtSetup(String),
}
