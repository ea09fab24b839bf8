//! System-wide constants for the Chopper workspace.
//!
//! Single source of truth for limits, defaults and timing cadences.

use static_assertions::const_assert;

// ─── Safety Watchdog ────────────────────────────────────────────────

/// Wake period of the safety watchdog thread.
pub const WATCHDOG_WAKE_INTERVAL_MS: u64 = 100;

/// The watchdog checks actuators on every Nth wake (≈400 ms).
pub const WATCHDOG_WAKES_PER_CHECK: u32 = 4;

/// Expiration window given to a freshly constructed actuator.
pub const DEFAULT_SAFETY_EXPIRATION_MS: u64 = 100;

// ─── Drive ──────────────────────────────────────────────────────────

/// Axis magnitude mapped to zero.
pub const DEFAULT_DEADBAND: f32 = 0.05;

/// Motor controller ramping value (peripheral units).
pub const DEFAULT_RAMPING: u8 = 80;

/// Largest ramping value the motor controller accepts.
pub const MAX_RAMPING: u8 = 80;

pub const DEFAULT_MAX_OUTPUT: f32 = 1.0;

pub const DEFAULT_SPEED_LIMIT: f32 = 0.8;

/// Ratio above which deadband rescaling degrades to offset subtraction.
pub const DEADBAND_RESCALE_RATIO_LIMIT: f32 = 1e12;

// ─── Servo ──────────────────────────────────────────────────────────

/// Channels on the largest supported servo controller.
pub const MAX_SERVO_CHANNELS: usize = 24;

/// Pulse positions are expressed in quarter-microseconds.
pub const QUARTER_US_PER_US: u16 = 4;

/// 1.0 ms pulse.
pub const SERVO_PULSE_MIN: u16 = 4000;

/// 1.5 ms pulse.
pub const SERVO_PULSE_NEUTRAL: u16 = 6000;

/// 2.0 ms pulse.
pub const SERVO_PULSE_MAX: u16 = 8000;

/// Per-channel slew limit in quarter-microseconds per second.
pub const DEFAULT_SERVO_RATE_LIMIT: f64 = 16_000.0;

// ─── Control Loop ───────────────────────────────────────────────────

/// Default control loop period.
pub const DEFAULT_TICK_MS: u64 = 25;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/chopper/chopper.toml";

const_assert!(MAX_SERVO_CHANNELS <= u8::MAX as usize);
const_assert!(WATCHDOG_WAKES_PER_CHECK > 0);
const_assert!(SERVO_PULSE_MIN < SERVO_PULSE_NEUTRAL && SERVO_PULSE_NEUTRAL < SERVO_PULSE_MAX);
const_assert!(DEFAULT_RAMPING <= MAX_RAMPING);
