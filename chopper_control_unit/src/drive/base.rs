//! Settings and output stage shared by every drive.

use std::fmt;

use chopper_common::clock::Millis;
use chopper_common::consts::{
    DEFAULT_DEADBAND, DEFAULT_MAX_OUTPUT, DEFAULT_RAMPING, DEFAULT_SPEED_LIMIT, MAX_RAMPING,
};
use tracing::warn;

use crate::filter::math::apply_speed_limit;

/// Receives one normalized motor command in `[-1, 1]`.
///
/// Called from the control loop and, on expiration, from the safety
/// watchdog thread.
pub type MotorSink = Box<dyn Fn(f32) + Send + Sync>;

/// Notified when a setting the motor controller stores itself changes.
pub trait PeripheralSettings: Send + Sync {
    fn ramping_changed(&self, _ramping: u8) {}

    fn deadband_changed(&self, _deadband: f32) {}

    fn expiration_changed(&self, _expiration_ms: Millis) {}
}

/// Per-drive output tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveConfiguration {
    deadband: f32,
    ramping: u8,
    max_output: f32,
    speed_limit: f32,
}

impl Default for DriveConfiguration {
    fn default() -> Self {
        Self {
            deadband: DEFAULT_DEADBAND,
            ramping: DEFAULT_RAMPING,
            max_output: DEFAULT_MAX_OUTPUT,
            speed_limit: DEFAULT_SPEED_LIMIT,
        }
    }
}

impl DriveConfiguration {
    #[inline]
    pub const fn deadband(&self) -> f32 {
        self.deadband
    }

    /// Informational; enforced by the motor controller, not here.
    #[inline]
    pub const fn ramping(&self) -> u8 {
        self.ramping
    }

    #[inline]
    pub const fn max_output(&self) -> f32 {
        self.max_output
    }

    #[inline]
    pub const fn speed_limit(&self) -> f32 {
        self.speed_limit
    }

    /// Accepts `[0, 1)`. Returns whether the value was taken.
    pub fn set_deadband(&mut self, deadband: f32) -> bool {
        if !(0.0..1.0).contains(&deadband) {
            warn!(deadband, "rejected deadband outside [0, 1)");
            return false;
        }
        self.deadband = deadband;
        true
    }

    /// Accepts `0..=80`.
    pub fn set_ramping(&mut self, ramping: u8) -> bool {
        if ramping > MAX_RAMPING {
            warn!(ramping, max = MAX_RAMPING, "rejected ramping value");
            return false;
        }
        self.ramping = ramping;
        true
    }

    /// Accepts `[0, 1]`.
    pub fn set_max_output(&mut self, max_output: f32) -> bool {
        if !(0.0..=1.0).contains(&max_output) {
            warn!(max_output, "rejected max output outside [0, 1]");
            return false;
        }
        self.max_output = max_output;
        true
    }

    /// Accepts `[0, 1]`.
    pub fn set_speed_limit(&mut self, speed_limit: f32) -> bool {
        if !(0.0..=1.0).contains(&speed_limit) {
            warn!(speed_limit, "rejected speed limit outside [0, 1]");
            return false;
        }
        self.speed_limit = speed_limit;
        true
    }

    /// Scale by max output, then clamp by the speed limit.
    #[inline]
    pub fn output(&self, command: f32) -> f32 {
        apply_speed_limit(command * self.max_output, self.speed_limit)
    }
}

/// Peripheral settings hook plus the drive's own configuration. Forwards
/// accepted changes only.
#[derive(Default)]
pub(crate) struct DriveSettings {
    pub(crate) config: DriveConfiguration,
    pub(crate) peripheral: Option<Box<dyn PeripheralSettings>>,
}

impl DriveSettings {
    pub(crate) fn set_deadband(&mut self, deadband: f32) {
        if self.config.set_deadband(deadband) {
            if let Some(peripheral) = &self.peripheral {
                peripheral.deadband_changed(deadband);
            }
        }
    }

    pub(crate) fn set_ramping(&mut self, ramping: u8) {
        if self.config.set_ramping(ramping) {
            if let Some(peripheral) = &self.peripheral {
                peripheral.ramping_changed(ramping);
            }
        }
    }

    pub(crate) fn expiration_changed(&self, expiration_ms: Millis) {
        if let Some(peripheral) = &self.peripheral {
            peripheral.expiration_changed(expiration_ms);
        }
    }
}

impl fmt::Debug for DriveSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriveSettings")
            .field("config", &self.config)
            .field("peripheral", &self.peripheral.is_some())
            .finish()
    }
}
