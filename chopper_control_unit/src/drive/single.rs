//! One-motor drive, used for the dome rotation motor.

use std::sync::Arc;

use chopper_common::clock::{Clock, Millis};
use parking_lot::Mutex;

use super::base::{DriveConfiguration, DriveSettings, MotorSink, PeripheralSettings};
use crate::error::ControlError;
use crate::filter::math::{apply_deadband, square_preserving_sign};
use crate::safety::{MotorSafety, SafetyMonitor, SafetyTrackedActuator};

const DESCRIPTION: &str = "SingleDrive";

struct SingleMotor {
    safety: MotorSafety,
    motor: MotorSink,
    output: Mutex<f32>,
}

impl SingleMotor {
    fn write(&self, output: f32) {
        *self.output.lock() = output;
        (self.motor)(output);
        self.safety.feed();
    }
}

impl SafetyTrackedActuator for SingleMotor {
    fn safety(&self) -> &MotorSafety {
        &self.safety
    }

    fn stop_motor(&self) {
        self.write(0.0);
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }
}

pub struct SingleDrive {
    motor: Arc<SingleMotor>,
    settings: DriveSettings,
}

impl SingleDrive {
    pub fn new(
        motor: MotorSink,
        clock: Arc<dyn Clock>,
        monitor: &SafetyMonitor,
    ) -> Result<Self, ControlError> {
        let motor = Arc::new(SingleMotor {
            safety: MotorSafety::new(clock),
            motor,
            output: Mutex::new(0.0),
        });
        monitor.register(&motor)?;
        Ok(Self {
            motor,
            settings: DriveSettings::default(),
        })
    }

    pub fn with_peripheral(mut self, peripheral: Box<dyn PeripheralSettings>) -> Self {
        self.settings.peripheral = Some(peripheral);
        self
    }

    /// deadband → clamp/square → max output → speed limit → motor → feed.
    pub fn drive(&mut self, speed: f32, square_inputs: bool) {
        let config = &self.settings.config;
        let speed = apply_deadband(speed, config.deadband(), 1.0).clamp(-1.0, 1.0);
        let speed = if square_inputs {
            square_preserving_sign(speed)
        } else {
            speed
        };
        self.motor.write(config.output(speed));
    }

    pub fn stop_motor(&self) {
        self.motor.stop_motor();
    }

    pub fn set_deadband(&mut self, deadband: f32) {
        self.settings.set_deadband(deadband);
    }

    pub fn set_ramping_value(&mut self, ramping: u8) {
        self.settings.set_ramping(ramping);
    }

    pub fn set_max_output(&mut self, max_output: f32) {
        self.settings.config.set_max_output(max_output);
    }

    pub fn set_speed_limit(&mut self, speed_limit: f32) {
        self.settings.config.set_speed_limit(speed_limit);
    }

    pub fn set_expiration(&mut self, expiration_ms: Millis) {
        if self.motor.safety.set_expiration(expiration_ms) {
            self.settings.expiration_changed(expiration_ms);
        }
    }

    pub fn set_safety_enabled(&self, enabled: bool) {
        self.motor.safety.set_safety_enabled(enabled);
    }

    pub fn config(&self) -> &DriveConfiguration {
        &self.settings.config
    }

    pub fn safety(&self) -> &MotorSafety {
        &self.motor.safety
    }

    pub fn output(&self) -> f32 {
        *self.motor.output.lock()
    }

    pub fn description(&self) -> &str {
        DESCRIPTION
    }
}
