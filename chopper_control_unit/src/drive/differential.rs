//! Two-motor skid-steer drive.

use std::sync::Arc;

use chopper_common::clock::{Clock, Millis};
use parking_lot::Mutex;
use tracing::debug;

use super::base::{DriveConfiguration, DriveSettings, MotorSink, PeripheralSettings};
use super::kinematics::{
    DriveModel, WheelSpeeds, arcade_ik, curvature_ik, diagonal_ik, tank_ik,
};
use super::shaping::{DriveShaper, ShapingConfig};
use crate::error::ControlError;
use crate::filter::math::apply_deadband;
use crate::safety::{MotorSafety, SafetyMonitor, SafetyTrackedActuator};

const DESCRIPTION: &str = "DifferentialDrive";

/// The part of the drive shared with the safety watchdog.
struct DifferentialMotors {
    safety: MotorSafety,
    left: MotorSink,
    right: MotorSink,
    outputs: Mutex<WheelSpeeds>,
}

impl DifferentialMotors {
    fn write(&self, speeds: WheelSpeeds) {
        *self.outputs.lock() = speeds;
        (self.left)(speeds.left);
        (self.right)(speeds.right);
        self.safety.feed();
    }
}

impl SafetyTrackedActuator for DifferentialMotors {
    fn safety(&self) -> &MotorSafety {
        &self.safety
    }

    fn stop_motor(&self) {
        self.write(WheelSpeeds::STOPPED);
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }
}

/// Left/right motor pair driven through one of the [`DriveModel`]s or the
/// legacy [`DriveShaper`].
///
/// Every drive call runs deadband → kinematics → max output → speed limit →
/// motor sinks → feed.
pub struct DifferentialDrive {
    motors: Arc<DifferentialMotors>,
    settings: DriveSettings,
    shaper: DriveShaper,
}

impl DifferentialDrive {
    /// Build the drive and register it with `monitor`.
    pub fn new(
        left: MotorSink,
        right: MotorSink,
        clock: Arc<dyn Clock>,
        monitor: &SafetyMonitor,
    ) -> Result<Self, ControlError> {
        let motors = Arc::new(DifferentialMotors {
            safety: MotorSafety::new(clock),
            left,
            right,
            outputs: Mutex::new(WheelSpeeds::STOPPED),
        });
        monitor.register(&motors)?;

        Ok(Self {
            motors,
            settings: DriveSettings::default(),
            shaper: DriveShaper::new(ShapingConfig::default()),
        })
    }

    /// Forward ramping, deadband and expiration changes to the motor
    /// controller.
    pub fn with_peripheral(mut self, peripheral: Box<dyn PeripheralSettings>) -> Self {
        self.settings.peripheral = Some(peripheral);
        self
    }

    pub fn with_shaping(mut self, config: ShapingConfig) -> Self {
        self.shaper = DriveShaper::new(config);
        self
    }

    // ─── Drive calls ────────────────────────────────────────────────

    pub fn arcade_drive(&mut self, x_speed: f32, z_rotation: f32, square_inputs: bool) {
        let (x, z) = (self.deadband(x_speed), self.deadband(z_rotation));
        self.emit(arcade_ik(x, z, square_inputs));
    }

    pub fn curvature_drive(
        &mut self,
        x_speed: f32,
        z_rotation: f32,
        allow_turn_in_place: bool,
        square_inputs: bool,
    ) {
        let (x, z) = (self.deadband(x_speed), self.deadband(z_rotation));
        self.emit(curvature_ik(x, z, allow_turn_in_place, square_inputs));
    }

    pub fn diagonal_drive(&mut self, x_speed: f32, z_rotation: f32, square_inputs: bool) {
        let (x, z) = (self.deadband(x_speed), self.deadband(z_rotation));
        self.emit(diagonal_ik(x, z, square_inputs));
    }

    pub fn tank_drive(&mut self, left_speed: f32, right_speed: f32, square_inputs: bool) {
        let (l, r) = (self.deadband(left_speed), self.deadband(right_speed));
        self.emit(tank_ik(l, r, square_inputs));
    }

    /// Drive with a model picked at runtime.
    pub fn drive_with(&mut self, model: DriveModel, a: f32, b: f32, square_inputs: bool) {
        let (a, b) = (self.deadband(a), self.deadband(b));
        self.emit(model.solve(a, b, square_inputs));
    }

    /// Drive through the acceleration shaper, which has its own deadzone.
    /// Returns `false` when the command was rate-gated and nothing was
    /// written.
    pub fn shaped_drive(&mut self, throttle: f32, turning: f32) -> bool {
        let now = self.now();
        match self.shaper.step(throttle, turning, now) {
            Some(speeds) => {
                self.emit(speeds);
                true
            }
            None => false,
        }
    }

    /// Zero both motors and feed.
    pub fn stop_motor(&self) {
        self.motors.stop_motor();
    }

    // ─── Settings ───────────────────────────────────────────────────

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
        if self.motors.safety.set_expiration(expiration_ms) {
            self.settings.expiration_changed(expiration_ms);
        }
    }

    pub fn set_safety_enabled(&self, enabled: bool) {
        self.motors.safety.set_safety_enabled(enabled);
    }

    pub fn feed(&self) {
        self.motors.safety.feed();
    }

    // ─── Accessors ──────────────────────────────────────────────────

    pub fn config(&self) -> &DriveConfiguration {
        &self.settings.config
    }

    pub fn shaper(&self) -> &DriveShaper {
        &self.shaper
    }

    pub fn safety(&self) -> &MotorSafety {
        &self.motors.safety
    }

    /// Last wheel commands written to the sinks.
    pub fn outputs(&self) -> WheelSpeeds {
        *self.motors.outputs.lock()
    }

    pub fn description(&self) -> &str {
        DESCRIPTION
    }

    // ─── Pipeline ───────────────────────────────────────────────────

    #[inline]
    fn deadband(&self, value: f32) -> f32 {
        apply_deadband(value, self.settings.config.deadband(), 1.0)
    }

    #[inline]
    fn now(&self) -> Millis {
        self.motors.safety.clock().now_ms()
    }

    fn emit(&mut self, speeds: WheelSpeeds) {
        let config = &self.settings.config;
        let out = WheelSpeeds::new(config.output(speeds.left), config.output(speeds.right));
        debug!(left = out.left, right = out.right, "drive");
        self.motors.write(out);
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
