//! Acceleration and deceleration shaping for the legacy stick drive.
//!
//! Targets are not applied at once: each accepted command moves the driven
//! throttle and turning toward the stick by a fraction of the remaining
//! distance, using a faster scale when slowing down than when speeding up.
//! Commands closer together than the motor controller's serial latency are
//! dropped.

use chopper_common::clock::Millis;
use chopper_common::config::ConfigError;
use serde::{Deserialize, Serialize};

use super::kinematics::{WheelSpeeds, diagonal_ik};

/// Smallest step taken toward a target, one hundredth of full scale.
const MIN_STEP: f32 = 0.01;

/// Turning authority lost at full throttle.
const TURN_DAMPING_AT_FULL_THROTTLE: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShapingConfig {
    /// Route stick input through the shaper instead of the selected model.
    pub enabled: bool,
    /// Step toward targets; when off, targets apply immediately.
    pub scaling: bool,
    /// Rotate throttle/turning 45° into left/right; when off they pass
    /// straight through as left/right.
    pub channel_mixing: bool,
    pub throttle_inverted: bool,
    pub turn_inverted: bool,
    /// Commands within this window of the last accepted one are dropped.
    pub command_latency_ms: Millis,
    pub input_deadzone: f32,
    pub turn_exponent: f32,
    pub throttle_acceleration_scale: f32,
    pub throttle_deceleration_scale: f32,
    pub turn_acceleration_scale: f32,
    pub turn_deceleration_scale: f32,
}

impl Default for ShapingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            scaling: true,
            channel_mixing: true,
            throttle_inverted: false,
            turn_inverted: false,
            command_latency_ms: 25,
            input_deadzone: 0.2,
            turn_exponent: 1.4,
            throttle_acceleration_scale: 100.0,
            throttle_deceleration_scale: 20.0,
            turn_acceleration_scale: 200.0,
            turn_deceleration_scale: 20.0,
        }
    }
}

impl ShapingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..1.0).contains(&self.input_deadzone) {
            return Err(ConfigError::ValidationError(format!(
                "shaping.input_deadzone {} outside [0, 1)",
                self.input_deadzone
            )));
        }
        if !(self.turn_exponent > 0.0) {
            return Err(ConfigError::ValidationError(format!(
                "shaping.turn_exponent {} must be > 0",
                self.turn_exponent
            )));
        }
        let scales = [
            ("throttle_acceleration_scale", self.throttle_acceleration_scale),
            ("throttle_deceleration_scale", self.throttle_deceleration_scale),
            ("turn_acceleration_scale", self.turn_acceleration_scale),
            ("turn_deceleration_scale", self.turn_deceleration_scale),
        ];
        for (name, scale) in scales {
            if !(scale >= 1.0) {
                return Err(ConfigError::ValidationError(format!(
                    "shaping.{name} {scale} must be >= 1"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveShaper {
    config: ShapingConfig,
    throttle: f32,
    turning: f32,
    last_command: Option<Millis>,
}

impl DriveShaper {
    pub const fn new(config: ShapingConfig) -> Self {
        Self {
            config,
            throttle: 0.0,
            turning: 0.0,
            last_command: None,
        }
    }

    #[inline]
    pub const fn config(&self) -> &ShapingConfig {
        &self.config
    }

    /// Currently driven `(throttle, turning)`.
    #[inline]
    pub const fn driven(&self) -> (f32, f32) {
        (self.throttle, self.turning)
    }

    /// Forget driven values; the next command starts from rest.
    pub fn reset(&mut self) {
        self.throttle = 0.0;
        self.turning = 0.0;
        self.last_command = None;
    }

    /// Shape one stick sample. `None` when rate-gated.
    pub fn step(&mut self, throttle: f32, turning: f32, now: Millis) -> Option<WheelSpeeds> {
        if let Some(last) = self.last_command {
            if now.saturating_sub(last) <= self.config.command_latency_ms {
                return None;
            }
        }

        let mut throttle = throttle.clamp(-1.0, 1.0);
        let mut turning = turning.clamp(-1.0, 1.0);
        if self.config.throttle_inverted {
            throttle = -throttle;
        }
        if self.config.turn_inverted {
            turning = -turning;
        }

        let deadzone = self.config.input_deadzone;
        let throttle_target = if throttle.abs() < deadzone {
            0.0
        } else {
            throttle
        };
        let turning_target = if turning.abs() < deadzone {
            0.0
        } else {
            (turning.abs() - deadzone)
                .powf(self.config.turn_exponent)
                .copysign(turning)
        };

        if self.config.scaling {
            self.throttle = approach(
                self.throttle,
                throttle_target,
                self.config.throttle_acceleration_scale,
                self.config.throttle_deceleration_scale,
            );
            let damped =
                turning_target * (1.0 - self.throttle.abs() * TURN_DAMPING_AT_FULL_THROTTLE);
            self.turning = approach(
                self.turning,
                damped,
                self.config.turn_acceleration_scale,
                self.config.turn_deceleration_scale,
            );
        } else {
            self.throttle = throttle_target;
            self.turning = turning_target;
        }
        self.last_command = Some(now);

        let speeds = if self.config.channel_mixing {
            diagonal_ik(self.throttle, self.turning, false)
        } else {
            WheelSpeeds::new(self.throttle.clamp(-1.0, 1.0), self.turning.clamp(-1.0, 1.0))
        };
        Some(speeds)
    }
}

/// Step `current` toward `target`, quantized to hundredths, never past it.
///
/// Deceleration applies while `current` sits on the far side of zero from
/// the direction of travel, i.e. its magnitude is shrinking.
fn approach(current: f32, target: f32, accel_scale: f32, decel_scale: f32) -> f32 {
    if current == target {
        return current;
    }
    let rising = target > current;
    let decelerating = if rising { current < 0.0 } else { current > 0.0 };
    let scale = if decelerating { decel_scale } else { accel_scale };
    let step = ((target - current).abs() / scale).max(MIN_STEP);

    if rising {
        quantize(current + step).min(target)
    } else {
        quantize(current - step).max(target)
    }
}

#[inline]
fn quantize(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}

// ─── Tests ──────────────────────────────────────────────────────────
