//! Gamepad input conditioning.
//!
//! Raw stick axes arrive as integers (typically -512..=512). Each axis is
//! inverted and offset as configured, normalized to `[-1, 1]` and then
//! slew-limited before it reaches a drive.

use std::collections::VecDeque;

use chopper_common::clock::Millis;
use chopper_common::config::ConfigError;
use heapless::Vec as FixedVec;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::filter::RateLimiter;

/// Servo commands one frame may carry.
pub const MAX_FRAME_SERVO_COMMANDS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AxisConfig {
    pub offset: i32,
    pub invert: bool,
    pub input_min: i32,
    pub input_max: i32,
    /// Rising slew in normalized units per second.
    pub slew_positive: f64,
    /// Falling slew, negative.
    pub slew_negative: f64,
}

impl Default for AxisConfig {
    fn default() -> Self {
        Self {
            offset: 0,
            invert: false,
            input_min: -512,
            input_max: 512,
            slew_positive: 0.75,
            slew_negative: -0.75,
        }
    }
}

impl AxisConfig {
    pub fn validate(&self, name: &str) -> Result<(), ConfigError> {
        if self.input_max <= self.input_min {
            return Err(ConfigError::ValidationError(format!(
                "input.{name}: input_max must exceed input_min"
            )));
        }
        if !(self.slew_positive > self.slew_negative) {
            return Err(ConfigError::ValidationError(format!(
                "input.{name}: slew_positive must exceed slew_negative"
            )));
        }
        Ok(())
    }
}

/// One stick axis: invert, offset, normalize, slew.
#[derive(Debug, Clone, Copy)]
pub struct AxisConditioner {
    offset: i32,
    invert: bool,
    input_range: (i32, i32),
    output_range: (f64, f64),
    slew: RateLimiter,
}

impl AxisConditioner {
    pub fn new(config: &AxisConfig, now: Millis) -> Self {
        Self {
            offset: config.offset,
            invert: config.invert,
            input_range: (config.input_min, config.input_max),
            output_range: (-1.0, 1.0),
            slew: RateLimiter::new(config.slew_positive, config.slew_negative, 0.0, now),
        }
    }

    /// Conditioned value for one raw sample.
    pub fn condition(&mut self, raw: i32, now: Millis) -> f32 {
        let raw = if self.invert { raw.saturating_neg() } else { raw };
        let normalized = self.normalize(raw.saturating_add(self.offset));
        self.slew.calculate(normalized, now) as f32
    }

    /// Linear map from the input range onto the output range, clamped.
    pub fn normalize(&self, raw: i32) -> f64 {
        let (in_min, in_max) = self.input_range;
        let (out_min, out_max) = self.output_range;
        let fraction = f64::from(raw - in_min) / f64::from(in_max - in_min);
        ((out_max - out_min) * fraction + out_min).clamp(out_min, out_max)
    }

    pub fn set_offset(&mut self, offset: i32) {
        self.offset = offset;
    }

    pub fn set_invert(&mut self, invert: bool) {
        self.invert = invert;
    }

    pub fn set_input_range(&mut self, min: i32, max: i32) -> bool {
        if max <= min {
            warn!(min, max, "rejected input range: max <= min");
            return false;
        }
        self.input_range = (min, max);
        true
    }

    pub fn set_output_range(&mut self, min: f64, max: f64) -> bool {
        if !(max > min) {
            warn!(min, max, "rejected output range: max <= min");
            return false;
        }
        self.output_range = (min, max);
        true
    }

    /// Replace the slew limits, keeping the current value.
    pub fn set_slew(&mut self, positive: f64, negative: f64) -> bool {
        if !(positive > negative) {
            warn!(positive, negative, "rejected axis slew: positive <= negative");
            return false;
        }
        self.slew.reset(
            positive,
            negative,
            self.slew.last_value(),
            self.slew.last_timestamp(),
        );
        true
    }

    /// Last conditioned output.
    pub fn value(&self) -> f32 {
        self.slew.last_value() as f32
    }
}

// ─── Controller frames ──────────────────────────────────────────────

/// Servo request carried alongside stick data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServoCommand {
    MoveTo {
        channel: u8,
        pulse: u16,
        duration_ms: Millis,
    },
    Position {
        channel: u8,
        pulse: u16,
    },
    Manual {
        channel: u8,
        manual: bool,
    },
    Enable(u8),
    Disable(u8),
    DisableAll,
}

/// One poll of the paired controllers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControllerFrame {
    pub left_x: i32,
    pub left_y: i32,
    pub right_x: i32,
    pub right_y: i32,
    pub servo_commands: FixedVec<ServoCommand, MAX_FRAME_SERVO_COMMANDS>,
}

/// Whatever delivers controller frames: a gamepad link, a replay, a script.
///
/// `None` means no fresh data this tick (link down, controller idle).
pub trait InputSource {
    fn poll(&mut self, now: Millis) -> Option<ControllerFrame>;
}

/// Replays a fixed list of frames, one per poll.
///
/// A holding script keeps returning the last frame (minus its servo
/// commands) once the list runs out; otherwise it goes silent.
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    frames: VecDeque<ControllerFrame>,
    held: Option<ControllerFrame>,
    hold_last: bool,
}

impl ScriptedInput {
    pub fn new(frames: impl IntoIterator<Item = ControllerFrame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            held: None,
            hold_last: false,
        }
    }

    pub fn holding(frames: impl IntoIterator<Item = ControllerFrame>) -> Self {
        Self {
            hold_last: true,
            ..Self::new(frames)
        }
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl InputSource for ScriptedInput {
    fn poll(&mut self, _now: Millis) -> Option<ControllerFrame> {
        match self.frames.pop_front() {
            Some(frame) => {
                if self.hold_last {
                    self.held = Some(ControllerFrame {
                        servo_commands: FixedVec::new(),
                        ..frame.clone()
                    });
                }
                Some(frame)
            }
            None => self.held.clone(),
        }
    }
}
