//! TOML configuration for the control unit binary.
//!
//! One file describes the body drive, the dome motor, the safety watchdog,
//! the servo table and stick conditioning. Every section is optional and
//! falls back to the defaults in [`chopper_common::consts`]. Unknown keys are
//! rejected so typos surface at startup instead of silently keeping a
//! default.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use chopper_common::clock::Millis;
use chopper_common::config::{ConfigError, ConfigLoader, SharedConfig};
use chopper_common::consts::{
    DEFAULT_DEADBAND, DEFAULT_MAX_OUTPUT, DEFAULT_RAMPING, DEFAULT_SAFETY_EXPIRATION_MS,
    DEFAULT_SERVO_RATE_LIMIT, DEFAULT_SPEED_LIMIT, MAX_RAMPING, MAX_SERVO_CHANNELS,
    WATCHDOG_WAKE_INTERVAL_MS, WATCHDOG_WAKES_PER_CHECK,
};
use serde::{Deserialize, Serialize};

use crate::drive::{DriveModel, ShapingConfig};
use crate::input::AxisConfig;
use crate::rt::ThreadPlacement;
use crate::safety::WatchdogCadence;
use crate::servo::{Easing, PulseUnit};

// ─── Root ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControlUnitConfig {
    pub shared: SharedConfig,
    pub drive: DriveSection,
    pub dome: DomeSection,
    pub safety: SafetySection,
    pub servo: ServoSection,
    pub input: InputSection,
}

impl ControlUnitConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.drive.output().validate("drive")?;
        self.drive.shaping.validate()?;
        self.dome.output().validate("dome")?;
        self.safety.validate()?;
        self.servo.validate()?;
        self.input.validate()
    }
}

/// Read, parse and validate a configuration file.
pub fn load_config(path: &Path) -> Result<ControlUnitConfig, ConfigError> {
    let config = ControlUnitConfig::load(path)?;
    config.validate()?;
    Ok(config)
}

/// Parse and validate configuration text already in memory.
pub fn load_config_from_str(text: &str) -> Result<ControlUnitConfig, ConfigError> {
    let config = ControlUnitConfig::parse(text)?;
    config.validate()?;
    Ok(config)
}

// ─── Motor output settings ──────────────────────────────────────────

/// Output stage shared by the body drive and the dome motor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputSettings {
    pub deadband: f32,
    pub ramping: u8,
    pub max_output: f32,
    pub speed_limit: f32,
    pub square_inputs: bool,
    pub expiration_ms: Millis,
    pub safety_enabled: bool,
}

impl OutputSettings {
    fn validate(&self, section: &str) -> Result<(), ConfigError> {
        if !(0.0..1.0).contains(&self.deadband) {
            return Err(invalid(format!(
                "{section}.deadband {} outside [0, 1)",
                self.deadband
            )));
        }
        if self.ramping > MAX_RAMPING {
            return Err(invalid(format!(
                "{section}.ramping {} exceeds {MAX_RAMPING}",
                self.ramping
            )));
        }
        if !(0.0..=1.0).contains(&self.max_output) {
            return Err(invalid(format!(
                "{section}.max_output {} outside [0, 1]",
                self.max_output
            )));
        }
        if !(0.0..=1.0).contains(&self.speed_limit) {
            return Err(invalid(format!(
                "{section}.speed_limit {} outside [0, 1]",
                self.speed_limit
            )));
        }
        if self.expiration_ms == 0 {
            return Err(invalid(format!("{section}.expiration_ms must be > 0")));
        }
        Ok(())
    }
}

/// `[drive]`: the two-motor body.
///
/// ```toml
/// [drive]
/// model = "diagonal"
/// speed_limit = 0.6
///
/// [drive.shaping]
/// enabled = true
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriveSection {
    pub model: DriveModel,
    /// Curvature model only.
    pub allow_turn_in_place: bool,
    pub deadband: f32,
    pub ramping: u8,
    pub max_output: f32,
    pub speed_limit: f32,
    pub square_inputs: bool,
    pub expiration_ms: Millis,
    pub safety_enabled: bool,
    pub shaping: ShapingConfig,
}

impl Default for DriveSection {
    fn default() -> Self {
        Self {
            model: DriveModel::default(),
            allow_turn_in_place: true,
            deadband: DEFAULT_DEADBAND,
            ramping: DEFAULT_RAMPING,
            max_output: DEFAULT_MAX_OUTPUT,
            speed_limit: DEFAULT_SPEED_LIMIT,
            square_inputs: true,
            expiration_ms: DEFAULT_SAFETY_EXPIRATION_MS,
            safety_enabled: true,
            shaping: ShapingConfig::default(),
        }
    }
}

impl DriveSection {
    pub const fn output(&self) -> OutputSettings {
        OutputSettings {
            deadband: self.deadband,
            ramping: self.ramping,
            max_output: self.max_output,
            speed_limit: self.speed_limit,
            square_inputs: self.square_inputs,
            expiration_ms: self.expiration_ms,
            safety_enabled: self.safety_enabled,
        }
    }
}

/// `[dome]`: the dome rotation motor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DomeSection {
    pub enabled: bool,
    pub deadband: f32,
    pub ramping: u8,
    pub max_output: f32,
    pub speed_limit: f32,
    pub square_inputs: bool,
    pub expiration_ms: Millis,
    pub safety_enabled: bool,
}

impl Default for DomeSection {
    fn default() -> Self {
        Self {
            enabled: true,
            deadband: DEFAULT_DEADBAND,
            ramping: DEFAULT_RAMPING,
            max_output: DEFAULT_MAX_OUTPUT,
            speed_limit: DEFAULT_SPEED_LIMIT,
            square_inputs: false,
            expiration_ms: DEFAULT_SAFETY_EXPIRATION_MS,
            safety_enabled: true,
        }
    }
}

impl DomeSection {
    pub const fn output(&self) -> OutputSettings {
        OutputSettings {
            deadband: self.deadband,
            ramping: self.ramping,
            max_output: self.max_output,
            speed_limit: self.speed_limit,
            square_inputs: self.square_inputs,
            expiration_ms: self.expiration_ms,
            safety_enabled: self.safety_enabled,
        }
    }
}

// ─── Safety ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SafetySection {
    pub wake_interval_ms: u64,
    pub wakes_per_check: u32,
    /// Core the watchdog thread is pinned to (`rt` feature only).
    pub cpu_core: Option<usize>,
    pub priority: Option<i32>,
}

impl Default for SafetySection {
    fn default() -> Self {
        Self {
            wake_interval_ms: WATCHDOG_WAKE_INTERVAL_MS,
            wakes_per_check: WATCHDOG_WAKES_PER_CHECK,
            cpu_core: None,
            priority: None,
        }
    }
}

impl SafetySection {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.wake_interval_ms == 0 {
            return Err(invalid("safety.wake_interval_ms must be > 0".to_string()));
        }
        if self.wakes_per_check == 0 {
            return Err(invalid("safety.wakes_per_check must be > 0".to_string()));
        }
        if let Some(priority) = self.priority {
            if !(1..=99).contains(&priority) {
                return Err(invalid(format!(
                    "safety.priority {priority} outside [1, 99]"
                )));
            }
        }
        Ok(())
    }

    pub fn cadence(&self) -> WatchdogCadence {
        WatchdogCadence {
            wake_interval: Duration::from_millis(self.wake_interval_ms),
            wakes_per_check: self.wakes_per_check,
        }
    }

    pub fn placement(&self) -> ThreadPlacement {
        ThreadPlacement {
            cpu_core: self.cpu_core,
            priority: self.priority,
        }
    }
}

// ─── Servos ─────────────────────────────────────────────────────────

/// `[servo]` plus one `[[servo.channels]]` table per configured channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServoSection {
    pub channel_count: usize,
    pub pulse_unit: PulseUnit,
    /// Default slew for every channel, quarter-µs per second.
    pub rate_limit: f64,
    pub channels: Vec<ServoChannelConfig>,
}

impl Default for ServoSection {
    fn default() -> Self {
        Self {
            channel_count: MAX_SERVO_CHANNELS,
            pulse_unit: PulseUnit::default(),
            rate_limit: DEFAULT_SERVO_RATE_LIMIT,
            channels: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServoChannelConfig {
    pub channel: u8,
    pub min_pulse: u16,
    pub max_pulse: u16,
    #[serde(default)]
    pub neutral_pulse: Option<u16>,
    #[serde(default)]
    pub easing: Easing,
    /// Overrides `servo.rate_limit` for this channel.
    #[serde(default)]
    pub rate_limit: Option<f64>,
    /// Start pulsing at neutral right after startup.
    #[serde(default)]
    pub enabled: bool,
}

impl ServoSection {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.channel_count == 0 || self.channel_count > MAX_SERVO_CHANNELS {
            return Err(invalid(format!(
                "servo.channel_count {} outside [1, {MAX_SERVO_CHANNELS}]",
                self.channel_count
            )));
        }
        if !(self.rate_limit > 0.0) {
            return Err(invalid(format!(
                "servo.rate_limit {} must be > 0",
                self.rate_limit
            )));
        }

        let mut seen = HashSet::new();
        for ch in &self.channels {
            let id = ch.channel;
            if usize::from(id) >= self.channel_count {
                return Err(invalid(format!(
                    "servo channel {id} out of range [0, {})",
                    self.channel_count
                )));
            }
            if !seen.insert(id) {
                return Err(invalid(format!("duplicate servo channel {id}")));
            }
            if ch.min_pulse == 0 || ch.min_pulse > ch.max_pulse {
                return Err(invalid(format!(
                    "servo channel {id}: invalid range [{}, {}]",
                    ch.min_pulse, ch.max_pulse
                )));
            }
            if let Some(neutral) = ch.neutral_pulse {
                if !(ch.min_pulse..=ch.max_pulse).contains(&neutral) {
                    return Err(invalid(format!(
                        "servo channel {id}: neutral {neutral} outside range"
                    )));
                }
            }
            if let Some(rate) = ch.rate_limit {
                if !(rate > 0.0) {
                    return Err(invalid(format!(
                        "servo channel {id}: rate_limit {rate} must be > 0"
                    )));
                }
            }
        }
        Ok(())
    }
}

// ─── Input ──────────────────────────────────────────────────────────

/// `[input.<axis>]` conditioning for the four stick axes.
///
/// Left stick Y is throttle, left X is turning, right X spins the dome.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InputSection {
    pub left_x: AxisConfig,
    pub left_y: AxisConfig,
    pub right_x: AxisConfig,
    pub right_y: AxisConfig,
}

impl InputSection {
    fn validate(&self) -> Result<(), ConfigError> {
        self.left_x.validate("left_x")?;
        self.left_y.validate("left_y")?;
        self.right_x.validate("right_x")?;
        self.right_y.validate("right_y")
    }
}

#[inline]
fn invalid(message: String) -> ConfigError {
    ConfigError::ValidationError(message)
}
