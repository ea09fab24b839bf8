//! Fixed-period control loop.
//!
//! Every tick polls the input source, conditions the sticks, drives the body
//! and dome, applies queued servo commands and animates the servo table. A
//! tick without a fresh frame writes nothing to the motors, so the safety
//! watchdog stops them once their expiration window lapses.
//!
//! Pacing uses absolute deadlines (`next_wake += period`) so a slow tick does
//! not shift every following one.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chopper_common::clock::{Clock, Millis};
use tracing::{debug, info, warn};

use crate::config::{ControlUnitConfig, OutputSettings};
use crate::drive::{DifferentialDrive, DriveModel, MotorSink, PeripheralSettings, SingleDrive};
use crate::error::ControlError;
use crate::input::{AxisConditioner, ControllerFrame, InputSource, ServoCommand};
use crate::safety::SafetyMonitor;
use crate::servo::{PulseSink, ServoDispatchTable};

// ─── Cycle Statistics ───────────────────────────────────────────────

/// Tick timing and input bookkeeping. O(1) per record, no allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleStats {
    pub cycle_count: u64,
    /// Last tick body duration [ns].
    pub last_cycle_ns: u64,
    pub min_cycle_ns: u64,
    pub max_cycle_ns: u64,
    pub sum_cycle_ns: u64,
    /// Ticks whose body ran longer than the period.
    pub overruns: u64,
    /// Ticks that received a controller frame.
    pub frames: u64,
}

impl CycleStats {
    pub const fn new() -> Self {
        Self {
            cycle_count: 0,
            last_cycle_ns: 0,
            min_cycle_ns: u64::MAX,
            max_cycle_ns: 0,
            sum_cycle_ns: 0,
            overruns: 0,
            frames: 0,
        }
    }

    #[inline]
    pub fn record(&mut self, duration_ns: u64) {
        self.cycle_count += 1;
        self.last_cycle_ns = duration_ns;
        self.min_cycle_ns = self.min_cycle_ns.min(duration_ns);
        self.max_cycle_ns = self.max_cycle_ns.max(duration_ns);
        self.sum_cycle_ns = self.sum_cycle_ns.saturating_add(duration_ns);
    }

    #[inline]
    pub fn avg_cycle_ns(&self) -> u64 {
        if self.cycle_count == 0 {
            0
        } else {
            self.sum_cycle_ns / self.cycle_count
        }
    }

    /// Ticks that ran without input.
    #[inline]
    pub const fn missed_frames(&self) -> u64 {
        self.cycle_count.saturating_sub(self.frames)
    }
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Hardware bundle ────────────────────────────────────────────────

/// Output endpoints handed to the runner at construction.
pub struct CycleHardware {
    pub left: MotorSink,
    pub right: MotorSink,
    pub dome: MotorSink,
    pub pulses: Box<dyn PulseSink>,
    pub body_peripheral: Option<Box<dyn PeripheralSettings>>,
    pub dome_peripheral: Option<Box<dyn PeripheralSettings>>,
}

/// Conditioners for the four stick axes.
#[derive(Debug, Clone, Copy)]
struct Sticks {
    left_x: AxisConditioner,
    left_y: AxisConditioner,
    right_x: AxisConditioner,
    right_y: AxisConditioner,
}

// ─── Runner ─────────────────────────────────────────────────────────

pub struct CycleRunner {
    drive: DifferentialDrive,
    dome: Option<SingleDrive>,
    servos: ServoDispatchTable,
    sticks: Sticks,
    input: Box<dyn InputSource>,
    clock: Arc<dyn Clock>,
    model: DriveModel,
    shaping: bool,
    allow_turn_in_place: bool,
    body_square: bool,
    dome_square: bool,
    stats: CycleStats,
}

impl CycleRunner {
    /// Build every actuator from `config` and register them with `monitor`.
    pub fn new(
        config: &ControlUnitConfig,
        hardware: CycleHardware,
        input: Box<dyn InputSource>,
        clock: Arc<dyn Clock>,
        monitor: &SafetyMonitor,
    ) -> Result<Self, ControlError> {
        let CycleHardware {
            left,
            right,
            dome,
            pulses,
            body_peripheral,
            dome_peripheral,
        } = hardware;

        let mut drive = DifferentialDrive::new(left, right, clock.clone(), monitor)?
            .with_shaping(config.drive.shaping);
        if let Some(peripheral) = body_peripheral {
            drive = drive.with_peripheral(peripheral);
        }
        configure_body(&mut drive, &config.drive.output());

        let dome = if config.dome.enabled {
            let mut single = SingleDrive::new(dome, clock.clone(), monitor)?;
            if let Some(peripheral) = dome_peripheral {
                single = single.with_peripheral(peripheral);
            }
            configure_dome(&mut single, &config.dome.output());
            Some(single)
        } else {
            None
        };

        let servo = &config.servo;
        let mut servos =
            ServoDispatchTable::new(servo.channel_count, servo.pulse_unit, pulses, clock.clone())?;
        for channel in 0..servo.channel_count {
            // channel_count is bounded by MAX_SERVO_CHANNELS
            servos.set_rate_limit(channel as u8, servo.rate_limit);
        }
        for ch in &servo.channels {
            servos.set_range(ch.channel, ch.min_pulse, ch.max_pulse);
            if let Some(neutral) = ch.neutral_pulse {
                servos.set_neutral(ch.channel, neutral);
            }
            servos.set_easing(ch.channel, ch.easing);
            if let Some(rate) = ch.rate_limit {
                servos.set_rate_limit(ch.channel, rate);
            }
            if ch.enabled {
                servos.enable(ch.channel);
            }
        }

        let now = clock.now_ms();
        let input_config = &config.input;
        let sticks = Sticks {
            left_x: AxisConditioner::new(&input_config.left_x, now),
            left_y: AxisConditioner::new(&input_config.left_y, now),
            right_x: AxisConditioner::new(&input_config.right_x, now),
            right_y: AxisConditioner::new(&input_config.right_y, now),
        };

        info!(
            model = ?config.drive.model,
            shaping = config.drive.shaping.enabled,
            dome = config.dome.enabled,
            servo_channels = servo.channel_count,
            "control loop configured"
        );

        Ok(Self {
            drive,
            dome,
            servos,
            sticks,
            input,
            clock,
            model: config.drive.model,
            shaping: config.drive.shaping.enabled,
            allow_turn_in_place: config.drive.allow_turn_in_place,
            body_square: config.drive.square_inputs,
            dome_square: config.dome.square_inputs,
            stats: CycleStats::new(),
        })
    }

    /// One control tick. Returns whether a frame was received.
    pub fn tick(&mut self) -> bool {
        let now = self.clock.now_ms();
        let frame = self.input.poll(now);
        let received = frame.is_some();
        if let Some(frame) = frame {
            self.apply_frame(&frame, now);
            self.stats.frames += 1;
        }
        self.servos.animate();
        received
    }

    fn apply_frame(&mut self, frame: &ControllerFrame, now: Millis) {
        let turning = self.sticks.left_x.condition(frame.left_x, now);
        let throttle = self.sticks.left_y.condition(frame.left_y, now);
        let dome = self.sticks.right_x.condition(frame.right_x, now);
        let right_y = self.sticks.right_y.condition(frame.right_y, now);

        if self.shaping {
            self.drive.shaped_drive(throttle, turning);
        } else {
            match self.model {
                DriveModel::Curvature => self.drive.curvature_drive(
                    throttle,
                    turning,
                    self.allow_turn_in_place,
                    self.body_square,
                ),
                DriveModel::Tank => self.drive.tank_drive(throttle, right_y, self.body_square),
                model => self.drive.drive_with(model, throttle, turning, self.body_square),
            }
        }

        if let Some(single) = self.dome.as_mut() {
            single.drive(dome, self.dome_square);
        }

        for command in &frame.servo_commands {
            self.apply_servo_command(*command);
        }
    }

    fn apply_servo_command(&mut self, command: ServoCommand) {
        debug!(?command, "servo command");
        match command {
            ServoCommand::MoveTo {
                channel,
                pulse,
                duration_ms,
            } => {
                self.servos.move_to(channel, pulse, duration_ms);
            }
            ServoCommand::Position { channel, pulse } => {
                self.servos.set_position(channel, pulse);
            }
            ServoCommand::Manual { channel, manual } => {
                self.servos.set_manual(channel, manual);
            }
            ServoCommand::Enable(channel) => {
                self.servos.enable(channel);
            }
            ServoCommand::Disable(channel) => {
                self.servos.disable(channel);
            }
            ServoCommand::DisableAll => self.servos.disable_all(),
        }
    }

    /// Tick every `period` until `running` clears or `max_ticks` have run,
    /// then stop every actuator.
    pub fn run(
        &mut self,
        period: Duration,
        running: &AtomicBool,
        max_ticks: Option<u64>,
    ) -> CycleStats {
        let period_ns = period.as_nanos() as u64;
        let mut next_wake = Instant::now();
        info!(period_ms = period.as_millis() as u64, ?max_ticks, "control loop started");

        while running.load(Ordering::Relaxed)
            && max_ticks.is_none_or(|limit| self.stats.cycle_count < limit)
        {
            next_wake += period;
            let started = Instant::now();
            self.tick();
            let duration_ns = started.elapsed().as_nanos() as u64;
            self.stats.record(duration_ns);

            if duration_ns > period_ns {
                self.stats.overruns += 1;
                debug!(duration_ns, period_ns, "control tick overrun");
            }

            let now = Instant::now();
            if next_wake > now {
                std::thread::sleep(next_wake - now);
            } else {
                // Too far behind to catch up; restart pacing from here.
                next_wake = now;
            }
        }

        self.shutdown();
        let stats = self.stats;
        info!(
            ticks = stats.cycle_count,
            frames = stats.frames,
            overruns = stats.overruns,
            avg_ns = stats.avg_cycle_ns(),
            max_ns = stats.max_cycle_ns,
            "control loop stopped"
        );
        if stats.overruns > 0 {
            warn!(overruns = stats.overruns, "control loop overran its period");
        }
        stats
    }

    /// Zero the motors and drop every servo pulse.
    pub fn shutdown(&mut self) {
        self.drive.stop_motor();
        if let Some(single) = self.dome.as_ref() {
            single.stop_motor();
        }
        self.servos.disable_all();
    }

    // ─── Accessors ──────────────────────────────────────────────────

    pub fn drive(&self) -> &DifferentialDrive {
        &self.drive
    }

    pub fn dome(&self) -> Option<&SingleDrive> {
        self.dome.as_ref()
    }

    pub fn servos(&self) -> &ServoDispatchTable {
        &self.servos
    }

    pub fn servos_mut(&mut self) -> &mut ServoDispatchTable {
        &mut self.servos
    }

    pub const fn stats(&self) -> &CycleStats {
        &self.stats
    }
}

fn configure_body(drive: &mut DifferentialDrive, settings: &OutputSettings) {
    drive.set_deadband(settings.deadband);
    drive.set_ramping_value(settings.ramping);
    drive.set_max_output(settings.max_output);
    drive.set_speed_limit(settings.speed_limit);
    drive.set_expiration(settings.expiration_ms);
    drive.set_safety_enabled(settings.safety_enabled);
}

fn configure_dome(dome: &mut SingleDrive, settings: &OutputSettings) {
    dome.set_deadband(settings.deadband);
    dome.set_ramping_value(settings.ramping);
    dome.set_max_output(settings.max_output);
    dome.set_speed_limit(settings.speed_limit);
    dome.set_expiration(settings.expiration_ms);
    dome.set_safety_enabled(settings.safety_enabled);
}

// ─── Tests ──────────────────────────────────────────────────────────
