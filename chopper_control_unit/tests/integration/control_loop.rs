//! Integration test: control loop built from the shipped configuration.
//!
//! Loads `config/chopper.toml`, wires the runner to recording sinks on a
//! manual clock and drives it tick by tick:
//! 1. Stick input reaches the body and dome motors.
//! 2. Servo commands in frames animate over time and settle.
//! 3. When input stops the watchdog zeroes the motors.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chopper_common::clock::{Clock, ManualClock, Millis};
use chopper_control_unit::config::{ControlUnitConfig, load_config};
use chopper_control_unit::cycle::{CycleHardware, CycleRunner};
use chopper_control_unit::drive::{DriveModel, WheelSpeeds};
use chopper_control_unit::input::{ControllerFrame, ScriptedInput, ServoCommand};
use chopper_control_unit::rt::ThreadPlacement;
use chopper_control_unit::safety::{SafetyMonitor, WatchdogCadence};
use chopper_control_unit::servo::{ChannelPhase, PulseUnit};
use parking_lot::Mutex;

const TICK: Millis = 25;

fn shipped_config() -> ControlUnitConfig {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../config/chopper.toml");
    load_config(&path).unwrap()
}

struct Rig {
    clock: ManualClock,
    monitor: SafetyMonitor,
    dome: Arc<Mutex<f32>>,
    batches: Arc<Mutex<Vec<Vec<u16>>>>,
    runner: CycleRunner,
}

fn rig(frames: Vec<ControllerFrame>) -> Rig {
    let config = shipped_config();
    let clock = ManualClock::new(0);
    let monitor = SafetyMonitor::new(
        WatchdogCadence {
            wake_interval: Duration::from_secs(3600),
            wakes_per_check: 1,
        },
        ThreadPlacement::default(),
    );
    let dome = Arc::new(Mutex::new(0.0f32));
    let batches = Arc::new(Mutex::new(Vec::new()));
    let (dome_sink, batch_sink) = (dome.clone(), batches.clone());
    let hardware = CycleHardware {
        left: Box::new(|_: f32| {}),
        right: Box::new(|_: f32| {}),
        dome: Box::new(move |v: f32| *dome_sink.lock() = v),
        pulses: Box::new(move |_: u8, pulses: &[u16]| batch_sink.lock().push(pulses.to_vec())),
        body_peripheral: None,
        dome_peripheral: None,
    };
    let shared_clock: Arc<dyn Clock> = Arc::new(clock.clone());
    let runner = CycleRunner::new(
        &config,
        hardware,
        Box::new(ScriptedInput::new(frames)),
        shared_clock,
        &monitor,
    )
    .unwrap();
    Rig {
        clock,
        monitor,
        dome,
        batches,
        runner,
    }
}

fn tick_n(rig: &mut Rig, n: usize) {
    for _ in 0..n {
        rig.clock.advance(TICK);
        rig.runner.tick();
    }
}

#[test]
fn shipped_config_is_valid() {
    let config = shipped_config();
    assert_eq!(config.drive.model, DriveModel::Diagonal);
    assert_eq!(config.servo.channel_count, 8);
    assert_eq!(config.servo.pulse_unit, PulseUnit::QuarterMicroseconds);
    assert!(config.input.left_y.invert);
}

#[test]
fn held_stick_ramps_body_forward() {
    // Pushing up reads negative on the pad; left_y is inverted in the config.
    let push = ControllerFrame {
        left_y: -512,
        ..ControllerFrame::default()
    };
    let mut rig = rig(vec![push; 80]);

    tick_n(&mut rig, 4);
    let early = rig.runner.drive().outputs();
    tick_n(&mut rig, 76);
    let late = rig.runner.drive().outputs();

    // Default stick slew is 0.75/s, so full throttle takes over a second.
    assert!(early.left > 0.0 && early.left < late.left, "{early:?} -> {late:?}");
    assert!((late.left - 0.8).abs() < 1e-3, "{late:?}");
    assert!((late.left - late.right).abs() < 1e-5);
}

#[test]
fn dome_follows_right_stick() {
    let spin = ControllerFrame {
        right_x: 512,
        ..ControllerFrame::default()
    };
    let mut rig = rig(vec![spin; 40]);
    tick_n(&mut rig, 40);
    // right_x slews at 1.5/s; the dome limit is 0.6.
    assert!((*rig.dome.lock() - 0.6).abs() < 1e-4);
}

#[test]
fn servo_move_from_a_frame_settles() {
    let mut command = ControllerFrame::default();
    command
        .servo_commands
        .push(ServoCommand::Position {
            channel: 1,
            pulse: 4000,
        })
        .unwrap();
    command.servo_commands.push(ServoCommand::Enable(1)).unwrap();
    let mut moving = ControllerFrame::default();
    moving
        .servo_commands
        .push(ServoCommand::MoveTo {
            channel: 1,
            pulse: 8000,
            duration_ms: 1000,
        })
        .unwrap();

    let mut frames = vec![command, moving];
    frames.resize(60, ControllerFrame::default());
    let mut rig = rig(frames);

    tick_n(&mut rig, 2);
    assert_eq!(rig.runner.servos().phase(1), Some(ChannelPhase::Moving));
    tick_n(&mut rig, 58);

    let servos = rig.runner.servos();
    assert!(servos.is_finished_moving(1));
    assert_eq!(servos.targets()[1], 8000);
    // Channel 1 slews at 8000 quarter-µs/s: at most 200 per 25 ms tick.
    let batches = rig.batches.lock();
    for pair in batches.windows(2) {
        let jump = pair[0][1].abs_diff(pair[1][1]);
        assert!(pair[0][1] == 0 || jump <= 201, "jump {jump}");
    }
}

#[test]
fn lost_input_stops_every_motor() {
    let go = ControllerFrame {
        left_y: -512,
        right_x: 512,
        ..ControllerFrame::default()
    };
    let mut rig = rig(vec![go; 40]);
    tick_n(&mut rig, 40);
    assert_ne!(rig.runner.drive().outputs(), WheelSpeeds::STOPPED);
    assert!(*rig.dome.lock() > 0.0);

    // Script exhausted: ticks keep running but nothing feeds the motors.
    tick_n(&mut rig, 5);
    assert_eq!(rig.monitor.check_motors(), 2);
    assert_eq!(rig.runner.drive().outputs(), WheelSpeeds::STOPPED);
    assert_eq!(*rig.dome.lock(), 0.0);
}
