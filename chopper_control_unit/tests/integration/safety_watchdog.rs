//! Integration test: motor-safety watchdog on a real thread.
//!
//! Runs the `motor-safety` thread at a short cadence against drives on the
//! monotonic clock:
//! 1. Fed once, the drive is stopped shortly after its expiration.
//! 2. Fed faster than its expiration, the drive is never stopped.
//! 3. Dropping a drive deregisters it without stopping the watchdog.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chopper_common::clock::{Clock, MonotonicClock};
use chopper_control_unit::drive::{DifferentialDrive, SingleDrive, WheelSpeeds};
use chopper_control_unit::rt::ThreadPlacement;
use chopper_control_unit::safety::{SafetyMonitor, WatchdogCadence};
use parking_lot::Mutex;

// ── Helpers ─────────────────────────────────────────────────────────

type Trace = Arc<Mutex<Vec<(Duration, f32)>>>;

fn fast_monitor() -> SafetyMonitor {
    SafetyMonitor::new(
        WatchdogCadence {
            wake_interval: Duration::from_millis(10),
            wakes_per_check: 2,
        },
        ThreadPlacement::default(),
    )
}

fn traced_single(monitor: &SafetyMonitor, origin: Instant) -> (Trace, SingleDrive) {
    let trace: Trace = Arc::default();
    let sink = trace.clone();
    let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());
    let drive = SingleDrive::new(
        Box::new(move |v: f32| sink.lock().push((origin.elapsed(), v))),
        clock,
        monitor,
    )
    .unwrap();
    (trace, drive)
}

// ── Tests ───────────────────────────────────────────────────────────

#[test]
fn unfed_drive_is_stopped_after_expiration() {
    let monitor = fast_monitor();
    let origin = Instant::now();
    let (trace, mut drive) = traced_single(&monitor, origin);
    drive.set_expiration(500);
    drive.drive(0.5, false);
    let fed_at = origin.elapsed();

    thread::sleep(Duration::from_millis(800));

    let trace = trace.lock();
    let stops: Vec<_> = trace
        .iter()
        .filter(|(at, v)| *at >= fed_at && *v == 0.0)
        .collect();
    assert_eq!(stops.len(), 1, "trace: {trace:?}");
    let stopped_after = stops[0].0 - fed_at;
    assert!(
        stopped_after >= Duration::from_millis(499),
        "stopped too early: {stopped_after:?}"
    );
    assert!(
        stopped_after < Duration::from_millis(700),
        "stopped too late: {stopped_after:?}"
    );
    assert_eq!(drive.output(), 0.0);
}

#[test]
fn regularly_fed_drive_is_never_stopped() {
    let monitor = fast_monitor();
    let origin = Instant::now();
    let (trace, mut drive) = traced_single(&monitor, origin);
    drive.set_expiration(500);
    drive.drive(0.5, false);
    let fed_at = origin.elapsed();

    for _ in 0..6 {
        thread::sleep(Duration::from_millis(300));
        drive.drive(0.5, false);
    }

    let trace = trace.lock();
    assert!(
        trace.iter().filter(|(at, _)| *at >= fed_at).all(|(_, v)| *v > 0.0),
        "trace: {trace:?}"
    );
}

#[test]
fn disabled_safety_is_never_stopped() {
    let monitor = fast_monitor();
    let (trace, mut drive) = traced_single(&monitor, Instant::now());
    drive.set_safety_enabled(false);
    drive.set_expiration(50);
    drive.drive(0.3, false);
    let writes = trace.lock().len();

    thread::sleep(Duration::from_millis(200));

    assert_eq!(trace.lock().len(), writes);
    assert!(drive.output() > 0.0);
}

#[test]
fn differential_drive_is_stopped_as_a_pair() {
    let monitor = fast_monitor();
    let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());
    let mut drive =
        DifferentialDrive::new(Box::new(|_: f32| {}), Box::new(|_: f32| {}), clock, &monitor)
            .unwrap();
    drive.set_expiration(100);
    drive.tank_drive(0.6, -0.6, false);
    assert_ne!(drive.outputs(), WheelSpeeds::STOPPED);

    thread::sleep(Duration::from_millis(300));

    assert_eq!(drive.outputs(), WheelSpeeds::STOPPED);
    assert!(monitor.stops_issued() >= 1);
}

#[test]
fn dropping_a_drive_keeps_the_watchdog_running() {
    let monitor = fast_monitor();
    let (_first_trace, first) = traced_single(&monitor, Instant::now());
    let (second_trace, mut second) = traced_single(&monitor, Instant::now());
    assert_eq!(monitor.registered_count(), 2);
    assert!(monitor.is_running());

    drop(first);
    assert_eq!(monitor.registered_count(), 1);
    assert!(monitor.is_running());

    second.set_expiration(50);
    second.drive(0.4, false);
    thread::sleep(Duration::from_millis(250));
    let trace = second_trace.lock();
    let driven = trace.iter().rposition(|(_, v)| *v > 0.0).unwrap();
    assert!(trace[driven + 1..].iter().any(|(_, v)| *v == 0.0));
}

#[test]
fn shutdown_stops_the_thread() {
    let monitor = fast_monitor();
    let (_trace, _drive) = traced_single(&monitor, Instant::now());
    assert!(monitor.is_running());
    monitor.shutdown();
    assert!(!monitor.is_running());
}
