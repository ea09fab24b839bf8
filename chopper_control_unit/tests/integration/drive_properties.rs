//! Property tests across the drive pipeline.
//!
//! - Deadband: anything inside the band is exactly zero.
//! - Kinematics: no model ever commands a wheel past full scale.
//! - Rate limiting: output never moves faster than the configured slope.
//! - Full drive: every motor write respects the speed limit.

use std::sync::Arc;
use std::time::Duration;

use chopper_common::clock::{Clock, ManualClock};
use chopper_control_unit::drive::{DifferentialDrive, DriveModel};
use chopper_control_unit::filter::RateLimiter;
use chopper_control_unit::filter::math::apply_deadband;
use chopper_control_unit::rt::ThreadPlacement;
use chopper_control_unit::safety::{SafetyMonitor, WatchdogCadence};
use parking_lot::Mutex;
use proptest::prelude::*;

const MODELS: [DriveModel; 4] = [
    DriveModel::Arcade,
    DriveModel::Curvature,
    DriveModel::Tank,
    DriveModel::Diagonal,
];

fn idle_monitor() -> SafetyMonitor {
    SafetyMonitor::new(
        WatchdogCadence {
            wake_interval: Duration::from_secs(3600),
            wakes_per_check: 1,
        },
        ThreadPlacement::default(),
    )
}

proptest! {
    #[test]
    fn deadband_zeroes_the_band(deadband in 0.0f32..0.99, fraction in -1.0f32..=1.0) {
        let value = deadband * fraction;
        prop_assert_eq!(apply_deadband(value, deadband, 1.0), 0.0);
    }

    #[test]
    fn deadband_keeps_sign_and_scale(deadband in 0.0f32..0.9, value in -1.0f32..=1.0) {
        let out = apply_deadband(value, deadband, 1.0);
        prop_assert!(out.abs() <= 1.0 + 1e-6);
        if out != 0.0 {
            prop_assert_eq!(out.signum(), value.signum());
        }
    }

    #[test]
    fn models_never_saturate(
        a in -2.0f32..=2.0,
        b in -2.0f32..=2.0,
        square in any::<bool>(),
    ) {
        for model in MODELS {
            let speeds = model.solve(a, b, square);
            prop_assert!(
                speeds.max_magnitude() <= 1.0 + 1e-6,
                "{:?}({}, {}, {}) -> {:?}", model, a, b, square, speeds
            );
        }
    }

    #[test]
    fn rate_limiter_respects_slope(
        rising in 0.1f64..100.0,
        falling in 0.1f64..100.0,
        steps in prop::collection::vec((-1000.0f64..1000.0, 0u64..200), 1..40),
    ) {
        let mut limiter = RateLimiter::new(rising, -falling, 0.0, 0);
        let bound = rising.max(falling);
        let mut now = 0;
        let mut last = limiter.last_value();
        for (input, dt) in steps {
            now += dt;
            let out = limiter.calculate(input, now);
            let allowed = bound * dt as f64 / 1000.0;
            prop_assert!((out - last).abs() <= allowed + 1e-9);
            last = out;
        }
    }

    #[test]
    fn drive_writes_respect_speed_limit(
        limit in 0.0f32..=1.0,
        a in -1.5f32..=1.5,
        b in -1.5f32..=1.5,
        model_index in 0usize..4,
    ) {
        let writes = Arc::new(Mutex::new(Vec::new()));
        let (left, right) = (writes.clone(), writes.clone());
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(0));
        let monitor = idle_monitor();
        let mut drive = DifferentialDrive::new(
            Box::new(move |v: f32| left.lock().push(v)),
            Box::new(move |v: f32| right.lock().push(v)),
            clock,
            &monitor,
        )
        .unwrap();
        drive.set_speed_limit(limit);
        drive.drive_with(MODELS[model_index], a, b, true);

        let writes = writes.lock();
        prop_assert_eq!(writes.len(), 2);
        for v in writes.iter() {
            prop_assert!(v.abs() <= limit + 1e-6, "{} > {}", v, limit);
        }
    }
}
