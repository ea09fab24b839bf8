//! Actuator safety supervision.
//!
//! Every motor-driving actuator carries a [`MotorSafety`] record that the
//! control loop feeds on each command. A [`SafetyMonitor`] thread stops any
//! enabled actuator whose record has not been fed within its expiration
//! window, independently of the control loop's health.

pub mod monitor;
pub mod record;

pub use monitor::{SafetyMonitor, WatchdogCadence};
pub use record::{MotorSafety, SafetyRecord, SafetyTrackedActuator};
