//! Drive kinematics and motor output.
//!
//! [`kinematics`] holds the pure inverse-kinematics models. The drives
//! ([`DifferentialDrive`], [`SingleDrive`]) wrap them with deadband, output
//! scaling, motor sinks and safety feeding. [`shaping`] is the legacy
//! acceleration-limited stick drive.

pub mod base;
pub mod differential;
pub mod kinematics;
pub mod shaping;
pub mod single;

pub use base::{DriveConfiguration, MotorSink, PeripheralSettings};
pub use differential::DifferentialDrive;
pub use kinematics::{DriveModel, WheelSpeeds};
pub use shaping::{DriveShaper, ShapingConfig};
pub use single::SingleDrive;
