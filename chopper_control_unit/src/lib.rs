//! # Chopper Control Unit Library
//!
//! Motion-control core for a remote-controlled animatronic vehicle: a
//! skid-steer body, a rotating dome and a bank of timed servos.
//!
//! ## Layers
//!
//! 1. **filter**: time-based rate limiting and stick math
//! 2. **drive**: Arcade, Curvature, Diagonal and Tank kinematics plus the
//!    legacy acceleration shaper, with a single-motor drive for the dome
//! 3. **safety**: per-actuator expiration records and the background
//!    watchdog that stops any actuator not fed in time
//! 4. **servo**: eased, slew-limited servo motion and batched dispatch
//! 5. **input** / **cycle**: stick conditioning and the fixed-tick loop
//!
//! ## Threads
//!
//! The control loop owns every drive, filter and servo. The only other
//! thread is the `motor-safety` watchdog, which reaches actuators through
//! weak references and stops them outside every lock.

pub mod config;
pub mod cycle;
pub mod drive;
pub mod error;
pub mod filter;
pub mod input;
pub mod rt;
pub mod safety;
pub mod servo;
