//! Chopper Common Library
//!
//! Shared constants, the monotonic clock abstraction and configuration
//! loading for all Chopper workspace crates.
//!
//! # Module Structure
//!
//! - [`clock`] - Millisecond clock trait, wall and manual implementations
//! - [`config`] - Configuration loading traits and types
//! - [`consts`] - Limits, defaults and timing cadences
//! - [`prelude`] - Common re-exports for convenience
//!
//! ```rust
//! use chopper_common::clock::{Clock, ManualClock};
//! use chopper_common::config::{ConfigLoader, SharedConfig};
//! ```

pub mod clock;
pub mod config;
pub mod consts;
pub mod prelude;
