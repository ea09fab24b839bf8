//! Command conditioning.
//!
//! Slew-rate limiting plus the small scalar helpers (deadband, speed limit,
//! signed squaring, desaturation) shared by the drive and input layers.

pub mod math;
pub mod rate_limiter;

pub use rate_limiter::RateLimiter;
