//! Timed servo motion.
//!
//! [`ServoChannelState`] moves one servo along an eased, slew-limited path;
//! [`ServoDispatchTable`] animates a fixed set of channels and batches
//! their pulse targets to the servo controller.

pub mod channel;
pub mod dispatch;
pub mod easing;

pub use channel::{ChannelPhase, MotionSegment, ServoChannelState};
pub use dispatch::{PulseSink, PulseUnit, ServoDispatchTable};
pub use easing::Easing;
