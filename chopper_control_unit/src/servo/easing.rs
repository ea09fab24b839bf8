//! Easing curves for timed servo motion.
//!
//! Every curve maps progress `[0, 1]` onto `[0, 1]`, starts at 0, ends at 1
//! and never decreases, so a servo never reverses mid-move.

use core::f32::consts::{FRAC_PI_2, PI};
use serde::{Deserialize, Serialize};

/// Bisection depth for [`Easing::inverse`]; 2⁻²⁴ is below f32 resolution.
const INVERSE_ITERATIONS: u32 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    #[default]
    Linear,
    QuadraticIn,
    QuadraticOut,
    QuadraticInOut,
    CubicIn,
    CubicOut,
    CubicInOut,
    QuarticIn,
    QuarticOut,
    QuarticInOut,
    QuinticIn,
    QuinticOut,
    QuinticInOut,
    SineIn,
    SineOut,
    SineInOut,
    CircularIn,
    CircularOut,
    CircularInOut,
    ExponentialIn,
    ExponentialOut,
    ExponentialInOut,
}

impl Easing {
    pub const ALL: [Easing; 22] = [
        Self::Linear,
        Self::QuadraticIn,
        Self::QuadraticOut,
        Self::QuadraticInOut,
        Self::CubicIn,
        Self::CubicOut,
        Self::CubicInOut,
        Self::QuarticIn,
        Self::QuarticOut,
        Self::QuarticInOut,
        Self::QuinticIn,
        Self::QuinticOut,
        Self::QuinticInOut,
        Self::SineIn,
        Self::SineOut,
        Self::SineInOut,
        Self::CircularIn,
        Self::CircularOut,
        Self::CircularInOut,
        Self::ExponentialIn,
        Self::ExponentialOut,
        Self::ExponentialInOut,
    ];

    /// Eased fraction for `progress`, clamped to `[0, 1]` first.
    pub fn apply(self, progress: f32) -> f32 {
        let p = progress.clamp(0.0, 1.0);
        match self {
            Self::Linear => p,
            Self::QuadraticIn => ease_in(p, 2),
            Self::QuadraticOut => ease_out(p, 2),
            Self::QuadraticInOut => ease_in_out(p, 2),
            Self::CubicIn => ease_in(p, 3),
            Self::CubicOut => ease_out(p, 3),
            Self::CubicInOut => ease_in_out(p, 3),
            Self::QuarticIn => ease_in(p, 4),
            Self::QuarticOut => ease_out(p, 4),
            Self::QuarticInOut => ease_in_out(p, 4),
            Self::QuinticIn => ease_in(p, 5),
            Self::QuinticOut => ease_out(p, 5),
            Self::QuinticInOut => ease_in_out(p, 5),
            Self::SineIn => 1.0 - (p * FRAC_PI_2).cos(),
            Self::SineOut => (p * FRAC_PI_2).sin(),
            Self::SineInOut => -((PI * p).cos() - 1.0) / 2.0,
            Self::CircularIn => 1.0 - (1.0 - p * p).max(0.0).sqrt(),
            Self::CircularOut => (1.0 - (p - 1.0) * (p - 1.0)).max(0.0).sqrt(),
            Self::CircularInOut => {
                if p < 0.5 {
                    (1.0 - (1.0 - (2.0 * p).powi(2)).max(0.0).sqrt()) / 2.0
                } else {
                    ((1.0 - (2.0 - 2.0 * p).powi(2)).max(0.0).sqrt() + 1.0) / 2.0
                }
            }
            Self::ExponentialIn => {
                if p <= 0.0 {
                    0.0
                } else {
                    2f32.powf(10.0 * p - 10.0)
                }
            }
            Self::ExponentialOut => {
                if p >= 1.0 {
                    1.0
                } else {
                    1.0 - 2f32.powf(-10.0 * p)
                }
            }
            Self::ExponentialInOut => {
                if p <= 0.0 {
                    0.0
                } else if p >= 1.0 {
                    1.0
                } else if p < 0.5 {
                    2f32.powf(20.0 * p - 10.0) / 2.0
                } else {
                    (2.0 - 2f32.powf(-20.0 * p + 10.0)) / 2.0
                }
            }
        }
    }

    /// Progress at which the curve first reaches `fraction`.
    pub fn inverse(self, fraction: f32) -> f32 {
        let target = fraction.clamp(0.0, 1.0);
        if self == Self::Linear {
            return target;
        }
        let (mut lo, mut hi) = (0.0_f32, 1.0_f32);
        for _ in 0..INVERSE_ITERATIONS {
            let mid = (lo + hi) / 2.0;
            if self.apply(mid) < target {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        hi
    }
}

#[inline]
fn ease_in(p: f32, power: i32) -> f32 {
    p.powi(power)
}

#[inline]
fn ease_out(p: f32, power: i32) -> f32 {
    1.0 - (1.0 - p).powi(power)
}

#[inline]
fn ease_in_out(p: f32, power: i32) -> f32 {
    if p < 0.5 {
        2f32.powi(power - 1) * p.powi(power)
    } else {
        1.0 - (2.0 - 2.0 * p).powi(power) / 2.0
    }
}
