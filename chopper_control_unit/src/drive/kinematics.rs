//! Inverse kinematics for a differential (skid-steer) base.
//!
//! Every model takes two logical axes, clamps them to `[-1, 1]` and returns a
//! [`WheelSpeeds`] pair whose magnitudes never exceed 1.0. Sign convention:
//! positive `x` drives forward, positive `z` turns left (right wheel faster).

use core::f32::consts::{FRAC_PI_4, SQRT_2};
use serde::{Deserialize, Serialize};

use crate::filter::math::{desaturate, square_preserving_sign};

/// Normalized left/right wheel command.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WheelSpeeds {
    pub left: f32,
    pub right: f32,
}

impl WheelSpeeds {
    pub const STOPPED: Self = Self {
        left: 0.0,
        right: 0.0,
    };

    #[inline]
    pub const fn new(left: f32, right: f32) -> Self {
        Self { left, right }
    }

    /// Larger of the two magnitudes.
    #[inline]
    pub fn max_magnitude(&self) -> f32 {
        self.left.abs().max(self.right.abs())
    }

    #[inline]
    fn desaturated(left: f32, right: f32) -> Self {
        let (left, right) = desaturate(left, right);
        Self { left, right }
    }
}

/// Selectable mixing model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriveModel {
    #[default]
    Arcade,
    Curvature,
    Tank,
    /// 45° rotated polar mix.
    Diagonal,
}

impl DriveModel {
    /// Run this model on a raw axis pair.
    ///
    /// For [`DriveModel::Tank`] the pair is `(left, right)`; for the others
    /// it is `(x_speed, z_rotation)`. Curvature always allows turning in
    /// place here, so a stick deflected purely sideways still spins the base.
    pub fn solve(self, a: f32, b: f32, square_inputs: bool) -> WheelSpeeds {
        match self {
            Self::Arcade => arcade_ik(a, b, square_inputs),
            Self::Curvature => curvature_ik(a, b, true, square_inputs),
            Self::Tank => tank_ik(a, b, square_inputs),
            Self::Diagonal => diagonal_ik(a, b, square_inputs),
        }
    }
}

#[inline]
fn prepare(value: f32, square_inputs: bool) -> f32 {
    let value = value.clamp(-1.0, 1.0);
    if square_inputs {
        square_preserving_sign(value)
    } else {
        value
    }
}

/// Arcade mix: `left = x - z`, `right = x + z`, then divide by
/// `(greater + lesser) / greater` of the input magnitudes.
///
/// ```
/// use chopper_control_unit::drive::kinematics::{arcade_ik, WheelSpeeds};
/// assert_eq!(arcade_ik(0.0, 0.0, true), WheelSpeeds::STOPPED);
/// ```
pub fn arcade_ik(x_speed: f32, z_rotation: f32, square_inputs: bool) -> WheelSpeeds {
    let x = prepare(x_speed, square_inputs);
    let z = prepare(z_rotation, square_inputs);

    let greater = x.abs().max(z.abs());
    if greater == 0.0 {
        return WheelSpeeds::STOPPED;
    }
    let lesser = x.abs().min(z.abs());
    let saturated = (greater + lesser) / greater;

    WheelSpeeds::new((x - z) / saturated, (x + z) / saturated)
}

/// Curvature (car-like) mix: turn rate scales with forward speed unless
/// `allow_turn_in_place`.
pub fn curvature_ik(
    x_speed: f32,
    z_rotation: f32,
    allow_turn_in_place: bool,
    square_inputs: bool,
) -> WheelSpeeds {
    let x = prepare(x_speed, square_inputs);
    let z = prepare(z_rotation, square_inputs);

    if allow_turn_in_place {
        WheelSpeeds::desaturated(x - z, x + z)
    } else {
        WheelSpeeds::desaturated(x - x.abs() * z, x + x.abs() * z)
    }
}

/// Diagonal mix: rotate the stick vector by 45° so each wheel follows one
/// stick diagonal, rescale by √2, then desaturate.
///
/// ```
/// use chopper_control_unit::drive::kinematics::diagonal_ik;
/// let w = diagonal_ik(1.0, 0.0, false);
/// assert!((w.left - 1.0).abs() < 1e-6 && (w.right - 1.0).abs() < 1e-6);
/// ```
pub fn diagonal_ik(x_speed: f32, z_rotation: f32, square_inputs: bool) -> WheelSpeeds {
    let x = prepare(x_speed, square_inputs);
    let z = prepare(z_rotation, square_inputs);

    let magnitude = x.hypot(z);
    let theta = z.atan2(x) + FRAC_PI_4;

    WheelSpeeds::desaturated(
        magnitude * theta.cos() * SQRT_2,
        magnitude * theta.sin() * SQRT_2,
    )
}

/// Tank: each side straight from its own axis.
pub fn tank_ik(left_speed: f32, right_speed: f32, square_inputs: bool) -> WheelSpeeds {
    WheelSpeeds::new(
        prepare(left_speed, square_inputs),
        prepare(right_speed, square_inputs),
    )
}

// ─── Tests ──────────────────────────────────────────────────────────
