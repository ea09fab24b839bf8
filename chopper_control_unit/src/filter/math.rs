//! Scalar shaping helpers for normalized commands.

use chopper_common::consts::DEADBAND_RESCALE_RATIO_LIMIT;

/// Zero out `|value| <= deadband` and rescale the rest so the output is
/// continuous: `deadband` maps to 0 and `max_magnitude` to `max_magnitude`.
///
/// When the deadband is vanishingly small relative to the range the rescale
/// is numerically useless and plain offset subtraction is used instead.
///
/// ```
/// use chopper_control_unit::filter::math::apply_deadband;
/// assert_eq!(apply_deadband(0.04, 0.05, 1.0), 0.0);
/// assert!((apply_deadband(-1.0, 0.05, 1.0) + 1.0).abs() < 1e-6);
/// ```
#[inline]
pub fn apply_deadband(value: f32, deadband: f32, max_magnitude: f32) -> f32 {
    let magnitude = value.abs();
    if magnitude <= deadband {
        return 0.0;
    }
    if max_magnitude / deadband > DEADBAND_RESCALE_RATIO_LIMIT {
        return value - deadband.copysign(value);
    }
    (max_magnitude * (magnitude - deadband) / (max_magnitude - deadband)).copysign(value)
}

/// Clamp `|speed|` to `|limit|`, keeping the sign of `speed`. Both
/// magnitudes are first confined to `[0, 1]`.
#[inline]
pub fn apply_speed_limit(speed: f32, limit: f32) -> f32 {
    let limit = limit.abs().min(1.0);
    let speed = speed.clamp(-1.0, 1.0);
    if speed.abs() > limit {
        limit.copysign(speed)
    } else {
        speed
    }
}

/// `v · |v|`: finer control near zero, full range kept.
#[inline]
pub fn square_preserving_sign(value: f32) -> f32 {
    value * value.abs()
}

/// Scale a wheel pair down so neither side exceeds 1.0 in magnitude.
#[inline]
pub fn desaturate(left: f32, right: f32) -> (f32, f32) {
    let max_magnitude = left.abs().max(right.abs());
    if max_magnitude > 1.0 {
        (left / max_magnitude, right / max_magnitude)
    } else {
        (left, right)
    }
}
