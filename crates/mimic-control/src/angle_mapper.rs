//! Arm height → servo angle.
//!
//! The estimator's `y` axis runs from 0 at the top of the image to 1 at the
//! bottom, so a wrist above its shoulder has the smaller `y`:
//!
//! ```text
//! raw = 180 * (1 - (wrist.y - shoulder.y))
//! ```
//!
//! A wrist level with the shoulder reads 180, a wrist one full image height
//! below reads 0. Only the vertical axis is used.

use mimic_types::{Channel, Landmark, Pose, SERVO_MAX_DEG, SERVO_MIN_DEG};

/// Raw target angle for one arm, clamped to the servo range.
///
/// Never panics. Any input, including NaN, yields a value in `[0, 180]`.
pub fn map_arm_angle(shoulder: &Landmark, wrist: &Landmark) -> f32 {
    let raw = SERVO_MAX_DEG * (1.0 - (wrist.y - shoulder.y));
    clamp_to_servo_range(raw)
}

/// `max(0, min(180, deg))`. `f32::min`/`max` discard a NaN operand, so NaN
/// lands on a bound instead of escaping.
pub fn clamp_to_servo_range(deg: f32) -> f32 {
    SERVO_MIN_DEG.max(SERVO_MAX_DEG.min(deg))
}

/// Raw target for `channel`, or `None` when the pose cannot drive it: a
/// shoulder or wrist is missing, has a non-finite `y`, or is less visible
/// than `min_visibility`. `x` and `z` are never inspected.
pub fn arm_target(pose: &Pose, channel: Channel, min_visibility: f32) -> Option<f32> {
    let shoulder = pose.landmark(channel.shoulder())?;
    let wrist = pose.landmark(channel.wrist())?;
    let usable = |lm: &Landmark| lm.y.is_finite() && lm.passes_visibility(min_visibility);
    if !usable(shoulder) || !usable(wrist) {
        return None;
    }
    Some(map_arm_angle(shoulder, wrist))
}
