//! Per-channel exponential smoothing of servo targets.
//!
//! Each channel keeps the angle it was last commanded to and moves a fixed
//! fraction of the way toward every new target:
//!
//! ```text
//! new = prev + (target - prev) * t
//! ```
//!
//! With `t` in (0, 1) the output is a convex combination of the previous
//! angle and the target, so it never overshoots and, given targets already
//! clamped to `[0, 180]` and an initial angle in that range, never leaves it.
//!
//! # Example
//!
//! ```rust
//! use mimic_control::smoothing::SmoothingFilter;
//! use mimic_types::Channel;
//!
//! let mut filter = SmoothingFilter::default(); // t = 0.2, both channels at 90°
//! let angle = filter.smooth(Channel::Left, 180.0);
//! assert!((angle - 108.0).abs() < 1e-4);
//! assert!((filter.angle(Channel::Right) - 90.0).abs() < f32::EPSILON);
//! ```

use mimic_types::{Channel, MimicError, NEUTRAL_DEG, SERVO_MAX_DEG, SERVO_MIN_DEG};

/// Fraction of the remaining distance covered per update. Larger values track
/// faster but let more estimator jitter through to the servos.
pub const SMOOTHING_FACTOR: f32 = 0.2;

/// Holds the running angle of every channel.
#[derive(Debug, Clone, PartialEq)]
pub struct SmoothingFilter {
    factor: f32,
    angles: [f32; 2],
}

impl Default for SmoothingFilter {
    fn default() -> Self {
        Self {
            factor: SMOOTHING_FACTOR,
            angles: [NEUTRAL_DEG; 2],
        }
    }
}

impl SmoothingFilter {
    /// Filter with a custom factor and starting angle for both channels.
    ///
    /// # Errors
    ///
    /// Returns [`MimicError::Config`] unless `0 < factor < 1` and `initial`
    /// lies in the servo range; either would break the range invariant.
    pub fn with_params(factor: f32, initial: f32) -> Result<Self, MimicError> {
        if !(factor > 0.0 && factor < 1.0) {
            return Err(MimicError::Config(format!(
                "smoothing factor {factor} must lie strictly between 0 and 1"
            )));
        }
        if !(SERVO_MIN_DEG..=SERVO_MAX_DEG).contains(&initial) {
            return Err(MimicError::Config(format!(
                "initial angle {initial} outside [{SERVO_MIN_DEG}, {SERVO_MAX_DEG}]"
            )));
        }
        Ok(Self {
            factor,
            angles: [initial; 2],
        })
    }

    /// Blend `target` into `channel`'s running angle and return the result.
    ///
    /// `target` must already be clamped to the servo range.
    pub fn smooth(&mut self, channel: Channel, target: f32) -> f32 {
        let prev = self.angles[channel.index()];
        let next = prev + (target - prev) * self.factor;
        debug_assert!(
            (SERVO_MIN_DEG..=SERVO_MAX_DEG).contains(&next),
            "smoothed {channel} angle {next} left the servo range"
        );
        self.angles[channel.index()] = next;
        next
    }

    /// Current running angle of `channel`.
    pub fn angle(&self, channel: Channel) -> f32 {
        self.angles[channel.index()]
    }

    pub fn factor(&self) -> f32 {
        self.factor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn starts_at_neutral() {
        let filter = SmoothingFilter::default();
        for ch in Channel::ALL {
            assert_eq!(filter.angle(ch), NEUTRAL_DEG);
        }
        assert!((filter.factor() - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn single_step_moves_a_fifth_of_the_way() {
        let mut filter = SmoothingFilter::default();
        assert_eq!(filter.smooth(Channel::Left, 180.0), 108.0);
        assert_eq!(filter.smooth(Channel::Right, 0.0), 72.0);
    }

    #[test]
    fn converges_monotonically_without_reaching_target() {
        let mut filter = SmoothingFilter::default();
        let mut prev = filter.angle(Channel::Left);
        for _ in 0..40 {
            let next = filter.smooth(Channel::Left, 180.0);
            assert!(next > prev, "{next} must exceed {prev}");
            assert!(next < 180.0, "{next} must stay below the target");
            prev = next;
        }
        // 90 * 0.8^40 ≈ 0.012° left to go.
        assert!(180.0 - prev < 0.05);
    }

    #[test]
    fn fixpoint_is_stable() {
        let mut filter = SmoothingFilter::with_params(SMOOTHING_FACTOR, 42.5).unwrap();
        assert_eq!(filter.smooth(Channel::Right, 42.5), 42.5);
        assert_eq!(filter.angle(Channel::Right), 42.5);

        let mut filter = SmoothingFilter::default();
        assert_eq!(filter.smooth(Channel::Left, NEUTRAL_DEG), NEUTRAL_DEG);
    }

    #[test]
    fn channels_are_independent() {
        let mut filter = SmoothingFilter::default();
        filter.smooth(Channel::Left, 0.0);
        filter.smooth(Channel::Left, 0.0);
        assert_eq!(filter.angle(Channel::Right), NEUTRAL_DEG);
    }

    #[test]
    fn rejects_factors_outside_open_unit_interval() {
        for bad in [0.0, 1.0, -0.1, 1.5, f32::NAN] {
            let err = SmoothingFilter::with_params(bad, NEUTRAL_DEG).unwrap_err();
            assert!(matches!(err, MimicError::Config(_)), "factor {bad}");
        }
    }

    #[test]
    fn rejects_initial_angle_outside_range() {
        assert!(SmoothingFilter::with_params(0.5, -1.0).is_err());
        assert!(SmoothingFilter::with_params(0.5, 180.5).is_err());
        assert!(SmoothingFilter::with_params(0.5, f32::NAN).is_err());
        assert!(SmoothingFilter::with_params(0.5, 180.0).is_ok());
    }

    proptest! {
        #[test]
        fn output_is_convex_combination(
            targets in proptest::collection::vec(0.0f32..=180.0, 1..64),
        ) {
            let mut filter = SmoothingFilter::default();
            for target in targets {
                let prev = filter.angle(Channel::Left);
                let next = filter.smooth(Channel::Left, target);
                let (lo, hi) = if prev <= target { (prev, target) } else { (target, prev) };
                prop_assert!(next >= lo && next <= hi);
                prop_assert!((SERVO_MIN_DEG..=SERVO_MAX_DEG).contains(&next));
            }
        }
    }
}
