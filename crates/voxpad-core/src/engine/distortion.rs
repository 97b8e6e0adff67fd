//! Waveshaping distortion stage
//!
//! A stateless transfer curve keyed by a single `amount` parameter. Changing
//! the amount never mutates the active curve: a fresh stage is built off the
//! audio thread and swapped into the engine as one command, so the output
//! path is reconfigured in a single step with no double-routing.

use std::f32::consts::PI;

use crate::types::StereoSample;

/// Transfer table resolution; dense enough for smooth shaping with the
/// interpolated lookup below.
pub const CURVE_RESOLUTION: usize = 44_100;

/// Build the waveshaping transfer curve for a distortion amount
///
/// For `i` in `[0, resolution)`, with `x = 2i/resolution - 1`:
///
/// ```text
/// curve[i] = (3 + amount) * x * 20 * (pi/180) / (pi + amount * |x|)
/// ```
///
/// The `pi` term in the denominator keeps `amount = 0` well-defined.
pub fn build_curve(amount: f32, resolution: usize) -> Vec<f32> {
    let deg = PI / 180.0;
    let n = resolution as f32;
    (0..resolution)
        .map(|i| {
            let x = (i as f32 * 2.0) / n - 1.0;
            ((3.0 + amount) * x * 20.0 * deg) / (PI + amount * x.abs())
        })
        .collect()
}

/// An immutable distortion stage holding one transfer curve
pub struct DistortionStage {
    amount: f32,
    curve: Vec<f32>,
}

impl DistortionStage {
    pub fn new(amount: f32) -> Self {
        Self {
            amount,
            curve: build_curve(amount, CURVE_RESOLUTION),
        }
    }

    pub fn amount(&self) -> f32 {
        self.amount
    }

    /// Map one channel value through the curve
    ///
    /// Input is clamped to [-1, 1]; the lookup interpolates linearly between
    /// neighboring table entries.
    #[inline]
    pub fn shape(&self, x: f32) -> f32 {
        let n = self.curve.len();
        let pos = (x.clamp(-1.0, 1.0) + 1.0) * 0.5 * (n - 1) as f32;
        let base = pos as usize;
        if base + 1 >= n {
            return self.curve[n - 1];
        }
        let frac = pos - base as f32;
        self.curve[base] + (self.curve[base + 1] - self.curve[base]) * frac
    }

    /// Shape both channels of a stereo sample
    #[inline]
    pub fn shape_sample(&self, sample: StereoSample) -> StereoSample {
        StereoSample::new(self.shape(sample.left), self.shape(sample.right))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curve_length_and_center() {
        for amount in [0.0, 1.0, 50.0, 400.0] {
            let curve = build_curve(amount, 1024);
            assert_eq!(curve.len(), 1024);
            // x = 0 at the midpoint maps to (approximately) zero
            assert!(curve[512].abs() < 1e-3, "amount {} center {}", amount, curve[512]);
        }
    }

    #[test]
    fn test_curve_monotonically_non_decreasing() {
        for amount in [0.0, 2.5, 100.0] {
            let curve = build_curve(amount, 4096);
            for window in curve.windows(2) {
                assert!(
                    window[1] >= window[0],
                    "curve not monotonic at amount {}",
                    amount
                );
            }
        }
    }

    #[test]
    fn test_zero_amount_is_linear_attenuation() {
        // With amount = 0 the formula reduces to x/3
        let stage = DistortionStage::new(0.0);
        assert!((stage.shape(0.9) - 0.3).abs() < 1e-3);
        assert!((stage.shape(-0.9) + 0.3).abs() < 1e-3);
    }

    #[test]
    fn test_shape_clamps_out_of_range_input() {
        let stage = DistortionStage::new(10.0);
        assert_eq!(stage.shape(5.0), stage.shape(1.0));
        assert_eq!(stage.shape(-5.0), stage.shape(-1.0));
    }

    #[test]
    fn test_shape_sample_applies_per_channel() {
        let stage = DistortionStage::new(0.0);
        let out = stage.shape_sample(StereoSample::new(0.6, -0.6));
        assert!((out.left - 0.2).abs() < 1e-3);
        assert!((out.right + 0.2).abs() < 1e-3);
    }
}
