//! Output transformation for inference.
//!
//! The [`PostTransform`] enum defines how raw ensemble outputs (margins)
//! are converted to final predictions. This travels with the model so that
//! inference doesn't require knowledge of the source estimator.
//!
//! # Variants
//!
//! - [`Identity`](PostTransform::Identity): No transformation (regression, raw margins)
//! - [`Sigmoid`](PostTransform::Sigmoid): Scaled logistic sigmoid for binary classification
//! - [`Softmax`](PostTransform::Softmax): Softmax for multiclass classification
//! - [`AnomalyScore`](PostTransform::AnomalyScore): Path-length based isolation score

use serde::{Deserialize, Serialize};

/// Inference-time output transformation.
///
/// Models carry this instead of a full objective description so that
/// prediction works without knowing training configuration.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum PostTransform {
    /// No transformation; output = margin.
    /// Used for regression and raw margin outputs.
    #[default]
    Identity,

    /// Scaled logistic sigmoid: output = 1 / (1 + exp(-alpha * margin)).
    /// Used for binary classification; `alpha` is 1.0 for plain logistic.
    Sigmoid { alpha: f64 },

    /// Softmax: output_i = exp(margin_i) / sum(exp(margin_j)).
    /// Used for multiclass classification.
    Softmax,

    /// Isolation-forest scoring: output = 2^(-margin / ratio_c), where the
    /// margin is an average path length and `ratio_c` is the expected path
    /// length for the training subsample size.
    AnomalyScore { ratio_c: f64 },
}

impl PostTransform {
    /// Apply the transformation in-place to a row-major predictions buffer.
    ///
    /// # Arguments
    ///
    /// * `predictions` - Mutable slice of predictions, shape `(n_rows, n_groups)` in
    ///   row-major order.
    /// * `n_groups` - Number of output columns (1 for regression/binary, n_classes for multiclass).
    ///
    /// # Numerical Stability
    ///
    /// - Sigmoid clamps its scaled input to [-500, 500] to avoid overflow.
    /// - Softmax subtracts the max per row before exponentiating.
    ///
    /// # Panics
    ///
    /// Panics if `predictions.len()` is not divisible by `n_groups` or if `n_groups` is 0.
    ///
    /// # NaN/Inf Behavior
    ///
    /// NaN and Inf inputs propagate through without panics (garbage-in, garbage-out).
    #[inline]
    pub fn transform_inplace(&self, predictions: &mut [f64], n_groups: usize) {
        assert!(n_groups > 0, "n_groups must be > 0");
        assert!(
            predictions.len() % n_groups == 0,
            "predictions.len() must be divisible by n_groups"
        );

        match *self {
            PostTransform::Identity => {
                // No-op
            }
            PostTransform::Sigmoid { alpha } => {
                for x in predictions.iter_mut() {
                    *x = sigmoid(alpha * *x);
                }
            }
            PostTransform::Softmax => {
                let n_rows = predictions.len() / n_groups;
                for row_idx in 0..n_rows {
                    let start = row_idx * n_groups;
                    let end = start + n_groups;
                    let row = &mut predictions[start..end];
                    softmax_inplace(row);
                }
            }
            PostTransform::AnomalyScore { ratio_c } => {
                for x in predictions.iter_mut() {
                    *x = (-*x / ratio_c).exp2();
                }
            }
        }
    }
}

/// Numerically stable sigmoid.
/// Clamps input to [-500, 500] to prevent overflow.
#[inline]
fn sigmoid(x: f64) -> f64 {
    // Clamp to avoid overflow in exp
    let clamped = x.clamp(-500.0, 500.0);
    if clamped >= 0.0 {
        1.0 / (1.0 + (-clamped).exp())
    } else {
        let e = clamped.exp();
        e / (1.0 + e)
    }
}

/// Numerically stable softmax in-place.
/// Subtracts max before exponentiating to avoid overflow.
#[inline]
fn softmax_inplace(row: &mut [f64]) {
    if row.is_empty() {
        return;
    }

    // Find max for numerical stability
    let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    // Compute exp(x - max) and sum
    let mut sum = 0.0f64;
    for x in row.iter_mut() {
        *x = (*x - max).exp();
        sum += *x;
    }

    // Normalize
    if sum > 0.0 {
        for x in row.iter_mut() {
            *x /= sum;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    // =========================================================================
    // Identity tests
    // =========================================================================

    #[test]
    fn identity_is_noop() {
        let mut preds = vec![1.0, -2.0, 3.5, 0.0];
        let original = preds.clone();
        PostTransform::Identity.transform_inplace(&mut preds, 1);
        assert_eq!(preds, original);
    }

    // =========================================================================
    // Sigmoid tests
    // =========================================================================

    #[test]
    fn sigmoid_zero_is_half() {
        let mut preds = vec![0.0];
        PostTransform::Sigmoid { alpha: 1.0 }.transform_inplace(&mut preds, 1);
        assert_abs_diff_eq!(preds[0], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn sigmoid_output_in_zero_one() {
        let mut preds = vec![-10.0, -1.0, 0.0, 1.0, 10.0];
        PostTransform::Sigmoid { alpha: 1.0 }.transform_inplace(&mut preds, 1);
        for &p in &preds {
            assert!(p > 0.0 && p < 1.0, "sigmoid output {} not in (0,1)", p);
        }
    }

    #[test]
    fn sigmoid_alpha_scales_margin() {
        let mut scaled = vec![1.0];
        PostTransform::Sigmoid { alpha: 2.0 }.transform_inplace(&mut scaled, 1);

        let mut plain = vec![2.0];
        PostTransform::Sigmoid { alpha: 1.0 }.transform_inplace(&mut plain, 1);

        assert_abs_diff_eq!(scaled[0], plain[0], epsilon = 1e-12);
    }

    #[test]
    fn sigmoid_large_values_stable() {
        let mut preds = vec![-100.0, 100.0, -500.0, 500.0];
        PostTransform::Sigmoid { alpha: 1.0 }.transform_inplace(&mut preds, 1);

        // Very negative -> close to 0
        assert!(preds[0] < 0.001);
        assert!(preds[2] < 0.001);

        // Very positive -> close to 1
        assert!(preds[1] > 0.999);
        assert!(preds[3] > 0.999);
    }

    #[test]
    fn sigmoid_nan_propagates() {
        let mut preds = vec![f64::NAN];
        PostTransform::Sigmoid { alpha: 1.0 }.transform_inplace(&mut preds, 1);
        assert!(preds[0].is_nan());
    }

    #[test]
    fn sigmoid_inf_stable() {
        let mut preds = vec![f64::INFINITY, f64::NEG_INFINITY];
        PostTransform::Sigmoid { alpha: 1.0 }.transform_inplace(&mut preds, 1);
        // +inf clamped to 500 -> close to 1
        assert!(preds[0] > 0.999);
        // -inf clamped to -500 -> close to 0
        assert!(preds[1] < 0.001);
    }

    // =========================================================================
    // Softmax tests
    // =========================================================================

    #[test]
    fn softmax_sums_to_one() {
        let mut preds = vec![1.0, 2.0, 3.0];
        PostTransform::Softmax.transform_inplace(&mut preds, 3);

        let sum: f64 = preds.iter().sum();
        assert_abs_diff_eq!(sum, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn softmax_preserves_order() {
        let mut preds = vec![1.0, 2.0, 3.0];
        PostTransform::Softmax.transform_inplace(&mut preds, 3);

        assert!(preds[0] < preds[1]);
        assert!(preds[1] < preds[2]);
    }

    #[test]
    fn softmax_multiple_rows() {
        let mut preds = vec![
            1.0, 2.0, 3.0, // row 0
            0.0, 0.0, 0.0, // row 1 (uniform)
        ];
        PostTransform::Softmax.transform_inplace(&mut preds, 3);

        // Row 0 sums to 1
        let sum0: f64 = preds[0..3].iter().sum();
        assert_abs_diff_eq!(sum0, 1.0, epsilon = 1e-12);

        // Row 1 sums to 1 and is uniform
        let sum1: f64 = preds[3..6].iter().sum();
        assert_abs_diff_eq!(sum1, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(preds[3], preds[4], epsilon = 1e-12);
        assert_abs_diff_eq!(preds[4], preds[5], epsilon = 1e-12);
    }

    #[test]
    fn softmax_large_values_stable() {
        let mut preds = vec![100.0, 200.0, 300.0];
        PostTransform::Softmax.transform_inplace(&mut preds, 3);

        let sum: f64 = preds.iter().sum();
        assert_abs_diff_eq!(sum, 1.0, epsilon = 1e-12);

        // Largest input should dominate
        assert!(preds[2] > 0.99);
    }

    // =========================================================================
    // Anomaly score tests
    // =========================================================================

    #[test]
    fn anomaly_score_halves_at_ratio() {
        // Average path length equal to the expected length scores 0.5.
        let mut preds = vec![7.0];
        PostTransform::AnomalyScore { ratio_c: 7.0 }.transform_inplace(&mut preds, 1);
        assert_abs_diff_eq!(preds[0], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn anomaly_score_short_paths_score_high() {
        let mut preds = vec![0.0, 2.0, 20.0];
        PostTransform::AnomalyScore { ratio_c: 5.0 }.transform_inplace(&mut preds, 1);

        assert_abs_diff_eq!(preds[0], 1.0, epsilon = 1e-12); // zero depth
        assert!(preds[1] > preds[2]); // shorter path, higher score
        assert!(preds.iter().all(|&p| p > 0.0 && p <= 1.0));
    }

    // =========================================================================
    // Edge cases
    // =========================================================================

    #[test]
    #[should_panic(expected = "n_groups must be > 0")]
    fn panics_on_zero_n_groups() {
        let mut preds = vec![];
        PostTransform::Identity.transform_inplace(&mut preds, 0);
    }

    #[test]
    #[should_panic(expected = "predictions.len() must be divisible by n_groups")]
    fn panics_on_mismatched_length() {
        let mut preds = vec![1.0, 2.0, 3.0];
        PostTransform::Softmax.transform_inplace(&mut preds, 2);
    }

    #[test]
    fn default_is_identity() {
        assert_eq!(PostTransform::default(), PostTransform::Identity);
    }

    #[test]
    fn transform_serde_roundtrip() {
        for transform in [
            PostTransform::Identity,
            PostTransform::Sigmoid { alpha: 2.0 },
            PostTransform::Softmax,
            PostTransform::AnomalyScore { ratio_c: 7.0 },
        ] {
            let json = serde_json::to_string(&transform).unwrap();
            let restored: PostTransform = serde_json::from_str(&json).unwrap();
            assert_eq!(restored, transform);
        }
    }
}
