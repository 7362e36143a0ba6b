//! Batch prediction over tree ensemble models.
//!
//! The predictor walks every tree per sample, accumulates leaf vectors into
//! per-group slots, applies the ensemble's aggregation and base scores, and
//! finishes with the model's post-transform. Rows are independent, so
//! batches parallelize across samples; within a row, trees are always
//! visited in ensemble order, which keeps results identical for any thread
//! count.

use ndarray::{Array2, Array3, ArrayView1, ArrayView2, Axis};

use crate::error::{Error, Result};
use crate::model::Model;
use crate::repr::Aggregation;
use crate::utils::Parallelism;

/// Batch predictor over a borrowed [`Model`].
///
/// # Example
///
/// ```ignore
/// use arbors::{Parallelism, Predictor};
///
/// let predictor = Predictor::new(&model);
/// let output = predictor.predict(features.view(), Parallelism::Parallel)?;
/// assert_eq!(output.shape(), &[n_rows, model.n_targets(), model.output_width()]);
/// ```
#[derive(Debug)]
pub struct Predictor<'m> {
    model: &'m Model,
    /// Per-group tree counts, used as averaging divisors.
    group_counts: Vec<f64>,
}

impl<'m> Predictor<'m> {
    /// Create a predictor for the given model.
    pub fn new(model: &'m Model) -> Self {
        let group_counts = model
            .ensemble()
            .group_tree_counts()
            .into_iter()
            .map(f64::from)
            .collect();
        Self {
            model,
            group_counts,
        }
    }

    /// Get a reference to the underlying model.
    #[inline]
    pub fn model(&self) -> &Model {
        self.model
    }

    /// Shape of the output tensor for a batch of `n_rows` samples:
    /// `(n_rows, n_targets, outputs_per_target)`.
    #[inline]
    pub fn output_shape(&self, n_rows: usize) -> (usize, usize, usize) {
        (n_rows, self.model.n_targets(), self.model.output_width())
    }

    /// Predict final outputs for a batch of samples.
    ///
    /// `features` has shape `(n_rows, n_features)`; missing values are NaN.
    /// Returns the canonical `(n_rows, n_targets, outputs_per_target)`
    /// tensor after aggregation, base scores, and the post-transform.
    pub fn predict(
        &self,
        features: ArrayView2<f64>,
        parallelism: Parallelism,
    ) -> Result<Array3<f64>> {
        self.check_features(&features)?;

        let n_rows = features.nrows();
        let n_groups = self.model.n_groups();
        let transform = self.model.post_transform();

        let mut flat = vec![0.0f64; n_rows * n_groups];
        parallelism.maybe_par_bridge_for_each(
            flat.chunks_mut(n_groups).zip(features.axis_iter(Axis(0))),
            |(out_row, row)| {
                self.accumulate_margin(&row, out_row);
                transform.transform_inplace(out_row, n_groups);
            },
        );

        let shape = self.output_shape(n_rows);
        Ok(Array3::from_shape_vec(shape, flat).expect("output buffer sized to shape"))
    }

    /// Predict raw margins for a batch of samples.
    ///
    /// Like [`predict`](Self::predict) but stops after aggregation and base
    /// scores, skipping the post-transform. Returns shape
    /// `(n_rows, n_groups)`.
    pub fn predict_raw(
        &self,
        features: ArrayView2<f64>,
        parallelism: Parallelism,
    ) -> Result<Array2<f64>> {
        self.check_features(&features)?;

        let n_rows = features.nrows();
        let n_groups = self.model.n_groups();

        let mut flat = vec![0.0f64; n_rows * n_groups];
        parallelism.maybe_par_bridge_for_each(
            flat.chunks_mut(n_groups).zip(features.axis_iter(Axis(0))),
            |(out_row, row)| {
                self.accumulate_margin(&row, out_row);
            },
        );

        Ok(Array2::from_shape_vec((n_rows, n_groups), flat)
            .expect("output buffer sized to shape"))
    }

    /// Return the leaf node reached in every tree for every sample.
    ///
    /// Output shape is `(n_rows, n_trees)`, trees in ensemble order.
    pub fn predict_leaf_id(
        &self,
        features: ArrayView2<f64>,
        parallelism: Parallelism,
    ) -> Result<Array2<u32>> {
        self.check_features(&features)?;

        let n_rows = features.nrows();
        let n_trees = self.model.n_trees();
        if n_trees == 0 {
            return Ok(Array2::zeros((n_rows, 0)));
        }

        let mut flat = vec![0u32; n_rows * n_trees];
        parallelism.maybe_par_bridge_for_each(
            flat.chunks_mut(n_trees).zip(features.axis_iter(Axis(0))),
            |(out_row, row)| {
                for (slot, tree) in out_row.iter_mut().zip(self.model.ensemble().trees()) {
                    *slot = tree.traverse_to_leaf(&row);
                }
            },
        );

        Ok(Array2::from_shape_vec((n_rows, n_trees), flat)
            .expect("output buffer sized to shape"))
    }

    /// Accumulate the post-aggregation margin for one sample into `out`
    /// (length `n_groups`, zero-initialized by the caller).
    fn accumulate_margin(&self, row: &ArrayView1<'_, f64>, out: &mut [f64]) {
        let ensemble = self.model.ensemble();

        if ensemble.leaf_len() == 1 {
            // Scalar leaves scatter into the tree's assigned group.
            for (tree, group) in ensemble.trees_with_groups() {
                let leaf = tree.traverse_to_leaf(row);
                out[group as usize] += tree.leaf_value(leaf)[0];
            }
        } else {
            // Vector leaves add elementwise across all groups.
            for tree in ensemble.trees() {
                let leaf = tree.traverse_to_leaf(row);
                for (slot, &value) in out.iter_mut().zip(tree.leaf_value(leaf)) {
                    *slot += value;
                }
            }
        }

        if ensemble.aggregation() == Aggregation::Average {
            for (slot, &count) in out.iter_mut().zip(&self.group_counts) {
                if count > 0.0 {
                    *slot /= count;
                }
            }
        }

        for (slot, &base) in out.iter_mut().zip(self.model.base_scores()) {
            *slot += base;
        }
    }

    fn check_features(&self, features: &ArrayView2<f64>) -> Result<()> {
        if features.ncols() != self.model.n_features() {
            return Err(Error::ShapeMismatch {
                reason: format!(
                    "input has {} feature columns, model expects {}",
                    features.ncols(),
                    self.model.n_features()
                ),
            });
        }
        Ok(())
    }
}
