//! High-level model wrapper.
//!
//! A [`Model`] packages a validated [`Ensemble`] with its [`ModelMeta`] and
//! [`PostTransform`]. Importers produce models, the
//! [`Predictor`](crate::inference::Predictor) consumes them, and the
//! exporter maps them back to native estimator shapes.

pub mod meta;
pub mod transform;

pub use meta::{ModelMeta, TaskKind};
pub use transform::PostTransform;

use crate::error::{Error, Result};
use crate::repr::Ensemble;

/// A complete tree ensemble model.
///
/// Construction via [`Model::new`] validates the ensemble structure and the
/// agreement between ensemble layout and metadata, so downstream code can
/// rely on a well-formed model.
#[derive(Debug, Clone)]
pub struct Model {
    ensemble: Ensemble,
    meta: ModelMeta,
    transform: PostTransform,
}

impl Model {
    /// Assemble and validate a model.
    ///
    /// Checks ensemble structure (tree shapes, group assignments), metadata
    /// agreement (base score length, group/target divisibility, task output
    /// width), and that no tree references a feature beyond
    /// `meta.n_features`.
    pub fn new(ensemble: Ensemble, meta: ModelMeta, transform: PostTransform) -> Result<Self> {
        let model = Self {
            ensemble,
            meta,
            transform,
        };
        model.validate()?;
        Ok(model)
    }

    /// Re-run all structural and metadata checks.
    pub fn validate(&self) -> Result<()> {
        self.ensemble.validate()?;

        let n_groups = self.ensemble.n_groups() as usize;
        let n_targets = self.meta.n_targets;

        if n_targets == 0 {
            return Err(Error::ShapeMismatch {
                reason: "model must predict at least one target".into(),
            });
        }
        if self.meta.base_scores.len() != n_groups {
            return Err(Error::ShapeMismatch {
                reason: format!(
                    "{} base scores for {} output groups",
                    self.meta.base_scores.len(),
                    n_groups
                ),
            });
        }
        if n_groups % n_targets != 0 {
            return Err(Error::ShapeMismatch {
                reason: format!(
                    "{n_groups} output groups not divisible by {n_targets} targets"
                ),
            });
        }

        let width = n_groups / n_targets;
        let width_ok = match self.meta.task {
            TaskKind::Regression => n_targets == 1 && width == 1,
            TaskKind::MultiTargetRegression => width == 1,
            TaskKind::BinaryClassification => n_targets == 1 && (width == 1 || width == 2),
            TaskKind::MulticlassClassification { n_classes } => {
                n_classes >= 2 && width == n_classes
            }
            TaskKind::AnomalyDetection => n_targets == 1 && width == 1,
        };
        if !width_ok {
            return Err(Error::ShapeMismatch {
                reason: format!(
                    "task {:?} cannot produce {width} outputs per target",
                    self.meta.task
                ),
            });
        }

        for (i, tree) in self.ensemble.trees().enumerate() {
            if let Some(max_idx) = tree.max_split_index() {
                if max_idx as usize >= self.meta.n_features {
                    return Err(Error::CorruptModel {
                        reason: format!(
                            "tree {i} splits on feature {max_idx}, but model has {} features",
                            self.meta.n_features
                        ),
                    });
                }
            }
        }

        Ok(())
    }

    /// Get reference to the underlying ensemble.
    pub fn ensemble(&self) -> &Ensemble {
        &self.ensemble
    }

    /// Get reference to model metadata.
    pub fn meta(&self) -> &ModelMeta {
        &self.meta
    }

    /// Output transformation applied after aggregation and base scores.
    pub fn post_transform(&self) -> PostTransform {
        self.transform
    }

    /// Number of trees in the ensemble.
    pub fn n_trees(&self) -> usize {
        self.ensemble.n_trees()
    }

    /// Number of input features.
    pub fn n_features(&self) -> usize {
        self.meta.n_features
    }

    /// Number of output groups.
    pub fn n_groups(&self) -> usize {
        self.ensemble.n_groups() as usize
    }

    /// Number of predicted targets.
    pub fn n_targets(&self) -> usize {
        self.meta.n_targets
    }

    /// Outputs per target (`n_groups / n_targets`): the class count for
    /// classifiers, 1 otherwise.
    pub fn output_width(&self) -> usize {
        self.n_groups() / self.meta.n_targets
    }

    /// Task type.
    pub fn task(&self) -> TaskKind {
        self.meta.task
    }

    /// Base scores (one per output group).
    pub fn base_scores(&self) -> &[f64] {
        &self.meta.base_scores
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repr::Aggregation;

    fn stump(value: f64) -> crate::repr::Tree {
        crate::scalar_tree! {
            0 => num(0, 0.5, L) -> 1, 2,
            1 => leaf(value),
            2 => leaf(value + 1.0),
        }
    }

    #[test]
    fn accepts_well_formed_regression_model() {
        let mut ensemble = Ensemble::new(1, 1, Aggregation::Sum);
        ensemble.push_tree(stump(1.0), 0);

        let model = Model::new(
            ensemble,
            ModelMeta::for_regression(2),
            PostTransform::Identity,
        )
        .unwrap();

        assert_eq!(model.n_groups(), 1);
        assert_eq!(model.output_width(), 1);
        assert_eq!(model.n_trees(), 1);
    }

    #[test]
    fn rejects_base_score_length_mismatch() {
        let ensemble = Ensemble::new(3, 1, Aggregation::Sum);
        let meta = ModelMeta::for_multiclass(4, 3).with_base_scores(vec![0.0]);

        let err = Model::new(ensemble, meta, PostTransform::Softmax).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }

    #[test]
    fn rejects_task_width_disagreement() {
        // 3 groups cannot be a single-target regression.
        let ensemble = Ensemble::new(3, 1, Aggregation::Sum);
        let meta = ModelMeta::for_regression(4).with_base_scores(vec![0.0; 3]);

        let err = Model::new(ensemble, meta, PostTransform::Identity).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }

    #[test]
    fn rejects_feature_index_beyond_meta() {
        let mut ensemble = Ensemble::new(1, 1, Aggregation::Sum);
        ensemble.push_tree(stump(1.0), 0); // splits on feature 0

        let meta = ModelMeta::for_regression(0);
        let err = Model::new(ensemble, meta, PostTransform::Identity).unwrap_err();
        assert!(matches!(err, Error::CorruptModel { .. }));
    }

    #[test]
    fn multi_target_layout() {
        // 3 targets, one group each.
        let mut ensemble = Ensemble::new(3, 1, Aggregation::Average);
        ensemble.push_tree(stump(0.0), 0);
        ensemble.push_tree(stump(0.0), 1);
        ensemble.push_tree(stump(0.0), 2);

        let model = Model::new(
            ensemble,
            ModelMeta::for_multi_target_regression(1, 3),
            PostTransform::Identity,
        )
        .unwrap();

        assert_eq!(model.n_targets(), 3);
        assert_eq!(model.output_width(), 1);
    }
}
