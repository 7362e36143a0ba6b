//! Exporter from native models back to scikit-learn estimator descriptions.
//!
//! Only bagging ensembles round-trip: forests keep their per-tree semantics
//! in the node tables, so an averaged, untransformed model with zero base
//! scores maps node for node onto `RandomForest*` arrays. Boosting folds
//! the learning rate into leaves at import and has no native inverse, and
//! anomaly scores bake normalization constants into leaf values, so both
//! refuse to export.

use crate::error::{Error, Result};
use crate::model::{Model, PostTransform, TaskKind};
use crate::repr::{Aggregation, ComparisonOp, Tree};

use super::estimator::{
    RandomForestClassifierFit, RandomForestRegressorFit, SklearnModel, TreeArrays,
};

/// Convert a native [`Model`] back into a scikit-learn forest description.
///
/// Fails with [`Error::UnsupportedForExport`] for model families without a
/// native counterpart and [`Error::ShapeMismatch`] when the model violates
/// the forest invariants (zero base scores, identity transform, leaves as
/// wide as the output).
pub fn export_model(model: &Model) -> Result<SklearnModel> {
    if matches!(model.task(), TaskKind::AnomalyDetection) {
        return Err(Error::UnsupportedForExport {
            reason: "anomaly scores bake normalization constants into leaf values and cannot \
                     be restored to raw depths"
                .into(),
        });
    }
    if model.ensemble().aggregation() == Aggregation::Sum {
        return Err(Error::UnsupportedForExport {
            reason: "boosting ensembles with folded learning rates have no native inverse".into(),
        });
    }
    if model.base_scores().iter().any(|&b| b != 0.0) {
        return Err(Error::ShapeMismatch {
            reason: "forest export requires zero base scores".into(),
        });
    }
    if model.post_transform() != PostTransform::Identity {
        return Err(Error::ShapeMismatch {
            reason: format!(
                "forest export requires an identity transform, model applies {:?}",
                model.post_transform()
            ),
        });
    }
    let n_groups = model.n_groups();
    if model.ensemble().leaf_len() != n_groups {
        return Err(Error::ShapeMismatch {
            reason: format!(
                "leaves hold {} values for {n_groups} output groups; forest export requires \
                 full-vector leaves",
                model.ensemble().leaf_len()
            ),
        });
    }

    let n_targets = model.n_targets();
    let width = model.output_width();
    if model.task().is_classification() && width < 2 {
        return Err(Error::ShapeMismatch {
            reason: format!(
                "classifier with {width} outputs per target cannot be expressed as class \
                 probabilities"
            ),
        });
    }

    let mut trees = Vec::with_capacity(model.n_trees());
    for (tree_idx, tree) in model.ensemble().trees().enumerate() {
        if tree.has_categorical() {
            return Err(Error::UnsupportedForExport {
                reason: format!(
                    "tree {tree_idx} uses categorical splits, which classic node tables cannot \
                     express"
                ),
            });
        }
        trees.push(tree_to_arrays(tree, tree_idx, n_targets, width)?);
    }

    match model.task() {
        TaskKind::Regression | TaskKind::MultiTargetRegression => Ok(
            SklearnModel::RandomForestRegressor(RandomForestRegressorFit {
                n_features: model.n_features(),
                n_targets,
                trees,
            }),
        ),
        TaskKind::BinaryClassification | TaskKind::MulticlassClassification { .. } => Ok(
            SklearnModel::RandomForestClassifier(RandomForestClassifierFit {
                n_features: model.n_features(),
                n_targets,
                n_classes: width,
                trees,
            }),
        ),
        TaskKind::AnomalyDetection => unreachable!("rejected before tree conversion"),
    }
}

/// Lay one tree out as parallel node arrays. Leaf rows get the sentinel
/// children and split fields; internal rows get zero-valued leaf cells.
/// Sample counts are not tracked by the representation and export as 1.
fn tree_to_arrays(
    tree: &Tree,
    tree_idx: usize,
    n_targets: usize,
    width: usize,
) -> Result<TreeArrays> {
    let n_nodes = tree.n_nodes();
    let mut arrays = TreeArrays {
        children_left: Vec::with_capacity(n_nodes),
        children_right: Vec::with_capacity(n_nodes),
        feature: Vec::with_capacity(n_nodes),
        threshold: Vec::with_capacity(n_nodes),
        value: Vec::with_capacity(n_nodes),
        n_node_samples: vec![1; n_nodes],
    };

    for node in 0..n_nodes as u32 {
        if tree.is_leaf(node) {
            arrays.children_left.push(-1);
            arrays.children_right.push(-1);
            arrays.feature.push(-2);
            arrays.threshold.push(-2.0);
            arrays
                .value
                .push(tree.leaf_value(node).chunks(width).map(<[f64]>::to_vec).collect());
        } else {
            if tree.comparison_op(node) != ComparisonOp::LessEqual {
                return Err(Error::UnsupportedForExport {
                    reason: format!(
                        "tree {tree_idx} node {node} compares with {:?}; node tables only \
                         express less-or-equal splits",
                        tree.comparison_op(node)
                    ),
                });
            }
            if !tree.default_left(node) {
                return Err(Error::UnsupportedForExport {
                    reason: format!(
                        "tree {tree_idx} node {node} sends missing values right; node tables \
                         have no missing-value direction and re-import routes them left"
                    ),
                });
            }
            arrays.children_left.push(i64::from(tree.left_child(node)));
            arrays.children_right.push(i64::from(tree.right_child(node)));
            arrays.feature.push(i64::from(tree.split_index(node)));
            arrays.threshold.push(tree.split_threshold(node));
            arrays.value.push(vec![vec![0.0; width]; n_targets]);
        }
    }

    Ok(arrays)
}
