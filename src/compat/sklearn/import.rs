//! Importers from fitted scikit-learn estimators into native models.
//!
//! One adapter per model family; they differ only in how they populate the
//! ensemble and metadata. All of them validate eagerly: a construct the
//! representation cannot hold (string categories, a fitted initial
//! estimator) is a hard error, never an approximation.

use crate::error::{Error, Result};
use crate::model::{Model, ModelMeta, PostTransform, TaskKind};
use crate::repr::{Aggregation, ComparisonOp, Ensemble, Tree, TreeBuilder};

use super::average_path_length;
use super::estimator::{
    CategoricalFeature, CategoryList, GradientBoostingClassifierFit,
    GradientBoostingRegressorFit, HistGradientBoostingClassifierFit,
    HistGradientBoostingRegressorFit, HistTree, IsolationForestFit, RandomForestClassifierFit,
    RandomForestRegressorFit, SklInit, SklearnModel, TreeArrays,
};

/// Convert a fitted estimator description into a native [`Model`].
///
/// Fails with [`Error::UnsupportedConstruct`] for constructs the
/// representation cannot express, [`Error::ShapeMismatch`] for mutually
/// inconsistent description arrays, and [`Error::CorruptModel`] for
/// malformed node tables.
pub fn import_model(model: &SklearnModel) -> Result<Model> {
    match model {
        SklearnModel::RandomForestRegressor(fit) | SklearnModel::ExtraTreesRegressor(fit) => {
            import_forest_regressor(fit)
        }
        SklearnModel::RandomForestClassifier(fit) | SklearnModel::ExtraTreesClassifier(fit) => {
            import_forest_classifier(fit)
        }
        SklearnModel::GradientBoostingRegressor(fit) => import_boosting_regressor(fit),
        SklearnModel::GradientBoostingClassifier(fit) => import_boosting_classifier(fit),
        SklearnModel::HistGradientBoostingRegressor(fit) => import_hist_regressor(fit),
        SklearnModel::HistGradientBoostingClassifier(fit) => import_hist_classifier(fit),
        SklearnModel::IsolationForest(fit) => import_isolation_forest(fit),
    }
}

// =============================================================================
// Classic node tables (shared by the RF / ET / GB / IF adapters)
// =============================================================================

/// Check that one classic node table's parallel arrays agree in length.
fn check_tree_arrays(arrays: &TreeArrays, tree_idx: usize) -> Result<usize> {
    let n_nodes = arrays.children_left.len();
    if n_nodes == 0 {
        return Err(Error::CorruptModel {
            reason: format!("tree {tree_idx} has no nodes"),
        });
    }
    let lens = [
        ("children_right", arrays.children_right.len()),
        ("feature", arrays.feature.len()),
        ("threshold", arrays.threshold.len()),
        ("value", arrays.value.len()),
        ("n_node_samples", arrays.n_node_samples.len()),
    ];
    for (name, len) in lens {
        if len != n_nodes {
            return Err(Error::ShapeMismatch {
                reason: format!("tree {tree_idx}: {name} has {len} entries for {n_nodes} nodes"),
            });
        }
    }
    Ok(n_nodes)
}

/// Convert one classic node table into a native tree, with `leaf_value`
/// supplying the stored vector for each leaf node.
///
/// Classic tables carry no missing-value direction; imported splits send
/// missing values left.
fn convert_tree_arrays<F>(
    arrays: &TreeArrays,
    tree_idx: usize,
    leaf_len: usize,
    mut leaf_value: F,
) -> Result<Tree>
where
    F: FnMut(usize) -> Result<Vec<f64>>,
{
    let n_nodes = check_tree_arrays(arrays, tree_idx)?;
    let mut builder = TreeBuilder::new(n_nodes, leaf_len);

    for node in 0..n_nodes {
        if arrays.is_leaf(node) {
            builder.set_leaf(node as u32, &leaf_value(node)?);
            continue;
        }
        let left = arrays.children_left[node];
        let right = arrays.children_right[node];
        for (side, child) in [("left", left), ("right", right)] {
            if child < 0 || child as usize >= n_nodes {
                return Err(Error::CorruptModel {
                    reason: format!(
                        "tree {tree_idx} node {node}: {side} child {child} out of bounds \
                         ({n_nodes} nodes)"
                    ),
                });
            }
        }
        let feature = arrays.feature[node];
        if feature < 0 {
            return Err(Error::CorruptModel {
                reason: format!("tree {tree_idx} node {node}: negative split feature {feature}"),
            });
        }
        let feature = u32::try_from(feature).map_err(|_| Error::CorruptModel {
            reason: format!(
                "tree {tree_idx} node {node}: split feature {feature} exceeds the index range"
            ),
        })?;
        builder.set_numerical_split(
            node as u32,
            feature,
            ComparisonOp::LessEqual,
            arrays.threshold[node],
            true,
            left as u32,
            right as u32,
        );
    }

    builder.build().map_err(|err| Error::CorruptModel {
        reason: format!("tree {tree_idx}: {err}"),
    })
}

/// Pull a regression leaf vector (one mean per target) out of a `value` row.
fn regression_leaf(
    arrays: &TreeArrays,
    tree_idx: usize,
    node: usize,
    n_targets: usize,
) -> Result<Vec<f64>> {
    let row = &arrays.value[node];
    if row.len() != n_targets {
        return Err(Error::ShapeMismatch {
            reason: format!(
                "tree {tree_idx} node {node}: value row covers {} targets, expected {n_targets}",
                row.len()
            ),
        });
    }
    let mut out = Vec::with_capacity(n_targets);
    for (target, cell) in row.iter().enumerate() {
        if cell.len() != 1 {
            return Err(Error::ShapeMismatch {
                reason: format!(
                    "tree {tree_idx} node {node} target {target}: {} values for a regression \
                     output",
                    cell.len()
                ),
            });
        }
        out.push(cell[0]);
    }
    Ok(out)
}

/// Pull a classification leaf vector out of a `value` row: per-target
/// class fractions, normalized so count-valued and fraction-valued source
/// arrays import identically, concatenated target-major.
fn class_fraction_leaf(
    arrays: &TreeArrays,
    tree_idx: usize,
    node: usize,
    n_targets: usize,
    n_classes: usize,
) -> Result<Vec<f64>> {
    let row = &arrays.value[node];
    if row.len() != n_targets {
        return Err(Error::ShapeMismatch {
            reason: format!(
                "tree {tree_idx} node {node}: value row covers {} targets, expected {n_targets}",
                row.len()
            ),
        });
    }
    let mut out = Vec::with_capacity(n_targets * n_classes);
    for (target, cell) in row.iter().enumerate() {
        if cell.len() != n_classes {
            return Err(Error::UnsupportedConstruct {
                reason: format!(
                    "tree {tree_idx} node {node}: target {target} has {} classes, expected \
                     {n_classes} (class counts must be uniform across targets)",
                    cell.len()
                ),
            });
        }
        let sum: f64 = cell.iter().sum();
        if sum > 0.0 {
            out.extend(cell.iter().map(|v| v / sum));
        } else {
            out.extend_from_slice(cell);
        }
    }
    Ok(out)
}

/// Pull a boosting leaf scalar out of a `value` row, folding in the
/// learning rate.
fn boosting_leaf(
    arrays: &TreeArrays,
    tree_idx: usize,
    node: usize,
    learning_rate: f64,
) -> Result<Vec<f64>> {
    let row = &arrays.value[node];
    if row.len() != 1 || row[0].len() != 1 {
        return Err(Error::ShapeMismatch {
            reason: format!(
                "tree {tree_idx} node {node}: boosting leaves hold one scalar, got {}x{} values",
                row.len(),
                row.first().map_or(0, Vec::len)
            ),
        });
    }
    Ok(vec![row[0][0] * learning_rate])
}

// =============================================================================
// Bagging ensembles (random forest, extra-trees)
// =============================================================================

fn import_forest_regressor(fit: &RandomForestRegressorFit) -> Result<Model> {
    if fit.n_targets == 0 {
        return Err(Error::CorruptModel {
            reason: "forest regressor describes zero targets".into(),
        });
    }
    let n_targets = fit.n_targets;

    let mut ensemble = Ensemble::new(n_targets as u32, n_targets, Aggregation::Average);
    for (tree_idx, arrays) in fit.trees.iter().enumerate() {
        let tree = convert_tree_arrays(arrays, tree_idx, n_targets, |node| {
            regression_leaf(arrays, tree_idx, node, n_targets)
        })?;
        ensemble.push_tree(tree, 0);
    }

    let meta = if n_targets == 1 {
        ModelMeta::for_regression(fit.n_features)
    } else {
        ModelMeta::for_multi_target_regression(fit.n_features, n_targets)
    };
    Model::new(ensemble, meta, PostTransform::Identity)
}

fn import_forest_classifier(fit: &RandomForestClassifierFit) -> Result<Model> {
    if fit.n_targets == 0 {
        return Err(Error::CorruptModel {
            reason: "forest classifier describes zero targets".into(),
        });
    }
    if fit.n_classes < 2 {
        return Err(Error::CorruptModel {
            reason: format!("forest classifier describes {} classes", fit.n_classes),
        });
    }
    let n_groups = fit.n_targets * fit.n_classes;

    let mut ensemble = Ensemble::new(n_groups as u32, n_groups, Aggregation::Average);
    for (tree_idx, arrays) in fit.trees.iter().enumerate() {
        let tree = convert_tree_arrays(arrays, tree_idx, n_groups, |node| {
            class_fraction_leaf(arrays, tree_idx, node, fit.n_targets, fit.n_classes)
        })?;
        ensemble.push_tree(tree, 0);
    }

    let meta = if fit.n_targets == 1 && fit.n_classes == 2 {
        ModelMeta::for_binary(fit.n_features, 2)
    } else {
        ModelMeta {
            n_features: fit.n_features,
            n_targets: fit.n_targets,
            task: TaskKind::MulticlassClassification {
                n_classes: fit.n_classes,
            },
            base_scores: vec![0.0; n_groups],
        }
    };
    Model::new(ensemble, meta, PostTransform::Identity)
}

// =============================================================================
// Gradient boosting (classic)
// =============================================================================

fn import_boosting_regressor(fit: &GradientBoostingRegressorFit) -> Result<Model> {
    let base = match &fit.init {
        SklInit::Zero => 0.0,
        SklInit::Mean { constant } => *constant,
        SklInit::Prior { .. } => {
            return Err(Error::CorruptModel {
                reason: "class-prior initializer on a boosting regressor".into(),
            });
        }
        SklInit::Fitted { description } => {
            return Err(Error::UnsupportedConstruct {
                reason: format!(
                    "initial estimator {description:?} is not a constant and cannot be folded \
                     into base scores"
                ),
            });
        }
    };

    let mut ensemble = Ensemble::new(1, 1, Aggregation::Sum);
    for (tree_idx, arrays) in fit.estimators.iter().enumerate() {
        let tree = convert_tree_arrays(arrays, tree_idx, 1, |node| {
            boosting_leaf(arrays, tree_idx, node, fit.learning_rate)
        })?;
        ensemble.push_tree(tree, 0);
    }

    let meta = ModelMeta::for_regression(fit.n_features).with_base_scores(vec![base]);
    Model::new(ensemble, meta, PostTransform::Identity)
}

fn import_boosting_classifier(fit: &GradientBoostingClassifierFit) -> Result<Model> {
    let n_classes = fit.n_classes;
    if n_classes < 2 {
        return Err(Error::CorruptModel {
            reason: format!("boosting classifier describes {n_classes} classes"),
        });
    }
    // Binary problems boost a single positive-class margin; multiclass
    // boosts one group per class, with rounds laid out group-major.
    let n_groups = if n_classes == 2 { 1 } else { n_classes };
    let base_scores = boosting_class_priors(&fit.init, n_classes)?;

    let mut ensemble = Ensemble::new(n_groups as u32, 1, Aggregation::Sum);
    for (round, group_trees) in fit.estimators.iter().enumerate() {
        if group_trees.len() != n_groups {
            return Err(Error::ShapeMismatch {
                reason: format!(
                    "boosting round {round} has {} trees, expected {n_groups}",
                    group_trees.len()
                ),
            });
        }
        for (group, arrays) in group_trees.iter().enumerate() {
            let tree_idx = round * n_groups + group;
            let tree = convert_tree_arrays(arrays, tree_idx, 1, |node| {
                boosting_leaf(arrays, tree_idx, node, fit.learning_rate)
            })?;
            ensemble.push_tree(tree, group as u32);
        }
    }

    let (meta, transform) = if n_classes == 2 {
        (
            ModelMeta::for_binary(fit.n_features, 1).with_base_scores(base_scores),
            PostTransform::Sigmoid { alpha: 1.0 },
        )
    } else {
        (
            ModelMeta::for_multiclass(fit.n_features, n_classes).with_base_scores(base_scores),
            PostTransform::Softmax,
        )
    };
    Model::new(ensemble, meta, transform)
}

/// Fold a classifier's initial estimator into per-group raw scores: the
/// positive-class log odds for binary problems, per-class log priors
/// otherwise.
fn boosting_class_priors(init: &SklInit, n_classes: usize) -> Result<Vec<f64>> {
    let n_groups = if n_classes == 2 { 1 } else { n_classes };
    match init {
        SklInit::Zero => Ok(vec![0.0; n_groups]),
        SklInit::Prior { class_prior } => {
            if class_prior.len() != n_classes {
                return Err(Error::ShapeMismatch {
                    reason: format!(
                        "class prior covers {} classes, expected {n_classes}",
                        class_prior.len()
                    ),
                });
            }
            if n_classes == 2 {
                let p = class_prior[1].clamp(1e-7, 1.0 - 1e-7);
                Ok(vec![(p / (1.0 - p)).ln()])
            } else {
                Ok(class_prior.iter().map(|&p| p.max(1e-7).ln()).collect())
            }
        }
        SklInit::Mean { .. } => Err(Error::CorruptModel {
            reason: "mean initializer on a boosting classifier".into(),
        }),
        SklInit::Fitted { description } => Err(Error::UnsupportedConstruct {
            reason: format!(
                "initial estimator {description:?} is not a constant and cannot be folded into \
                 base scores"
            ),
        }),
    }
}

// =============================================================================
// Histogram gradient boosting
// =============================================================================

/// Reject categorical feature descriptions the representation cannot hold:
/// string-valued categories, negative or fractional numeric values.
fn check_categorical_features(features: &[CategoricalFeature]) -> Result<()> {
    for feat in features {
        match &feat.categories {
            CategoryList::Str(_) => {
                return Err(Error::UnsupportedConstruct {
                    reason: format!(
                        "String categories are not supported (feature {})",
                        feat.feature_idx
                    ),
                });
            }
            CategoryList::Numeric(values) => {
                for &v in values {
                    if !v.is_finite() || v < 0.0 || v.fract() != 0.0 {
                        return Err(Error::UnsupportedConstruct {
                            reason: format!(
                                "feature {} has category value {v} outside the non-negative \
                                 integers",
                                feat.feature_idx
                            ),
                        });
                    }
                }
            }
        }
    }
    Ok(())
}

/// Convert one histogram predictor tree. Leaves are stored pre-shrunken,
/// so values copy through unscaled; left bitsets become left-routing
/// category sets.
fn convert_hist_tree(hist: &HistTree, tree_idx: usize) -> Result<Tree> {
    let n_nodes = hist.nodes.len();
    if n_nodes == 0 {
        return Err(Error::CorruptModel {
            reason: format!("tree {tree_idx} has no nodes"),
        });
    }

    let mut builder = TreeBuilder::new(n_nodes, 1);
    for (idx, node) in hist.nodes.iter().enumerate() {
        if node.is_leaf {
            builder.set_leaf(idx as u32, &[node.value]);
            continue;
        }
        for (side, child) in [("left", node.left), ("right", node.right)] {
            if child >= n_nodes {
                return Err(Error::CorruptModel {
                    reason: format!(
                        "tree {tree_idx} node {idx}: {side} child {child} out of bounds \
                         ({n_nodes} nodes)"
                    ),
                });
            }
        }
        let feature = u32::try_from(node.feature_idx).map_err(|_| Error::CorruptModel {
            reason: format!(
                "tree {tree_idx} node {idx}: split feature {} exceeds the index range",
                node.feature_idx
            ),
        })?;
        if node.is_categorical {
            let bitset =
                hist.raw_left_cat_bitsets
                    .get(node.bitset_idx)
                    .ok_or_else(|| Error::CorruptModel {
                        reason: format!(
                            "tree {tree_idx} node {idx}: bitset index {} out of range \
                             ({} bitsets)",
                            node.bitset_idx,
                            hist.raw_left_cat_bitsets.len()
                        ),
                    })?;
            let mut words = bitset.to_vec();
            while words.last() == Some(&0) {
                words.pop();
            }
            builder.set_categorical_split(
                idx as u32,
                feature,
                words,
                false,
                node.missing_go_to_left,
                node.left as u32,
                node.right as u32,
            );
        } else {
            builder.set_numerical_split(
                idx as u32,
                feature,
                ComparisonOp::LessEqual,
                node.num_threshold,
                node.missing_go_to_left,
                node.left as u32,
                node.right as u32,
            );
        }
    }

    builder.build().map_err(|err| Error::CorruptModel {
        reason: format!("tree {tree_idx}: {err}"),
    })
}

fn import_hist_regressor(fit: &HistGradientBoostingRegressorFit) -> Result<Model> {
    check_categorical_features(&fit.categorical_features)?;

    let mut ensemble = Ensemble::new(1, 1, Aggregation::Sum);
    for (tree_idx, hist) in fit.predictors.iter().enumerate() {
        ensemble.push_tree(convert_hist_tree(hist, tree_idx)?, 0);
    }

    let meta =
        ModelMeta::for_regression(fit.n_features).with_base_scores(vec![fit.baseline_prediction]);
    Model::new(ensemble, meta, PostTransform::Identity)
}

fn import_hist_classifier(fit: &HistGradientBoostingClassifierFit) -> Result<Model> {
    check_categorical_features(&fit.categorical_features)?;
    let n_classes = fit.n_classes;
    if n_classes < 2 {
        return Err(Error::CorruptModel {
            reason: format!("boosting classifier describes {n_classes} classes"),
        });
    }
    let n_groups = if n_classes == 2 { 1 } else { n_classes };
    if fit.baseline_prediction.len() != n_groups {
        return Err(Error::ShapeMismatch {
            reason: format!(
                "baseline prediction covers {} groups, expected {n_groups}",
                fit.baseline_prediction.len()
            ),
        });
    }

    let mut ensemble = Ensemble::new(n_groups as u32, 1, Aggregation::Sum);
    for (iteration, group_trees) in fit.predictors.iter().enumerate() {
        if group_trees.len() != n_groups {
            return Err(Error::ShapeMismatch {
                reason: format!(
                    "boosting round {iteration} has {} trees, expected {n_groups}",
                    group_trees.len()
                ),
            });
        }
        for (group, hist) in group_trees.iter().enumerate() {
            let tree_idx = iteration * n_groups + group;
            ensemble.push_tree(convert_hist_tree(hist, tree_idx)?, group as u32);
        }
    }

    let (meta, transform) = if n_classes == 2 {
        (
            ModelMeta::for_binary(fit.n_features, 1)
                .with_base_scores(fit.baseline_prediction.clone()),
            PostTransform::Sigmoid { alpha: 1.0 },
        )
    } else {
        (
            ModelMeta::for_multiclass(fit.n_features, n_classes)
                .with_base_scores(fit.baseline_prediction.clone()),
            PostTransform::Softmax,
        )
    };
    Model::new(ensemble, meta, transform)
}

// =============================================================================
// Isolation forest
// =============================================================================

fn import_isolation_forest(fit: &IsolationForestFit) -> Result<Model> {
    if fit.max_samples < 2 {
        return Err(Error::CorruptModel {
            reason: format!(
                "isolation forest with max_samples {} cannot normalize depths",
                fit.max_samples
            ),
        });
    }

    let mut ensemble = Ensemble::new(1, 1, Aggregation::Average);
    for (tree_idx, arrays) in fit.trees.iter().enumerate() {
        let depths = node_depths(arrays, tree_idx)?;
        let tree = convert_tree_arrays(arrays, tree_idx, 1, |node| {
            let n = arrays.n_node_samples[node];
            if n < 0 {
                return Err(Error::CorruptModel {
                    reason: format!("tree {tree_idx} node {node}: negative sample count {n}"),
                });
            }
            Ok(vec![f64::from(depths[node]) + average_path_length(n as f64)])
        })?;
        ensemble.push_tree(tree, 0);
    }

    let ratio_c = average_path_length(fit.max_samples as f64);
    let meta = ModelMeta::for_anomaly(fit.n_features);
    Model::new(ensemble, meta, PostTransform::AnomalyScore { ratio_c })
}

/// Depth in edges of every node reachable from the root.
fn node_depths(arrays: &TreeArrays, tree_idx: usize) -> Result<Vec<u32>> {
    let n_nodes = check_tree_arrays(arrays, tree_idx)?;
    let mut depths = vec![0u32; n_nodes];
    let mut seen = vec![false; n_nodes];
    seen[0] = true;

    let mut stack = vec![0usize];
    while let Some(node) = stack.pop() {
        if arrays.is_leaf(node) {
            continue;
        }
        for child in [arrays.children_left[node], arrays.children_right[node]] {
            if child < 0 || child as usize >= n_nodes {
                return Err(Error::CorruptModel {
                    reason: format!(
                        "tree {tree_idx} node {node}: child {child} out of bounds \
                         ({n_nodes} nodes)"
                    ),
                });
            }
            let child = child as usize;
            if seen[child] {
                return Err(Error::CorruptModel {
                    reason: format!("tree {tree_idx} node {node}: child {child} visited twice"),
                });
            }
            seen[child] = true;
            depths[child] = depths[node] + 1;
            stack.push(child);
        }
    }
    Ok(depths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compat::sklearn::estimator::HistNode;
    use approx::assert_abs_diff_eq;

    /// Depth-1 regression tree: `x0 <= threshold` sends to `left_val`.
    fn stump(threshold: f64, left_val: f64, right_val: f64) -> TreeArrays {
        TreeArrays {
            children_left: vec![1, -1, -1],
            children_right: vec![2, -1, -1],
            feature: vec![0, -2, -2],
            threshold: vec![threshold, -2.0, -2.0],
            value: vec![vec![vec![0.0]], vec![vec![left_val]], vec![vec![right_val]]],
            n_node_samples: vec![3, 1, 2],
        }
    }

    #[test]
    fn forest_classifier_normalizes_counts() {
        let fit = RandomForestClassifierFit {
            n_features: 1,
            n_targets: 1,
            n_classes: 2,
            trees: vec![TreeArrays {
                children_left: vec![-1],
                children_right: vec![-1],
                feature: vec![-2],
                threshold: vec![-2.0],
                value: vec![vec![vec![3.0, 1.0]]],
                n_node_samples: vec![4],
            }],
        };
        let model = import_model(&SklearnModel::RandomForestClassifier(fit)).unwrap();

        assert_eq!(model.ensemble().aggregation(), Aggregation::Average);
        assert_eq!(model.ensemble().tree(0).leaf_value(0), &[0.75, 0.25]);
        assert_eq!(model.base_scores(), &[0.0, 0.0]);
    }

    #[test]
    fn boosting_folds_learning_rate_and_mean_init() {
        let fit = GradientBoostingRegressorFit {
            n_features: 1,
            learning_rate: 0.1,
            init: SklInit::Mean { constant: 5.0 },
            estimators: vec![stump(0.5, -2.0, 2.0)],
        };
        let model = import_model(&SklearnModel::GradientBoostingRegressor(fit)).unwrap();

        assert_eq!(model.base_scores(), &[5.0]);
        let tree = model.ensemble().tree(0);
        assert_abs_diff_eq!(tree.leaf_value(1)[0], -0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(tree.leaf_value(2)[0], 0.2, epsilon = 1e-12);
    }

    #[test]
    fn binary_prior_becomes_log_odds() {
        let fit = GradientBoostingClassifierFit {
            n_features: 1,
            n_classes: 2,
            learning_rate: 1.0,
            init: SklInit::Prior {
                class_prior: vec![0.25, 0.75],
            },
            estimators: vec![vec![stump(0.5, -1.0, 1.0)]],
        };
        let model = import_model(&SklearnModel::GradientBoostingClassifier(fit)).unwrap();

        assert_eq!(model.n_groups(), 1);
        assert_abs_diff_eq!(model.base_scores()[0], 3.0_f64.ln(), epsilon = 1e-12);
        assert!(matches!(
            model.post_transform(),
            PostTransform::Sigmoid { alpha } if alpha == 1.0
        ));
    }

    #[test]
    fn multiclass_prior_becomes_log_priors() {
        let fit = GradientBoostingClassifierFit {
            n_features: 1,
            n_classes: 3,
            learning_rate: 0.5,
            init: SklInit::Prior {
                class_prior: vec![0.2, 0.3, 0.5],
            },
            estimators: vec![vec![
                stump(0.5, -1.0, 1.0),
                stump(0.5, -1.0, 1.0),
                stump(0.5, -1.0, 1.0),
            ]],
        };
        let model = import_model(&SklearnModel::GradientBoostingClassifier(fit)).unwrap();

        assert_eq!(model.n_groups(), 3);
        assert_eq!(model.ensemble().tree_groups(), &[0, 1, 2]);
        assert_abs_diff_eq!(model.base_scores()[0], 0.2_f64.ln(), epsilon = 1e-12);
        assert_abs_diff_eq!(model.base_scores()[2], 0.5_f64.ln(), epsilon = 1e-12);
        assert!(matches!(model.post_transform(), PostTransform::Softmax));
    }

    #[test]
    fn fitted_init_is_rejected() {
        let fit = GradientBoostingRegressorFit {
            n_features: 1,
            learning_rate: 0.1,
            init: SklInit::Fitted {
                description: "Ridge(alpha=1.0)".into(),
            },
            estimators: vec![stump(0.5, -1.0, 1.0)],
        };
        let err = import_model(&SklearnModel::GradientBoostingRegressor(fit)).unwrap_err();
        assert!(matches!(err, Error::UnsupportedConstruct { .. }));
        assert!(err.to_string().contains("Ridge"));
    }

    #[test]
    fn string_categories_are_rejected() {
        let fit = HistGradientBoostingClassifierFit {
            n_features: 2,
            n_classes: 2,
            baseline_prediction: vec![0.0],
            predictors: vec![],
            categorical_features: vec![CategoricalFeature {
                feature_idx: 0,
                categories: CategoryList::Str(vec!["Male".into(), "Female".into()]),
            }],
        };
        let err = import_model(&SklearnModel::HistGradientBoostingClassifier(fit)).unwrap_err();
        assert!(matches!(err, Error::UnsupportedConstruct { .. }));
        assert!(err
            .to_string()
            .contains("String categories are not supported (feature 0)"));
    }

    #[test]
    fn fractional_category_values_are_rejected() {
        let fit = HistGradientBoostingRegressorFit {
            n_features: 1,
            baseline_prediction: 0.0,
            predictors: vec![],
            categorical_features: vec![CategoricalFeature {
                feature_idx: 0,
                categories: CategoryList::Numeric(vec![0.0, 1.5]),
            }],
        };
        let err = import_model(&SklearnModel::HistGradientBoostingRegressor(fit)).unwrap_err();
        assert!(matches!(err, Error::UnsupportedConstruct { .. }));
        assert!(err.to_string().contains("feature 0"));
    }

    #[test]
    fn hist_left_bitsets_become_left_routing_sets() {
        let hist = HistTree {
            nodes: vec![
                HistNode {
                    value: 0.0,
                    feature_idx: 0,
                    num_threshold: 0.0,
                    missing_go_to_left: true,
                    left: 1,
                    right: 2,
                    is_leaf: false,
                    is_categorical: true,
                    bitset_idx: 0,
                },
                HistNode {
                    value: -1.0,
                    feature_idx: 0,
                    num_threshold: 0.0,
                    missing_go_to_left: false,
                    left: 0,
                    right: 0,
                    is_leaf: true,
                    is_categorical: false,
                    bitset_idx: 0,
                },
                HistNode {
                    value: 1.0,
                    feature_idx: 0,
                    num_threshold: 0.0,
                    missing_go_to_left: false,
                    left: 0,
                    right: 0,
                    is_leaf: true,
                    is_categorical: false,
                    bitset_idx: 0,
                },
            ],
            // Categories 0 and 2 go left.
            raw_left_cat_bitsets: vec![[0b101, 0, 0, 0, 0, 0, 0, 0]],
        };
        let fit = HistGradientBoostingRegressorFit {
            n_features: 1,
            baseline_prediction: 0.5,
            predictors: vec![hist],
            categorical_features: vec![CategoricalFeature {
                feature_idx: 0,
                categories: CategoryList::Numeric(vec![0.0, 1.0, 2.0]),
            }],
        };
        let model = import_model(&SklearnModel::HistGradientBoostingRegressor(fit)).unwrap();

        let tree = model.ensemble().tree(0);
        assert!(!tree.categories_go_right(0));
        assert!(tree.categories().contains(0, 0));
        assert!(!tree.categories().contains(0, 1));
        assert!(tree.categories().contains(0, 2));
        // Members route left, non-members right.
        assert_eq!(tree.predict_row(&[2.0]), &[-1.0]);
        assert_eq!(tree.predict_row(&[1.0]), &[1.0]);
        assert_eq!(model.base_scores(), &[0.5]);
    }

    #[test]
    fn isolation_leaves_hold_depth_plus_expected_extension() {
        let fit = IsolationForestFit {
            n_features: 1,
            max_samples: 64,
            trees: vec![stump(0.5, 0.0, 0.0)],
        };
        let model = import_model(&SklearnModel::IsolationForest(fit)).unwrap();

        let tree = model.ensemble().tree(0);
        // Left leaf isolates 1 sample: depth 1 + c(1) = 1.
        assert_abs_diff_eq!(tree.leaf_value(1)[0], 1.0, epsilon = 1e-12);
        // Right leaf covers 2 samples: depth 1 + c(2) = 2.
        assert_abs_diff_eq!(tree.leaf_value(2)[0], 2.0, epsilon = 1e-12);
        assert!(matches!(
            model.post_transform(),
            PostTransform::AnomalyScore { ratio_c } if ratio_c > 0.0
        ));
    }

    #[test]
    fn out_of_bounds_children_are_corrupt() {
        let mut arrays = stump(0.5, -1.0, 1.0);
        arrays.children_right[0] = 7;
        let fit = RandomForestRegressorFit {
            n_features: 1,
            n_targets: 1,
            trees: vec![arrays],
        };
        let err = import_model(&SklearnModel::RandomForestRegressor(fit)).unwrap_err();
        assert!(matches!(err, Error::CorruptModel { .. }));
        assert!(err.to_string().contains("right child 7"));
    }

    #[test]
    fn oversized_feature_indices_are_corrupt() {
        // Truncating to u32 would read either table as splitting on feature 0.
        let mut arrays = stump(0.5, -1.0, 1.0);
        arrays.feature[0] = 1 << 32;
        let fit = RandomForestRegressorFit {
            n_features: 1,
            n_targets: 1,
            trees: vec![arrays],
        };
        let err = import_model(&SklearnModel::RandomForestRegressor(fit)).unwrap_err();
        assert!(matches!(err, Error::CorruptModel { .. }));
        assert!(err.to_string().contains("exceeds the index range"));

        let hist = HistTree {
            nodes: vec![
                HistNode {
                    value: 0.0,
                    feature_idx: 1 << 32,
                    num_threshold: 0.5,
                    missing_go_to_left: true,
                    left: 1,
                    right: 2,
                    is_leaf: false,
                    is_categorical: false,
                    bitset_idx: 0,
                },
                HistNode {
                    value: -1.0,
                    feature_idx: 0,
                    num_threshold: 0.0,
                    missing_go_to_left: false,
                    left: 0,
                    right: 0,
                    is_leaf: true,
                    is_categorical: false,
                    bitset_idx: 0,
                },
                HistNode {
                    value: 1.0,
                    feature_idx: 0,
                    num_threshold: 0.0,
                    missing_go_to_left: false,
                    left: 0,
                    right: 0,
                    is_leaf: true,
                    is_categorical: false,
                    bitset_idx: 0,
                },
            ],
            raw_left_cat_bitsets: vec![],
        };
        let fit = HistGradientBoostingRegressorFit {
            n_features: 1,
            baseline_prediction: 0.0,
            predictors: vec![hist],
            categorical_features: vec![],
        };
        let err = import_model(&SklearnModel::HistGradientBoostingRegressor(fit)).unwrap_err();
        assert!(matches!(err, Error::CorruptModel { .. }));
        assert!(err.to_string().contains("exceeds the index range"));
    }

    #[test]
    fn ragged_class_counts_are_rejected() {
        let fit = RandomForestClassifierFit {
            n_features: 1,
            n_targets: 2,
            n_classes: 3,
            trees: vec![TreeArrays {
                children_left: vec![-1],
                children_right: vec![-1],
                feature: vec![-2],
                threshold: vec![-2.0],
                value: vec![vec![vec![1.0, 2.0, 3.0], vec![1.0, 2.0]]],
                n_node_samples: vec![6],
            }],
        };
        let err = import_model(&SklearnModel::RandomForestClassifier(fit)).unwrap_err();
        assert!(matches!(err, Error::UnsupportedConstruct { .. }));
        assert!(err.to_string().contains("uniform"));
    }

    #[test]
    fn boosting_round_width_is_checked() {
        let fit = GradientBoostingClassifierFit {
            n_features: 1,
            n_classes: 3,
            learning_rate: 0.1,
            init: SklInit::Zero,
            estimators: vec![vec![stump(0.5, -1.0, 1.0), stump(0.5, -1.0, 1.0)]],
        };
        let err = import_model(&SklearnModel::GradientBoostingClassifier(fit)).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
        assert!(err.to_string().contains("round 0"));
    }
}
