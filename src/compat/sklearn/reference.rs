//! Straight-line reimplementations of scikit-learn's own prediction paths.
//!
//! These walk the estimator descriptions directly and share nothing with
//! the native representation or engine, so equivalence tests compare two
//! genuinely independent code paths. They assume structurally consistent
//! descriptions; rejecting malformed tables is the importer's job.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use crate::error::{Error, Result};

use super::average_path_length;
use super::estimator::{
    GradientBoostingClassifierFit, GradientBoostingRegressorFit,
    HistGradientBoostingClassifierFit, HistGradientBoostingRegressorFit, HistTree,
    IsolationForestFit, RandomForestClassifierFit, RandomForestRegressorFit, SklInit, TreeArrays,
};

/// Walk a classic node table to a leaf. Comparisons with NaN are false, so
/// missing values fall through to the right child.
fn walk_tree(arrays: &TreeArrays, row: ArrayView1<f64>) -> usize {
    let mut node = 0usize;
    while !arrays.is_leaf(node) {
        let v = row[arrays.feature[node] as usize];
        node = if v <= arrays.threshold[node] {
            arrays.children_left[node] as usize
        } else {
            arrays.children_right[node] as usize
        };
    }
    node
}

/// Same walk, also counting edges from the root.
fn walk_tree_with_depth(arrays: &TreeArrays, row: ArrayView1<f64>) -> (usize, u32) {
    let mut node = 0usize;
    let mut depth = 0u32;
    while !arrays.is_leaf(node) {
        let v = row[arrays.feature[node] as usize];
        node = if v <= arrays.threshold[node] {
            arrays.children_left[node] as usize
        } else {
            arrays.children_right[node] as usize
        };
        depth += 1;
    }
    (node, depth)
}

/// `RandomForestRegressor.predict`: per-tree leaf means, averaged.
/// Returns shape `(n_rows, n_targets)`.
pub fn forest_regressor_predict(
    fit: &RandomForestRegressorFit,
    x: ArrayView2<f64>,
) -> Array2<f64> {
    let mut out = Array2::zeros((x.nrows(), fit.n_targets));
    for (i, row) in x.axis_iter(Axis(0)).enumerate() {
        for arrays in &fit.trees {
            let leaf = walk_tree(arrays, row);
            for (t, cell) in arrays.value[leaf].iter().enumerate() {
                out[[i, t]] += cell[0];
            }
        }
    }
    out /= fit.trees.len() as f64;
    out
}

/// `RandomForestClassifier.predict_proba`: per-tree class fractions,
/// averaged. Returns one `(n_rows, n_classes)` matrix per target.
pub fn forest_classifier_proba(
    fit: &RandomForestClassifierFit,
    x: ArrayView2<f64>,
) -> Vec<Array2<f64>> {
    let mut out = vec![Array2::zeros((x.nrows(), fit.n_classes)); fit.n_targets];
    for (i, row) in x.axis_iter(Axis(0)).enumerate() {
        for arrays in &fit.trees {
            let leaf = walk_tree(arrays, row);
            for (t, cell) in arrays.value[leaf].iter().enumerate() {
                let sum: f64 = cell.iter().sum();
                for (k, &v) in cell.iter().enumerate() {
                    out[t][[i, k]] += if sum > 0.0 { v / sum } else { v };
                }
            }
        }
    }
    for per_target in &mut out {
        *per_target /= fit.trees.len() as f64;
    }
    out
}

/// `GradientBoostingRegressor.predict`: constant init plus shrunken leaf
/// sums.
pub fn boosting_regressor_predict(
    fit: &GradientBoostingRegressorFit,
    x: ArrayView2<f64>,
) -> Result<Array1<f64>> {
    let base = match &fit.init {
        SklInit::Zero => 0.0,
        SklInit::Mean { constant } => *constant,
        SklInit::Prior { .. } | SklInit::Fitted { .. } => {
            return Err(Error::UnsupportedConstruct {
                reason: "cannot evaluate a non-constant initial estimator".into(),
            });
        }
    };

    let mut out = Array1::from_elem(x.nrows(), base);
    for (i, row) in x.axis_iter(Axis(0)).enumerate() {
        for arrays in &fit.estimators {
            let leaf = walk_tree(arrays, row);
            out[i] += fit.learning_rate * arrays.value[leaf][0][0];
        }
    }
    Ok(out)
}

/// `GradientBoostingClassifier.predict_proba`: raw scores from the prior
/// plus shrunken leaf sums, squashed per row. Returns `(n_rows, n_classes)`.
pub fn boosting_classifier_proba(
    fit: &GradientBoostingClassifierFit,
    x: ArrayView2<f64>,
) -> Result<Array2<f64>> {
    let n_classes = fit.n_classes;
    let n_groups = if n_classes == 2 { 1 } else { n_classes };
    let init_raw: Vec<f64> = match &fit.init {
        SklInit::Zero => vec![0.0; n_groups],
        SklInit::Prior { class_prior } if class_prior.len() == n_classes => {
            if n_classes == 2 {
                let p = class_prior[1].clamp(1e-7, 1.0 - 1e-7);
                vec![(p / (1.0 - p)).ln()]
            } else {
                class_prior.iter().map(|&p| p.max(1e-7).ln()).collect()
            }
        }
        SklInit::Prior { class_prior } => {
            return Err(Error::ShapeMismatch {
                reason: format!(
                    "class prior covers {} classes, expected {n_classes}",
                    class_prior.len()
                ),
            });
        }
        SklInit::Mean { .. } | SklInit::Fitted { .. } => {
            return Err(Error::UnsupportedConstruct {
                reason: "cannot evaluate a non-constant initial estimator".into(),
            });
        }
    };

    let mut out = Array2::zeros((x.nrows(), n_classes));
    let mut raw = vec![0.0f64; n_groups];
    for (i, row) in x.axis_iter(Axis(0)).enumerate() {
        raw.copy_from_slice(&init_raw);
        for round in &fit.estimators {
            for (group, arrays) in round.iter().enumerate() {
                let leaf = walk_tree(arrays, row);
                raw[group] += fit.learning_rate * arrays.value[leaf][0][0];
            }
        }
        if n_classes == 2 {
            let p = sigmoid(raw[0]);
            out[[i, 0]] = 1.0 - p;
            out[[i, 1]] = p;
        } else {
            for (k, p) in softmax(&raw).into_iter().enumerate() {
                out[[i, k]] = p;
            }
        }
    }
    Ok(out)
}

/// Walk one histogram predictor tree to its leaf value. NaN takes the
/// recorded missing direction; categorical splits test left-set membership.
fn walk_hist_tree(tree: &HistTree, row: ArrayView1<f64>) -> f64 {
    let mut idx = 0usize;
    loop {
        let node = &tree.nodes[idx];
        if node.is_leaf {
            return node.value;
        }
        let v = row[node.feature_idx];
        let go_left = if v.is_nan() {
            node.missing_go_to_left
        } else if node.is_categorical {
            in_left_bitset(&tree.raw_left_cat_bitsets[node.bitset_idx], v)
        } else {
            v <= node.num_threshold
        };
        idx = if go_left { node.left } else { node.right };
    }
}

/// Membership test against a packed 256-bit left-category set. Values
/// outside the non-negative integers below 256 are never members.
fn in_left_bitset(bitset: &[u32; 8], value: f64) -> bool {
    if !(0.0..256.0).contains(&value) || value.fract() != 0.0 {
        return false;
    }
    let c = value as u32;
    bitset[(c >> 5) as usize] & (1 << (c & 31)) != 0
}

/// `HistGradientBoostingRegressor.predict`: baseline plus raw leaf sums.
pub fn hist_regressor_predict(
    fit: &HistGradientBoostingRegressorFit,
    x: ArrayView2<f64>,
) -> Array1<f64> {
    let mut out = Array1::from_elem(x.nrows(), fit.baseline_prediction);
    for (i, row) in x.axis_iter(Axis(0)).enumerate() {
        for tree in &fit.predictors {
            out[i] += walk_hist_tree(tree, row);
        }
    }
    out
}

/// `HistGradientBoostingClassifier.predict_proba`. Returns
/// `(n_rows, n_classes)`.
pub fn hist_classifier_proba(
    fit: &HistGradientBoostingClassifierFit,
    x: ArrayView2<f64>,
) -> Array2<f64> {
    let n_classes = fit.n_classes;
    let n_groups = fit.baseline_prediction.len();
    let mut out = Array2::zeros((x.nrows(), n_classes));
    let mut raw = vec![0.0f64; n_groups];
    for (i, row) in x.axis_iter(Axis(0)).enumerate() {
        raw.copy_from_slice(&fit.baseline_prediction);
        for iteration in &fit.predictors {
            for (group, tree) in iteration.iter().enumerate() {
                raw[group] += walk_hist_tree(tree, row);
            }
        }
        if n_classes == 2 {
            let p = sigmoid(raw[0]);
            out[[i, 0]] = 1.0 - p;
            out[[i, 1]] = p;
        } else {
            for (k, p) in softmax(&raw).into_iter().enumerate() {
                out[[i, k]] = p;
            }
        }
    }
    out
}

/// `IsolationForest.score_samples`: negated power of the averaged,
/// normalized path length.
pub fn isolation_score_samples(fit: &IsolationForestFit, x: ArrayView2<f64>) -> Array1<f64> {
    let ratio_c = average_path_length(fit.max_samples as f64);
    let mut out = Array1::zeros(x.nrows());
    for (i, row) in x.axis_iter(Axis(0)).enumerate() {
        let mut total = 0.0;
        for arrays in &fit.trees {
            let (leaf, depth) = walk_tree_with_depth(arrays, row);
            total += f64::from(depth) + average_path_length(arrays.n_node_samples[leaf] as f64);
        }
        let avg = total / fit.trees.len() as f64;
        out[i] = -((-avg / ratio_c).exp2());
    }
    out
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn softmax(raw: &[f64]) -> Vec<f64> {
    let max = raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut exp: Vec<f64> = raw.iter().map(|&v| (v - max).exp()).collect();
    let sum: f64 = exp.iter().sum();
    for v in &mut exp {
        *v /= sum;
    }
    exp
}
