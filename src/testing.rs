//! Testing utilities: a compact tree-building macro and seeded generators
//! for estimator descriptions and input matrices.
//!
//! Everything here is deterministic for a given seed, so equivalence tests
//! can exercise hundreds of random trees without storing fixtures.
//!
//! # Usage
//!
//! ```
//! let tree = arbors::scalar_tree! {
//!     0 => num(0, 0.5, L) -> 1, 2,
//!     1 => leaf(-1.0),
//!     2 => leaf(1.0),
//! };
//! assert_eq!(tree.predict_row(&[0.3]), &[-1.0]);
//! ```

use ndarray::Array2;
use rand::prelude::*;

use crate::compat::sklearn::{
    CategoricalFeature, CategoryList, GradientBoostingClassifierFit,
    GradientBoostingRegressorFit, HistGradientBoostingClassifierFit,
    HistGradientBoostingRegressorFit, HistNode, HistTree, IsolationForestFit,
    RandomForestClassifierFit, RandomForestRegressorFit, SklInit, TreeArrays,
};

// =============================================================================
// Tree Construction Macro
// =============================================================================

/// Build a scalar-leaf [`Tree`](crate::repr::Tree) from a node list.
///
/// Each line is `index => kind`, where kind is one of:
///
/// - `num(feature, threshold, L|R) -> left, right`: numerical split,
///   `value <= threshold` goes left; `L`/`R` is the missing direction.
/// - `cat(feature, [c0, c1, ...], L|R) -> left, right`: categorical split,
///   listed categories go right; `L`/`R` is the default direction.
/// - `leaf(value)`: scalar leaf.
///
/// # Panics
///
/// Panics if the described tree fails structural validation.
#[macro_export]
macro_rules! scalar_tree {
    (@dir L) => { true };
    (@dir R) => { false };

    (@count) => { 0usize };
    (@count $node:literal => leaf($v:expr) $(, $($rest:tt)*)?) => {
        1usize $( + $crate::scalar_tree!(@count $($rest)*) )?
    };
    (@count $node:literal => $kind:ident($($args:tt)*) -> $l:literal, $r:literal
        $(, $($rest:tt)*)?) => {
        1usize $( + $crate::scalar_tree!(@count $($rest)*) )?
    };

    (@walk $b:ident;) => {};
    (@walk $b:ident; $node:literal => leaf($v:expr) $(, $($rest:tt)*)?) => {
        $b.set_leaf($node, &[$v]);
        $( $crate::scalar_tree!(@walk $b; $($rest)*); )?
    };
    (@walk $b:ident; $node:literal => num($f:expr, $t:expr, $d:ident) -> $l:literal, $r:literal
        $(, $($rest:tt)*)?) => {
        $b.set_numerical_split(
            $node,
            $f,
            $crate::repr::ComparisonOp::LessEqual,
            $t,
            $crate::scalar_tree!(@dir $d),
            $l,
            $r,
        );
        $( $crate::scalar_tree!(@walk $b; $($rest)*); )?
    };
    (@walk $b:ident; $node:literal => cat($f:expr, [$($c:expr),* $(,)?], $d:ident)
        -> $l:literal, $r:literal $(, $($rest:tt)*)?) => {
        $b.set_categorical_split(
            $node,
            $f,
            $crate::repr::categories_to_bitset(&[$($c),*]),
            true,
            $crate::scalar_tree!(@dir $d),
            $l,
            $r,
        );
        $( $crate::scalar_tree!(@walk $b; $($rest)*); )?
    };

    ( $($body:tt)+ ) => {{
        let n_nodes = $crate::scalar_tree!(@count $($body)+);
        let mut builder = $crate::repr::TreeBuilder::new(n_nodes, 1);
        $crate::scalar_tree!(@walk builder; $($body)+);
        builder.build().expect("macro-built tree is structurally valid")
    }};
}

// =============================================================================
// Random Classic Node Tables
// =============================================================================

fn empty_arrays() -> TreeArrays {
    TreeArrays {
        children_left: Vec::new(),
        children_right: Vec::new(),
        feature: Vec::new(),
        threshold: Vec::new(),
        value: Vec::new(),
        n_node_samples: Vec::new(),
    }
}

/// Grow a random node table in preorder, returning the new node's index.
/// Every node carries a value row, as fitted trees do; sample counts stay
/// consistent (parent = left + right).
fn grow_classic<F>(
    rng: &mut StdRng,
    arrays: &mut TreeArrays,
    n_features: usize,
    depth: u32,
    n_samples: i64,
    leaf_value: &mut F,
) -> i64
where
    F: FnMut(&mut StdRng) -> Vec<Vec<f64>>,
{
    let node = arrays.children_left.len();
    arrays.children_left.push(-1);
    arrays.children_right.push(-1);
    arrays.feature.push(-2);
    arrays.threshold.push(-2.0);
    arrays.value.push(leaf_value(rng));
    arrays.n_node_samples.push(n_samples);

    if depth > 0 && n_samples >= 2 && rng.gen_bool(0.9) {
        let feature = rng.gen_range(0..n_features) as i64;
        let threshold = rng.gen_range(-2.5..2.5);
        let left_samples = rng.gen_range(1..n_samples);
        let left = grow_classic(rng, arrays, n_features, depth - 1, left_samples, leaf_value);
        let right = grow_classic(
            rng,
            arrays,
            n_features,
            depth - 1,
            n_samples - left_samples,
            leaf_value,
        );
        arrays.children_left[node] = left;
        arrays.children_right[node] = right;
        arrays.feature[node] = feature;
        arrays.threshold[node] = threshold;
    }
    node as i64
}

/// Random fitted random-forest (or extra-trees) regressor description.
pub fn random_forest_regressor(
    seed: u64,
    n_trees: usize,
    n_features: usize,
    n_targets: usize,
    depth: u32,
) -> RandomForestRegressorFit {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut leaf = |rng: &mut StdRng| -> Vec<Vec<f64>> {
        (0..n_targets).map(|_| vec![rng.gen_range(-5.0..5.0)]).collect()
    };
    let trees = (0..n_trees)
        .map(|_| {
            let mut arrays = empty_arrays();
            grow_classic(&mut rng, &mut arrays, n_features, depth, 200, &mut leaf);
            arrays
        })
        .collect();
    RandomForestRegressorFit {
        n_features,
        n_targets,
        trees,
    }
}

/// Random fitted random-forest (or extra-trees) classifier description.
/// Leaves carry positive per-class sample counts, not fractions.
pub fn random_forest_classifier(
    seed: u64,
    n_trees: usize,
    n_features: usize,
    n_targets: usize,
    n_classes: usize,
    depth: u32,
) -> RandomForestClassifierFit {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut leaf = |rng: &mut StdRng| -> Vec<Vec<f64>> {
        (0..n_targets)
            .map(|_| {
                (0..n_classes)
                    .map(|_| rng.gen_range(1.0..20.0))
                    .collect::<Vec<f64>>()
            })
            .collect()
    };
    let trees = (0..n_trees)
        .map(|_| {
            let mut arrays = empty_arrays();
            grow_classic(&mut rng, &mut arrays, n_features, depth, 200, &mut leaf);
            arrays
        })
        .collect();
    RandomForestClassifierFit {
        n_features,
        n_targets,
        n_classes,
        trees,
    }
}

fn random_boosting_tree(rng: &mut StdRng, n_features: usize, depth: u32) -> TreeArrays {
    let mut leaf = |rng: &mut StdRng| -> Vec<Vec<f64>> { vec![vec![rng.gen_range(-1.0..1.0)]] };
    let mut arrays = empty_arrays();
    grow_classic(rng, &mut arrays, n_features, depth, 200, &mut leaf);
    arrays
}

/// Random fitted gradient-boosting regressor with a mean initializer.
pub fn random_boosting_regressor(
    seed: u64,
    n_rounds: usize,
    n_features: usize,
    depth: u32,
    learning_rate: f64,
) -> GradientBoostingRegressorFit {
    let mut rng = StdRng::seed_from_u64(seed);
    let init = SklInit::Mean {
        constant: rng.gen_range(-1.0..1.0),
    };
    let estimators = (0..n_rounds)
        .map(|_| random_boosting_tree(&mut rng, n_features, depth))
        .collect();
    GradientBoostingRegressorFit {
        n_features,
        learning_rate,
        init,
        estimators,
    }
}

/// Random fitted gradient-boosting classifier with a class-prior
/// initializer. Binary problems get one tree per round, multiclass one per
/// class per round.
pub fn random_boosting_classifier(
    seed: u64,
    n_rounds: usize,
    n_features: usize,
    n_classes: usize,
    depth: u32,
    learning_rate: f64,
) -> GradientBoostingClassifierFit {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut prior: Vec<f64> = (0..n_classes).map(|_| rng.gen_range(0.1..1.0)).collect();
    let total: f64 = prior.iter().sum();
    for p in &mut prior {
        *p /= total;
    }

    let n_groups = if n_classes == 2 { 1 } else { n_classes };
    let estimators = (0..n_rounds)
        .map(|_| {
            (0..n_groups)
                .map(|_| random_boosting_tree(&mut rng, n_features, depth))
                .collect()
        })
        .collect();
    GradientBoostingClassifierFit {
        n_features,
        n_classes,
        learning_rate,
        init: SklInit::Prior { class_prior: prior },
        estimators,
    }
}

/// Random fitted isolation forest. Trees split their sample budget until
/// isolation or the depth limit, as real isolation trees do.
pub fn random_isolation_forest(
    seed: u64,
    n_trees: usize,
    n_features: usize,
    max_samples: usize,
) -> IsolationForestFit {
    let mut rng = StdRng::seed_from_u64(seed);
    let depth = (max_samples as f64).log2().ceil() as u32;
    let mut leaf = |_: &mut StdRng| -> Vec<Vec<f64>> { vec![vec![0.0]] };
    let trees = (0..n_trees)
        .map(|_| {
            let mut arrays = empty_arrays();
            grow_classic(
                &mut rng,
                &mut arrays,
                n_features,
                depth,
                max_samples as i64,
                &mut leaf,
            );
            arrays
        })
        .collect();
    IsolationForestFit {
        n_features,
        max_samples,
        trees,
    }
}

// =============================================================================
// Random Histogram Predictors
// =============================================================================

/// Grow a random histogram predictor tree, returning the new node's index.
/// Features listed in `categorical` get bitset splits with at least one
/// category on each side (category 0 left, the last one right).
fn grow_hist(
    rng: &mut StdRng,
    nodes: &mut Vec<HistNode>,
    bitsets: &mut Vec<[u32; 8]>,
    n_features: usize,
    categorical: &[(usize, u32)],
    depth: u32,
) -> usize {
    let idx = nodes.len();
    nodes.push(HistNode {
        value: rng.gen_range(-1.0..1.0),
        feature_idx: 0,
        num_threshold: 0.0,
        missing_go_to_left: false,
        left: 0,
        right: 0,
        is_leaf: true,
        is_categorical: false,
        bitset_idx: 0,
    });

    if depth > 0 && rng.gen_bool(0.9) {
        let feature_idx = rng.gen_range(0..n_features);
        let n_categories = categorical
            .iter()
            .find(|(f, _)| *f == feature_idx)
            .map(|&(_, n)| n);
        let (is_categorical, bitset_idx, num_threshold) = match n_categories {
            Some(n) => {
                let mut bitset = [0u32; 8];
                for c in 0..n {
                    let go_left = c == 0 || (c != n - 1 && rng.gen_bool(0.5));
                    if go_left {
                        bitset[(c >> 5) as usize] |= 1 << (c & 31);
                    }
                }
                bitsets.push(bitset);
                (true, bitsets.len() - 1, 0.0)
            }
            None => (false, 0, rng.gen_range(-2.5..2.5)),
        };
        let missing_go_to_left = rng.gen_bool(0.5);
        let left = grow_hist(rng, nodes, bitsets, n_features, categorical, depth - 1);
        let right = grow_hist(rng, nodes, bitsets, n_features, categorical, depth - 1);
        nodes[idx] = HistNode {
            value: 0.0,
            feature_idx,
            num_threshold,
            missing_go_to_left,
            left,
            right,
            is_leaf: false,
            is_categorical,
            bitset_idx,
        };
    }
    idx
}

fn random_hist_tree(
    rng: &mut StdRng,
    n_features: usize,
    categorical: &[(usize, u32)],
    depth: u32,
) -> HistTree {
    let mut nodes = Vec::new();
    let mut bitsets = Vec::new();
    grow_hist(rng, &mut nodes, &mut bitsets, n_features, categorical, depth);
    HistTree {
        nodes,
        raw_left_cat_bitsets: bitsets,
    }
}

fn declare_categories(categorical: &[(usize, u32)]) -> Vec<CategoricalFeature> {
    categorical
        .iter()
        .map(|&(feature_idx, n)| CategoricalFeature {
            feature_idx,
            categories: CategoryList::Numeric((0..n).map(f64::from).collect()),
        })
        .collect()
}

/// Random fitted histogram gradient-boosting regressor.
///
/// `categorical` lists `(feature index, category count)` pairs; counts must
/// be at least 2 and at most 256.
pub fn random_hist_regressor(
    seed: u64,
    n_trees: usize,
    n_features: usize,
    depth: u32,
    categorical: &[(usize, u32)],
) -> HistGradientBoostingRegressorFit {
    let mut rng = StdRng::seed_from_u64(seed);
    let baseline_prediction = rng.gen_range(-1.0..1.0);
    let predictors = (0..n_trees)
        .map(|_| random_hist_tree(&mut rng, n_features, categorical, depth))
        .collect();
    HistGradientBoostingRegressorFit {
        n_features,
        baseline_prediction,
        predictors,
        categorical_features: declare_categories(categorical),
    }
}

/// Random fitted histogram gradient-boosting classifier.
pub fn random_hist_classifier(
    seed: u64,
    n_rounds: usize,
    n_features: usize,
    n_classes: usize,
    depth: u32,
    categorical: &[(usize, u32)],
) -> HistGradientBoostingClassifierFit {
    let mut rng = StdRng::seed_from_u64(seed);
    let n_groups = if n_classes == 2 { 1 } else { n_classes };
    let baseline_prediction = (0..n_groups).map(|_| rng.gen_range(-1.0..1.0)).collect();
    let predictors = (0..n_rounds)
        .map(|_| {
            (0..n_groups)
                .map(|_| random_hist_tree(&mut rng, n_features, categorical, depth))
                .collect()
        })
        .collect();
    HistGradientBoostingClassifierFit {
        n_features,
        n_classes,
        baseline_prediction,
        predictors,
        categorical_features: declare_categories(categorical),
    }
}

// =============================================================================
// Random Input Matrices
// =============================================================================

/// Random dense input matrix with values in `[-3, 3)` and an optional NaN
/// fraction.
pub fn random_matrix(
    seed: u64,
    n_rows: usize,
    n_features: usize,
    nan_fraction: f64,
) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array2::from_shape_fn((n_rows, n_features), |_| {
        if nan_fraction > 0.0 && rng.gen_bool(nan_fraction) {
            f64::NAN
        } else {
            rng.gen_range(-3.0..3.0)
        }
    })
}

/// Like [`random_matrix`], but columns listed in `categorical` draw integer
/// category codes in `[0, count)` instead of continuous values.
pub fn random_matrix_with_categories(
    seed: u64,
    n_rows: usize,
    n_features: usize,
    categorical: &[(usize, u32)],
    nan_fraction: f64,
) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array2::from_shape_fn((n_rows, n_features), |(_, col)| {
        if nan_fraction > 0.0 && rng.gen_bool(nan_fraction) {
            return f64::NAN;
        }
        match categorical.iter().find(|(f, _)| *f == col) {
            Some(&(_, n)) => f64::from(rng.gen_range(0..n)),
            None => rng.gen_range(-3.0..3.0),
        }
    })
}
