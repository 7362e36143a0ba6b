//! Inference engine tests over hand-built models.
//!
//! These verify:
//! 1. Output shape follows the task: `(n_rows, n_targets, outputs_per_target)`
//! 2. Aggregation, base scores, and transforms compose in the right order
//! 3. Routing honors comparison operators and default directions
//! 4. Parallel execution returns exactly the sequential result

use approx::assert_abs_diff_eq;
use ndarray::array;

use arbors::compat::sklearn::{import_model, SklearnModel};
use arbors::model::{Model, ModelMeta, PostTransform};
use arbors::repr::{Aggregation, ComparisonOp, Ensemble, TreeBuilder};
use arbors::scalar_tree;
use arbors::testing::{random_hist_classifier, random_matrix_with_categories};
use arbors::{Error, Parallelism, Predictor};

// =============================================================================
// Test Helpers
// =============================================================================

fn stump(threshold: f64, left_val: f64, right_val: f64) -> arbors::repr::Tree {
    scalar_tree! {
        0 => num(0, threshold, L) -> 1, 2,
        1 => leaf(left_val),
        2 => leaf(right_val),
    }
}

fn boundary_tree(op: ComparisonOp) -> arbors::repr::Tree {
    let mut builder = TreeBuilder::new(3, 1);
    builder.set_numerical_split(0, 0, op, 0.5, true, 1, 2);
    builder.set_leaf(1, &[1.0]);
    builder.set_leaf(2, &[-1.0]);
    builder.build().unwrap()
}

// =============================================================================
// Shapes and Aggregation
// =============================================================================

#[test]
fn sum_regression_applies_base_score() {
    let mut ensemble = Ensemble::new(1, 1, Aggregation::Sum);
    ensemble.push_tree(stump(0.5, 1.0, 2.0), 0);
    ensemble.push_tree(stump(0.5, 10.0, 20.0), 0);
    let meta = ModelMeta::for_regression(1).with_base_scores(vec![100.0]);
    let model = Model::new(ensemble, meta, PostTransform::Identity).unwrap();
    let predictor = Predictor::new(&model);

    let out = predictor
        .predict(array![[0.0], [1.0]].view(), Parallelism::Sequential)
        .unwrap();
    assert_eq!(out.dim(), (2, 1, 1));
    assert_abs_diff_eq!(out[[0, 0, 0]], 111.0, epsilon = 1e-12);
    assert_abs_diff_eq!(out[[1, 0, 0]], 122.0, epsilon = 1e-12);
}

#[test]
fn averaging_divides_by_per_group_tree_counts() {
    // Group 0 holds two trees, group 1 holds one.
    let mut ensemble = Ensemble::new(2, 1, Aggregation::Average);
    ensemble.push_tree(stump(0.5, 2.0, 4.0), 0);
    ensemble.push_tree(stump(0.5, 4.0, 8.0), 0);
    ensemble.push_tree(stump(0.5, 5.0, 7.0), 1);
    let meta = ModelMeta::for_multi_target_regression(1, 2);
    let model = Model::new(ensemble, meta, PostTransform::Identity).unwrap();
    let predictor = Predictor::new(&model);

    let out = predictor
        .predict(array![[0.0]].view(), Parallelism::Sequential)
        .unwrap();
    assert_eq!(out.dim(), (1, 2, 1));
    assert_abs_diff_eq!(out[[0, 0, 0]], 3.0, epsilon = 1e-12);
    assert_abs_diff_eq!(out[[0, 1, 0]], 5.0, epsilon = 1e-12);
}

#[test]
fn empty_group_returns_its_base_score() {
    let mut ensemble = Ensemble::new(2, 1, Aggregation::Average);
    ensemble.push_tree(stump(0.5, 6.0, 6.0), 0);
    let meta =
        ModelMeta::for_multi_target_regression(1, 2).with_base_scores(vec![0.0, -2.5]);
    let model = Model::new(ensemble, meta, PostTransform::Identity).unwrap();
    let predictor = Predictor::new(&model);

    let out = predictor
        .predict(array![[0.0]].view(), Parallelism::Sequential)
        .unwrap();
    assert_abs_diff_eq!(out[[0, 0, 0]], 6.0, epsilon = 1e-12);
    assert_abs_diff_eq!(out[[0, 1, 0]], -2.5, epsilon = 1e-12);
}

#[test]
fn vector_leaves_scatter_across_groups() {
    // One tree, leaf vectors as wide as the output. Averaging divides by
    // the full tree count for every group.
    let mut builder = TreeBuilder::new(3, 2);
    builder.set_numerical_split(0, 0, ComparisonOp::LessEqual, 0.5, true, 1, 2);
    builder.set_leaf(1, &[0.25, 0.75]);
    builder.set_leaf(2, &[0.9, 0.1]);
    let mut ensemble = Ensemble::new(2, 2, Aggregation::Average);
    ensemble.push_tree(builder.build().unwrap(), 0);

    let meta = ModelMeta::for_binary(1, 2);
    let model = Model::new(ensemble, meta, PostTransform::Identity).unwrap();
    let predictor = Predictor::new(&model);

    let out = predictor
        .predict(array![[0.0], [1.0]].view(), Parallelism::Sequential)
        .unwrap();
    assert_eq!(out.dim(), (2, 1, 2));
    assert_abs_diff_eq!(out[[0, 0, 0]], 0.25, epsilon = 1e-12);
    assert_abs_diff_eq!(out[[0, 0, 1]], 0.75, epsilon = 1e-12);
    assert_abs_diff_eq!(out[[1, 0, 0]], 0.9, epsilon = 1e-12);
}

// =============================================================================
// Routing
// =============================================================================

#[test]
fn comparison_ops_route_at_the_boundary() {
    // One tree per group, each with a different operator; left leaf is +1,
    // right is -1. At value == threshold only the inclusive ops hold.
    let ops = [
        ComparisonOp::Less,
        ComparisonOp::LessEqual,
        ComparisonOp::Greater,
        ComparisonOp::GreaterEqual,
    ];
    let mut ensemble = Ensemble::new(4, 1, Aggregation::Sum);
    for (group, op) in ops.into_iter().enumerate() {
        ensemble.push_tree(boundary_tree(op), group as u32);
    }
    let meta = ModelMeta::for_multi_target_regression(1, 4);
    let model = Model::new(ensemble, meta, PostTransform::Identity).unwrap();
    let predictor = Predictor::new(&model);

    let out = predictor
        .predict_raw(array![[0.5]].view(), Parallelism::Sequential)
        .unwrap();
    assert_eq!(out.row(0).to_vec(), vec![-1.0, 1.0, -1.0, 1.0]);
}

#[test]
fn missing_values_take_the_default_direction() {
    let left_default = scalar_tree! {
        0 => num(0, 0.5, L) -> 1, 2,
        1 => leaf(1.0),
        2 => leaf(2.0),
    };
    let right_default = scalar_tree! {
        0 => num(0, 0.5, R) -> 1, 2,
        1 => leaf(1.0),
        2 => leaf(2.0),
    };
    let mut ensemble = Ensemble::new(2, 1, Aggregation::Sum);
    ensemble.push_tree(left_default, 0);
    ensemble.push_tree(right_default, 1);
    let meta = ModelMeta::for_multi_target_regression(1, 2);
    let model = Model::new(ensemble, meta, PostTransform::Identity).unwrap();
    let predictor = Predictor::new(&model);

    let out = predictor
        .predict_raw(array![[f64::NAN]].view(), Parallelism::Sequential)
        .unwrap();
    assert_eq!(out.row(0).to_vec(), vec![1.0, 2.0]);
}

#[test]
fn categorical_membership_routes_right() {
    let tree = scalar_tree! {
        0 => cat(0, [1, 3], L) -> 1, 2,
        1 => leaf(-1.0),
        2 => leaf(1.0),
    };
    let mut ensemble = Ensemble::new(1, 1, Aggregation::Sum);
    ensemble.push_tree(tree, 0);
    let model = Model::new(
        ensemble,
        ModelMeta::for_regression(1),
        PostTransform::Identity,
    )
    .unwrap();
    let predictor = Predictor::new(&model);

    let out = predictor
        .predict_raw(
            array![[1.0], [3.0], [2.0], [f64::NAN]].view(),
            Parallelism::Sequential,
        )
        .unwrap();
    assert_eq!(out.column(0).to_vec(), vec![1.0, 1.0, -1.0, -1.0]);
}

// =============================================================================
// Transforms and Raw Margins
// =============================================================================

#[test]
fn sigmoid_transform_squashes_raw_margins() {
    let mut ensemble = Ensemble::new(1, 1, Aggregation::Sum);
    ensemble.push_tree(stump(0.5, -2.0, 2.0), 0);
    let meta = ModelMeta::for_binary(1, 1).with_base_scores(vec![0.5]);
    let model = Model::new(ensemble, meta, PostTransform::Sigmoid { alpha: 1.0 }).unwrap();
    let predictor = Predictor::new(&model);

    let x = array![[0.0], [1.0]];
    let raw = predictor.predict_raw(x.view(), Parallelism::Sequential).unwrap();
    let out = predictor.predict(x.view(), Parallelism::Sequential).unwrap();

    for i in 0..2 {
        let expected = 1.0 / (1.0 + (-raw[[i, 0]]).exp());
        assert_abs_diff_eq!(out[[i, 0, 0]], expected, epsilon = 1e-12);
    }
}

#[test]
fn leaf_ids_reconstruct_sum_margins() {
    let mut ensemble = Ensemble::new(1, 1, Aggregation::Sum);
    ensemble.push_tree(stump(0.0, -1.0, 1.0), 0);
    ensemble.push_tree(stump(1.0, -10.0, 10.0), 0);
    ensemble.push_tree(stump(-1.0, -100.0, 100.0), 0);
    let meta = ModelMeta::for_regression(1).with_base_scores(vec![7.0]);
    let model = Model::new(ensemble, meta, PostTransform::Identity).unwrap();
    let predictor = Predictor::new(&model);

    let x = array![[-2.0], [0.5], [3.0]];
    let leaves = predictor
        .predict_leaf_id(x.view(), Parallelism::Sequential)
        .unwrap();
    let raw = predictor.predict_raw(x.view(), Parallelism::Sequential).unwrap();

    assert_eq!(leaves.dim(), (3, 3));
    for i in 0..3 {
        let mut acc = 7.0;
        for (t, tree) in model.ensemble().trees().enumerate() {
            acc += tree.leaf_value(leaves[[i, t]])[0];
        }
        assert_abs_diff_eq!(raw[[i, 0]], acc, epsilon = 1e-12);
    }
}

// =============================================================================
// Parallelism
// =============================================================================

#[test]
fn parallel_matches_sequential_exactly() {
    let fit = random_hist_classifier(42, 8, 6, 3, 5, &[(2, 5)]);
    let model = import_model(&SklearnModel::HistGradientBoostingClassifier(fit)).unwrap();
    let predictor = Predictor::new(&model);
    let x = random_matrix_with_categories(43, 64, 6, &[(2, 5)], 0.1);

    let sequential = predictor.predict(x.view(), Parallelism::Sequential).unwrap();
    let parallel = predictor.predict(x.view(), Parallelism::Parallel).unwrap();
    assert_eq!(sequential, parallel);

    let pooled = arbors::run_with_threads(2, |p| predictor.predict(x.view(), p)).unwrap();
    assert_eq!(sequential, pooled);
}

// =============================================================================
// Input Validation
// =============================================================================

#[test]
fn rejects_wrong_feature_count() {
    let mut ensemble = Ensemble::new(1, 1, Aggregation::Sum);
    ensemble.push_tree(stump(0.5, 1.0, 2.0), 0);
    let model = Model::new(
        ensemble,
        ModelMeta::for_regression(3),
        PostTransform::Identity,
    )
    .unwrap();
    let predictor = Predictor::new(&model);

    let err = predictor
        .predict(array![[0.0, 1.0]].view(), Parallelism::Sequential)
        .unwrap_err();
    assert!(matches!(err, Error::ShapeMismatch { .. }));
    assert!(err.to_string().contains("feature columns"));
}

#[test]
fn empty_batch_produces_empty_output() {
    let mut ensemble = Ensemble::new(1, 1, Aggregation::Sum);
    ensemble.push_tree(stump(0.5, 1.0, 2.0), 0);
    let model = Model::new(
        ensemble,
        ModelMeta::for_regression(1),
        PostTransform::Identity,
    )
    .unwrap();
    let predictor = Predictor::new(&model);

    let x = ndarray::Array2::<f64>::zeros((0, 1));
    let out = predictor.predict(x.view(), Parallelism::Sequential).unwrap();
    assert_eq!(out.dim(), (0, 1, 1));
}
