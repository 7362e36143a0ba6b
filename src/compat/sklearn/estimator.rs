//! Fitted scikit-learn estimator descriptions.
//!
//! Foreign types mirroring the attributes a fitted estimator exposes to
//! its callers. These exist only at the interchange boundary: the importer
//! consumes them, the exporter produces them, and
//! [`reference`](super::reference) walks them directly to reproduce the
//! source framework's own predictions. Everything round-trips through JSON
//! via serde, which is also how test fixtures are stored.

use serde::{Deserialize, Serialize};

// =============================================================================
// Classic decision-tree node tables (RF / ET / GB / IF)
// =============================================================================

/// Node arrays of one fitted decision tree, in the classic parallel-array
/// layout: index = node id, node 0 = root. A node is a leaf iff its left
/// child is `-1`; leaves carry `-2` in the feature column and `-2.0` as
/// threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeArrays {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    /// Per-node output, laid out `[node][target][class]`. The class
    /// dimension has length 1 for regression targets.
    pub value: Vec<Vec<Vec<f64>>>,
    pub n_node_samples: Vec<i64>,
}

impl TreeArrays {
    /// Number of nodes in the table.
    pub fn n_nodes(&self) -> usize {
        self.children_left.len()
    }

    /// Whether node `idx` is a leaf.
    pub fn is_leaf(&self, idx: usize) -> bool {
        self.children_left[idx] == -1
    }
}

// =============================================================================
// Bagging ensembles (random forest, extra-trees)
// =============================================================================

/// Fitted random-forest or extra-trees regressor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestRegressorFit {
    pub n_features: usize,
    pub n_targets: usize,
    pub trees: Vec<TreeArrays>,
}

/// Fitted random-forest or extra-trees classifier.
///
/// Leaf `value` rows hold per-class sample counts or fractions; the
/// importer normalizes either form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestClassifierFit {
    pub n_features: usize,
    pub n_targets: usize,
    pub n_classes: usize,
    pub trees: Vec<TreeArrays>,
}

// =============================================================================
// Gradient boosting (classic)
// =============================================================================

/// The initial estimator of a classic gradient-boosting ensemble.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum SklInit {
    /// Explicit zero initializer.
    Zero,
    /// Constant initializer: the fitted target mean (regression).
    Mean { constant: f64 },
    /// Prior initializer: fitted class fractions (classification).
    Prior { class_prior: Vec<f64> },
    /// An arbitrary fitted sub-model, described for error reporting only.
    /// Not foldable into constant base scores.
    Fitted { description: String },
}

/// Fitted gradient-boosting regressor: one tree per boosting round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingRegressorFit {
    pub n_features: usize,
    pub learning_rate: f64,
    pub init: SklInit,
    pub estimators: Vec<TreeArrays>,
}

/// Fitted gradient-boosting classifier. Trees are laid out
/// `[round][group]`: one group for binary problems, `n_classes` otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingClassifierFit {
    pub n_features: usize,
    pub n_classes: usize,
    pub learning_rate: f64,
    pub init: SklInit,
    pub estimators: Vec<Vec<TreeArrays>>,
}

// =============================================================================
// Histogram gradient boosting
// =============================================================================

/// One node of a histogram-gradient-boosting predictor tree, in the
/// record-per-node layout the source framework stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistNode {
    /// Leaf value, already shrunken by the learning rate.
    pub value: f64,
    pub feature_idx: usize,
    pub num_threshold: f64,
    pub missing_go_to_left: bool,
    pub left: usize,
    pub right: usize,
    pub is_leaf: bool,
    pub is_categorical: bool,
    /// Index into [`HistTree::raw_left_cat_bitsets`] when `is_categorical`.
    pub bitset_idx: usize,
}

/// One histogram-gradient-boosting predictor tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistTree {
    pub nodes: Vec<HistNode>,
    /// 256-bit sets of the raw category values routed LEFT, one per
    /// categorical split node.
    pub raw_left_cat_bitsets: Vec<[u32; 8]>,
}

/// Fitted category values of one categorical feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CategoryList {
    /// Numeric category values. Importable when all are non-negative
    /// integers.
    Numeric(Vec<f64>),
    /// String category values. Integer-keyed category sets cannot hold
    /// these.
    Str(Vec<String>),
}

/// A feature declared categorical at fit time, with its category values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoricalFeature {
    pub feature_idx: usize,
    pub categories: CategoryList,
}

/// Fitted histogram-gradient-boosting regressor: one predictor tree per
/// iteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistGradientBoostingRegressorFit {
    pub n_features: usize,
    pub baseline_prediction: f64,
    pub predictors: Vec<HistTree>,
    pub categorical_features: Vec<CategoricalFeature>,
}

/// Fitted histogram-gradient-boosting classifier. Predictor trees are laid
/// out `[iteration][group]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistGradientBoostingClassifierFit {
    pub n_features: usize,
    pub n_classes: usize,
    /// Per-group baseline raw prediction (one entry for binary problems,
    /// `n_classes` otherwise).
    pub baseline_prediction: Vec<f64>,
    pub predictors: Vec<Vec<HistTree>>,
    pub categorical_features: Vec<CategoricalFeature>,
}

// =============================================================================
// Isolation forest
// =============================================================================

/// Fitted isolation forest. The trees' `value` arrays are ignored; what
/// matters per leaf is its depth and `n_node_samples`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForestFit {
    pub n_features: usize,
    /// Number of samples drawn to grow each tree.
    pub max_samples: usize,
    pub trees: Vec<TreeArrays>,
}

// =============================================================================
// Family-tagged wrapper
// =============================================================================

/// A fitted scikit-learn estimator, tagged by model family.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "family")]
pub enum SklearnModel {
    RandomForestRegressor(RandomForestRegressorFit),
    RandomForestClassifier(RandomForestClassifierFit),
    ExtraTreesRegressor(RandomForestRegressorFit),
    ExtraTreesClassifier(RandomForestClassifierFit),
    GradientBoostingRegressor(GradientBoostingRegressorFit),
    GradientBoostingClassifier(GradientBoostingClassifierFit),
    HistGradientBoostingRegressor(HistGradientBoostingRegressorFit),
    HistGradientBoostingClassifier(HistGradientBoostingClassifierFit),
    IsolationForest(IsolationForestFit),
}
