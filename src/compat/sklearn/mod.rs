//! scikit-learn estimator interchange.
//!
//! The description structs in this module mirror the attribute layout of
//! fitted scikit-learn ensembles. [`import_model`] translates a description
//! into a native [`Model`](crate::Model), [`export_model`] maps forest
//! models back into descriptions, and [`reference`] reimplements each
//! family's own predict path so tests can compare engine output against
//! the source semantics.

mod estimator;
mod export;
mod import;
pub mod reference;

pub use estimator::{
    CategoricalFeature, CategoryList, GradientBoostingClassifierFit,
    GradientBoostingRegressorFit, HistGradientBoostingClassifierFit,
    HistGradientBoostingRegressorFit, HistNode, HistTree, IsolationForestFit,
    RandomForestClassifierFit, RandomForestRegressorFit, SklInit, SklearnModel, TreeArrays,
};
pub use export::export_model;
pub use import::import_model;

/// Expected path length of an unsuccessful binary-search-tree lookup over
/// `n` samples: `2(ln(n-1) + gamma) - 2(n-1)/n`, with the conventional 0
/// for `n <= 1` and 1 for `n == 2`.
///
/// Shared by the isolation-forest importer and the reference scorer so
/// both normalize depths with the exact same constant.
pub(crate) fn average_path_length(n: f64) -> f64 {
    const EULER_GAMMA: f64 = 0.5772156649015329;
    if n <= 1.0 {
        0.0
    } else if n == 2.0 {
        1.0
    } else {
        2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
    }
}

#[cfg(test)]
mod tests {
    use super::average_path_length;
    use approx::assert_abs_diff_eq;

    #[test]
    fn average_path_length_anchors() {
        assert_eq!(average_path_length(0.0), 0.0);
        assert_eq!(average_path_length(1.0), 0.0);
        assert_eq!(average_path_length(2.0), 1.0);
        // 2(ln 3 + gamma) - 2 * 3/4
        assert_abs_diff_eq!(
            average_path_length(4.0),
            1.8516559071392856,
            epsilon = 1e-12
        );
        // Grows logarithmically.
        assert!(average_path_length(64.0) > average_path_length(32.0));
    }
}
