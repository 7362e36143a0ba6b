//! Canonical tree ensemble representation.
//!
//! The representation is deliberately small: flat SoA [`Tree`] storage, an
//! [`Ensemble`] of trees with group assignments, and packed categorical
//! bitsets. Importers produce it, the inference engine consumes it, and the
//! exporter reads it back out. See [`crate::model::Model`] for the complete
//! package with metadata and post-transform.

/// Canonical node identifier.
///
/// Internally this is just an index into the tree's SoA arrays.
pub type NodeId = u32;

pub mod builder;
pub mod categories;
pub mod ensemble;
pub mod node;
pub mod tree;

pub use builder::TreeBuilder;
pub use categories::{categories_to_bitset, float_to_category, CategoriesStorage};
pub use ensemble::{Aggregation, Ensemble, EnsembleValidationError};
pub use node::{ComparisonOp, SplitKind};
pub use tree::{Tree, TreeValidationError};

// ============================================================================
// FeatureRow Trait
// ============================================================================

/// Access features for a single sample.
///
/// This trait provides read-only access to feature values for one sample
/// (row). It is implemented for `&[f64]` directly, allowing slices to be
/// used for tree traversal without wrapper types, and for
/// [`ndarray::ArrayView1`] so matrix rows traverse without copying.
pub trait FeatureRow {
    /// Get the feature value at the given index.
    ///
    /// Returns `f64::NAN` for missing values.
    fn feature(&self, index: usize) -> f64;

    /// Number of features in this sample.
    fn n_features(&self) -> usize;
}

// Blanket implementation for slices
impl FeatureRow for [f64] {
    #[inline]
    fn feature(&self, index: usize) -> f64 {
        self[index]
    }

    #[inline]
    fn n_features(&self) -> usize {
        self.len()
    }
}

// Implementation for fixed-size arrays (enables &[0.5f64, 1.0] syntax)
impl<const N: usize> FeatureRow for [f64; N] {
    #[inline]
    fn feature(&self, index: usize) -> f64 {
        self[index]
    }

    #[inline]
    fn n_features(&self) -> usize {
        N
    }
}

// Implementation for references to types that can be viewed as slices
impl<T: AsRef<[f64]> + ?Sized> FeatureRow for &T {
    #[inline]
    fn feature(&self, index: usize) -> f64 {
        self.as_ref()[index]
    }

    #[inline]
    fn n_features(&self) -> usize {
        self.as_ref().len()
    }
}

// Implementation for ndarray ArrayView1 (may be contiguous or strided)
impl FeatureRow for ndarray::ArrayView1<'_, f64> {
    #[inline]
    fn feature(&self, index: usize) -> f64 {
        self[index]
    }

    #[inline]
    fn n_features(&self) -> usize {
        self.len()
    }
}
