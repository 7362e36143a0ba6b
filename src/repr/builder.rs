//! Incremental tree construction.
//!
//! Importers know the full node set of a source tree up front, so the
//! builder pre-allocates every node and lets callers fill in splits and
//! leaves by explicit index, then assembles the packed [`Tree`] storage.

use super::categories::CategoriesStorage;
use super::node::{ComparisonOp, SplitKind};
use super::tree::{Tree, TreeValidationError};
use super::NodeId;

/// Builder for [`Tree`] with a pre-allocated node set.
///
/// All nodes start out as zero-valued leaves; call
/// [`set_numerical_split`](Self::set_numerical_split),
/// [`set_categorical_split`](Self::set_categorical_split) and
/// [`set_leaf`](Self::set_leaf) to fill them in, then
/// [`build`](Self::build) to validate and freeze.
#[derive(Debug, Clone)]
pub struct TreeBuilder {
    split_indices: Vec<u32>,
    thresholds: Vec<f64>,
    comparison_ops: Vec<ComparisonOp>,
    left_children: Vec<u32>,
    right_children: Vec<u32>,
    default_left: Vec<bool>,
    is_leaf: Vec<bool>,
    split_kinds: Vec<SplitKind>,
    categories_right: Vec<bool>,
    /// Categorical data: (node_idx, category_bitset)
    categorical_nodes: Vec<(NodeId, Vec<u32>)>,
    leaf_values: Vec<f64>,
    leaf_len: usize,
}

impl TreeBuilder {
    /// Create a builder with `n_nodes` pre-allocated zero-leaves, each
    /// carrying a leaf vector of `leaf_len` values.
    pub fn new(n_nodes: usize, leaf_len: usize) -> Self {
        debug_assert!(leaf_len >= 1);
        Self {
            split_indices: vec![0; n_nodes],
            thresholds: vec![0.0; n_nodes],
            comparison_ops: vec![ComparisonOp::default(); n_nodes],
            left_children: vec![0; n_nodes],
            right_children: vec![0; n_nodes],
            default_left: vec![false; n_nodes],
            is_leaf: vec![true; n_nodes],
            split_kinds: vec![SplitKind::Numerical; n_nodes],
            categories_right: vec![false; n_nodes],
            categorical_nodes: Vec::new(),
            leaf_values: vec![0.0; n_nodes * leaf_len],
            leaf_len,
        }
    }

    /// Number of pre-allocated nodes.
    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.is_leaf.len()
    }

    /// Width of every leaf vector.
    #[inline]
    pub fn leaf_len(&self) -> usize {
        self.leaf_len
    }

    /// Set a numerical split on a node, with explicit child indices.
    ///
    /// The sample goes left when `op(value, threshold)` holds. Child bounds
    /// are checked later by [`build`](Self::build).
    pub fn set_numerical_split(
        &mut self,
        node: NodeId,
        feature: u32,
        op: ComparisonOp,
        threshold: f64,
        default_left: bool,
        left_child: NodeId,
        right_child: NodeId,
    ) {
        let idx = node as usize;
        self.split_indices[idx] = feature;
        self.thresholds[idx] = threshold;
        self.comparison_ops[idx] = op;
        self.left_children[idx] = left_child;
        self.right_children[idx] = right_child;
        self.default_left[idx] = default_left;
        self.is_leaf[idx] = false;
        self.split_kinds[idx] = SplitKind::Numerical;
    }

    /// Set a categorical split on a node, with explicit child indices.
    ///
    /// `category_bitset` contains the packed u32 words of the member set
    /// (see [`categories_to_bitset`](super::categories_to_bitset)). Members
    /// go right when `categories_go_right` is true, left otherwise.
    pub fn set_categorical_split(
        &mut self,
        node: NodeId,
        feature: u32,
        category_bitset: Vec<u32>,
        categories_go_right: bool,
        default_left: bool,
        left_child: NodeId,
        right_child: NodeId,
    ) {
        let idx = node as usize;
        self.split_indices[idx] = feature;
        self.thresholds[idx] = 0.0;
        self.left_children[idx] = left_child;
        self.right_children[idx] = right_child;
        self.default_left[idx] = default_left;
        self.is_leaf[idx] = false;
        self.split_kinds[idx] = SplitKind::Categorical;
        self.categories_right[idx] = categories_go_right;

        if let Some(pos) = self.categorical_nodes.iter().position(|(n, _)| *n == node) {
            self.categorical_nodes.remove(pos);
        }
        self.categorical_nodes.push((node, category_bitset));
    }

    /// Set a node as a leaf with the given vector of values.
    ///
    /// # Panics
    ///
    /// Panics if `values.len()` differs from the builder's leaf width.
    pub fn set_leaf(&mut self, node: NodeId, values: &[f64]) {
        assert_eq!(
            values.len(),
            self.leaf_len,
            "leaf vector must hold exactly leaf_len values"
        );
        let idx = node as usize;
        self.is_leaf[idx] = true;
        let start = idx * self.leaf_len;
        self.leaf_values[start..start + self.leaf_len].copy_from_slice(values);
    }

    /// Finalize the tree: pack categorical bitsets, freeze storage, and
    /// run structural validation.
    pub fn build(self) -> Result<Tree, TreeValidationError> {
        let categories = if self.categorical_nodes.is_empty() {
            CategoriesStorage::empty()
        } else {
            let mut cat_nodes = self.categorical_nodes;
            cat_nodes.sort_by_key(|(idx, _)| *idx);

            let num_nodes = self.split_indices.len();
            let mut segments = vec![(0u32, 0u32); num_nodes];
            let mut bitsets = Vec::new();

            for (node_idx, bitset) in cat_nodes {
                let start = bitsets.len() as u32;
                let size = bitset.len() as u32;
                segments[node_idx as usize] = (start, size);
                bitsets.extend(bitset);
            }

            CategoriesStorage::new(bitsets, segments)
        };

        let tree = Tree::new(
            self.split_indices,
            self.thresholds,
            self.comparison_ops,
            self.left_children,
            self.right_children,
            self.default_left,
            self.is_leaf,
            self.split_kinds,
            self.categories_right,
            categories,
            self.leaf_values,
            self.leaf_len,
        );
        tree.validate()?;
        Ok(tree)
    }
}
