//! Canonical tree representation (SoA).
//!
//! This module provides:
//! - [`Tree`]: Immutable SoA tree storage for efficient traversal
//! - [`TreeValidationError`]: Structural validation errors
//!
//! For incremental tree construction, see [`super::builder::TreeBuilder`].

// Allow many constructor arguments for creating trees with all their fields.
#![allow(clippy::too_many_arguments)]

use thiserror::Error;

use super::categories::{float_to_category, CategoriesStorage};
use super::node::{ComparisonOp, SplitKind};
use super::{FeatureRow, NodeId};

// ============================================================================
// TreeValidationError
// ============================================================================

/// Structural validation errors for [`Tree`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeValidationError {
    /// Tree has no nodes.
    #[error("tree has no nodes")]
    EmptyTree,
    /// A child pointer references an out-of-bounds node.
    #[error("node {node}: {side} child {child} out of bounds ({n_nodes} nodes)")]
    ChildOutOfBounds {
        node: NodeId,
        side: &'static str,
        child: NodeId,
        n_nodes: usize,
    },
    /// A node references itself as a child.
    #[error("node {node} references itself as a child")]
    SelfLoop { node: NodeId },
    /// A node was reached by more than one path (DAG) or due to a cycle.
    #[error("node {node} is reachable by more than one path")]
    DuplicateVisit { node: NodeId },
    /// A cycle was detected during traversal.
    #[error("cycle detected at node {node}")]
    CycleDetected { node: NodeId },
    /// A node exists in storage but is unreachable from the root.
    #[error("node {node} is unreachable from the root")]
    UnreachableNode { node: NodeId },
    /// Tree contains categorical splits but the category segments array is not sized to nodes.
    #[error("category segments length {segments_len} does not match node count {n_nodes}")]
    CategoricalSegmentsLenMismatch {
        segments_len: usize,
        n_nodes: usize,
    },
    /// The flat leaf value buffer disagrees with `n_nodes * leaf_len`.
    #[error("leaf value buffer holds {actual} values, expected {expected}")]
    LeafValuesLenMismatch { expected: usize, actual: usize },
}

// ============================================================================
// Tree
// ============================================================================

/// Structure-of-Arrays tree storage for efficient traversal.
///
/// Stores tree nodes in flat arrays for cache-friendly traversal.
/// Child indices are local to this tree (0 = root).
///
/// Every leaf carries a vector of `leaf_len` values, stored contiguously in
/// a single flat buffer. Scalar-output trees simply have `leaf_len == 1`.
/// Slots belonging to split nodes are zero-filled and never read.
#[derive(Debug, Clone)]
pub struct Tree {
    split_indices: Box<[u32]>,
    thresholds: Box<[f64]>,
    comparison_ops: Box<[ComparisonOp]>,
    left_children: Box<[u32]>,
    right_children: Box<[u32]>,
    default_left: Box<[bool]>,
    is_leaf: Box<[bool]>,
    split_kinds: Box<[SplitKind]>,
    /// Per-node direction flag: whether bitset members go right.
    categories_right: Box<[bool]>,
    categories: CategoriesStorage,
    /// Flat `n_nodes * leaf_len` buffer of leaf vectors.
    leaf_values: Box<[f64]>,
    leaf_len: usize,
}

impl Tree {
    /// Create a new tree from parallel arrays.
    ///
    /// All per-node arrays must have the same length (number of nodes), and
    /// `leaf_values` must hold exactly `n_nodes * leaf_len` values.
    ///
    /// For trees without categorical splits, pass `SplitKind::Numerical` for
    /// all nodes and `CategoriesStorage::empty()`.
    pub fn new(
        split_indices: Vec<u32>,
        thresholds: Vec<f64>,
        comparison_ops: Vec<ComparisonOp>,
        left_children: Vec<u32>,
        right_children: Vec<u32>,
        default_left: Vec<bool>,
        is_leaf: Vec<bool>,
        split_kinds: Vec<SplitKind>,
        categories_right: Vec<bool>,
        categories: CategoriesStorage,
        leaf_values: Vec<f64>,
        leaf_len: usize,
    ) -> Self {
        let n_nodes = split_indices.len();
        debug_assert!(leaf_len >= 1);
        debug_assert_eq!(n_nodes, thresholds.len());
        debug_assert_eq!(n_nodes, comparison_ops.len());
        debug_assert_eq!(n_nodes, left_children.len());
        debug_assert_eq!(n_nodes, right_children.len());
        debug_assert_eq!(n_nodes, default_left.len());
        debug_assert_eq!(n_nodes, is_leaf.len());
        debug_assert_eq!(n_nodes, split_kinds.len());
        debug_assert_eq!(n_nodes, categories_right.len());
        debug_assert_eq!(n_nodes * leaf_len, leaf_values.len());

        Self {
            split_indices: split_indices.into_boxed_slice(),
            thresholds: thresholds.into_boxed_slice(),
            comparison_ops: comparison_ops.into_boxed_slice(),
            left_children: left_children.into_boxed_slice(),
            right_children: right_children.into_boxed_slice(),
            default_left: default_left.into_boxed_slice(),
            is_leaf: is_leaf.into_boxed_slice(),
            split_kinds: split_kinds.into_boxed_slice(),
            categories_right: categories_right.into_boxed_slice(),
            categories,
            leaf_values: leaf_values.into_boxed_slice(),
            leaf_len,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Number of nodes in the tree.
    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.is_leaf.len()
    }

    /// Check if a node is a leaf.
    #[inline]
    pub fn is_leaf(&self, node: NodeId) -> bool {
        self.is_leaf[node as usize]
    }

    /// Get the feature index for a split node.
    #[inline]
    pub fn split_index(&self, node: NodeId) -> u32 {
        self.split_indices[node as usize]
    }

    /// Get the split threshold for a numerical split.
    #[inline]
    pub fn split_threshold(&self, node: NodeId) -> f64 {
        self.thresholds[node as usize]
    }

    /// Get the comparison operator for a numerical split.
    #[inline]
    pub fn comparison_op(&self, node: NodeId) -> ComparisonOp {
        self.comparison_ops[node as usize]
    }

    /// Get the left child node index.
    #[inline]
    pub fn left_child(&self, node: NodeId) -> NodeId {
        self.left_children[node as usize]
    }

    /// Get the right child node index.
    #[inline]
    pub fn right_child(&self, node: NodeId) -> NodeId {
        self.right_children[node as usize]
    }

    /// Get the default direction for missing values.
    #[inline]
    pub fn default_left(&self, node: NodeId) -> bool {
        self.default_left[node as usize]
    }

    /// Get the child taken by missing (or unrepresentable) feature values.
    #[inline]
    pub fn default_child(&self, node: NodeId) -> NodeId {
        if self.default_left(node) {
            self.left_child(node)
        } else {
            self.right_child(node)
        }
    }

    /// Get the split kind (numerical or categorical).
    #[inline]
    pub fn split_kind(&self, node: NodeId) -> SplitKind {
        self.split_kinds[node as usize]
    }

    /// Whether bitset members go right at a categorical split node.
    #[inline]
    pub fn categories_go_right(&self, node: NodeId) -> bool {
        self.categories_right[node as usize]
    }

    /// Get reference to categories storage for categorical splits.
    #[inline]
    pub fn categories(&self) -> &CategoriesStorage {
        &self.categories
    }

    /// Check if the tree has any categorical splits.
    #[inline]
    pub fn has_categorical(&self) -> bool {
        !self.categories.is_empty()
    }

    /// Width of every leaf vector in this tree.
    #[inline]
    pub fn leaf_len(&self) -> usize {
        self.leaf_len
    }

    /// Get the leaf vector at a leaf node.
    #[inline]
    pub fn leaf_value(&self, node: NodeId) -> &[f64] {
        let start = node as usize * self.leaf_len;
        &self.leaf_values[start..start + self.leaf_len]
    }

    /// Largest feature index referenced by any split, or `None` for
    /// leaf-only trees.
    pub fn max_split_index(&self) -> Option<u32> {
        (0..self.n_nodes() as u32)
            .filter(|&n| !self.is_leaf(n))
            .map(|n| self.split_index(n))
            .max()
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Validate basic structural invariants for this tree.
    ///
    /// Intended for model import and conversion checks.
    pub fn validate(&self) -> Result<(), TreeValidationError> {
        let n_nodes = self.n_nodes();
        if n_nodes == 0 {
            return Err(TreeValidationError::EmptyTree);
        }

        // If categorical splits exist, segments must be indexed by node.
        let has_cat_split = self
            .split_kinds
            .iter()
            .any(|t| matches!(t, SplitKind::Categorical));
        if has_cat_split {
            let segments_len = self.categories.segments().len();
            if segments_len != n_nodes {
                return Err(TreeValidationError::CategoricalSegmentsLenMismatch {
                    segments_len,
                    n_nodes,
                });
            }
        }

        let expected_leaf_values = n_nodes * self.leaf_len;
        if self.leaf_values.len() != expected_leaf_values {
            return Err(TreeValidationError::LeafValuesLenMismatch {
                expected: expected_leaf_values,
                actual: self.leaf_values.len(),
            });
        }

        // Iterative DFS with color marking.
        // 0 = unvisited, 1 = visiting, 2 = done
        let mut color = vec![0u8; n_nodes];
        let mut stack: Vec<(NodeId, u8)> = vec![(0, 0)];

        while let Some((node, phase)) = stack.pop() {
            let node_usize = node as usize;
            if node_usize >= n_nodes {
                return Err(TreeValidationError::ChildOutOfBounds {
                    node,
                    side: "root",
                    child: node,
                    n_nodes,
                });
            }

            match phase {
                0 => {
                    match color[node_usize] {
                        0 => {}
                        1 => return Err(TreeValidationError::CycleDetected { node }),
                        2 => return Err(TreeValidationError::DuplicateVisit { node }),
                        _ => unreachable!(),
                    }

                    color[node_usize] = 1;
                    stack.push((node, 1));

                    if !self.is_leaf(node) {
                        let left = self.left_child(node);
                        let right = self.right_child(node);

                        if left == node || right == node {
                            return Err(TreeValidationError::SelfLoop { node });
                        }

                        let left_usize = left as usize;
                        if left_usize >= n_nodes {
                            return Err(TreeValidationError::ChildOutOfBounds {
                                node,
                                side: "left",
                                child: left,
                                n_nodes,
                            });
                        }
                        let right_usize = right as usize;
                        if right_usize >= n_nodes {
                            return Err(TreeValidationError::ChildOutOfBounds {
                                node,
                                side: "right",
                                child: right,
                                n_nodes,
                            });
                        }

                        // Visit children
                        stack.push((right, 0));
                        stack.push((left, 0));
                    }
                }
                1 => {
                    color[node_usize] = 2;
                }
                _ => unreachable!(),
            }
        }

        for (i, &c) in color.iter().enumerate() {
            if c == 0 {
                return Err(TreeValidationError::UnreachableNode { node: i as u32 });
            }
        }

        Ok(())
    }

    // =========================================================================
    // Traversal
    // =========================================================================

    /// Traverse the tree to find the leaf node for a sample.
    ///
    /// Numerical splits route left when the node's comparison holds for the
    /// feature value, right otherwise; NaN takes the default direction.
    /// Categorical splits round the value to the nearest integer and test
    /// membership in the node's category set; values that cannot name a
    /// category (NaN, infinities, negatives, out of u32 range) take the
    /// default direction.
    #[inline]
    pub fn traverse_to_leaf<R: FeatureRow>(&self, row: &R) -> NodeId {
        let mut node: NodeId = 0;

        while !self.is_leaf(node) {
            let fvalue = row.feature(self.split_index(node) as usize);

            node = match self.split_kind(node) {
                SplitKind::Numerical => {
                    if fvalue.is_nan() {
                        self.default_child(node)
                    } else if self
                        .comparison_op(node)
                        .holds(fvalue, self.split_threshold(node))
                    {
                        self.left_child(node)
                    } else {
                        self.right_child(node)
                    }
                }
                SplitKind::Categorical => match float_to_category(fvalue) {
                    Some(category) => {
                        let member = self.categories.contains(node, category);
                        if member == self.categories_go_right(node) {
                            self.right_child(node)
                        } else {
                            self.left_child(node)
                        }
                    }
                    None => self.default_child(node),
                },
            };
        }

        node
    }

    /// Traverse the tree and return the leaf vector for a single sample.
    pub fn predict_row(&self, features: &[f64]) -> &[f64] {
        let leaf_id = self.traverse_to_leaf(&features);
        self.leaf_value(leaf_id)
    }
}
