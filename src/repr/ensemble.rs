//! Canonical ensemble representation (collection of trees).

use thiserror::Error;

use super::tree::{Tree, TreeValidationError};

/// How per-group tree sums are combined.
///
/// `Sum` leaves the accumulated total as-is (boosting); `Average` divides
/// each group by the number of trees contributing to it (bagging).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Aggregation {
    #[default]
    Sum,
    Average,
}

/// Structural validation errors for [`Ensemble`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnsembleValidationError {
    /// Ensembles need at least one output group.
    #[error("ensemble must have at least one output group")]
    NoGroups,
    /// Group assignments and trees disagree in count.
    #[error("{n_trees} trees but {len} group assignments")]
    TreeGroupsLenMismatch { n_trees: usize, len: usize },
    /// A tree is assigned to a nonexistent group.
    #[error("tree {tree_idx} assigned to group {group}, but ensemble has {n_groups} groups")]
    TreeGroupOutOfRange {
        tree_idx: usize,
        group: u32,
        n_groups: u32,
    },
    /// Leaves must be scalars or span all groups.
    #[error("leaf vectors of width {leaf_len} cannot feed {n_groups} groups")]
    LeafLenInvalid { leaf_len: usize, n_groups: u32 },
    /// A tree's leaf width disagrees with the ensemble's.
    #[error("tree {tree_idx} has leaf width {actual}, ensemble expects {expected}")]
    TreeLeafLenMismatch {
        tree_idx: usize,
        expected: usize,
        actual: usize,
    },
    /// A member tree failed structural validation.
    #[error("tree {tree_idx}: {error}")]
    InvalidTree {
        tree_idx: usize,
        error: TreeValidationError,
    },
}

/// Ensemble of decision trees.
///
/// Stores trees with their group assignments. Scalar-leaf trees each feed
/// one group; vector-leaf trees (leaf width equal to the group count) feed
/// every group elementwise and carry a group assignment of 0 by convention.
#[derive(Debug, Clone)]
pub struct Ensemble {
    trees: Vec<Tree>,
    tree_groups: Vec<u32>,
    n_groups: u32,
    leaf_len: usize,
    aggregation: Aggregation,
}

impl Ensemble {
    /// Create an empty ensemble with the given output layout.
    pub fn new(n_groups: u32, leaf_len: usize, aggregation: Aggregation) -> Self {
        debug_assert!(n_groups >= 1, "ensemble needs at least one group");
        debug_assert!(
            leaf_len == 1 || leaf_len == n_groups as usize,
            "leaf width must be 1 or n_groups"
        );
        Self {
            trees: Vec::new(),
            tree_groups: Vec::new(),
            n_groups,
            leaf_len,
            aggregation,
        }
    }

    /// Add a tree to the ensemble.
    pub fn push_tree(&mut self, tree: Tree, group: u32) {
        debug_assert!(group < self.n_groups, "group out of range");
        debug_assert_eq!(tree.leaf_len(), self.leaf_len, "leaf width mismatch");
        self.trees.push(tree);
        self.tree_groups.push(group);
    }

    /// Number of trees.
    #[inline]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Number of output groups.
    #[inline]
    pub fn n_groups(&self) -> u32 {
        self.n_groups
    }

    /// Width of every tree's leaf vectors (1 for scalar-leaf ensembles).
    #[inline]
    pub fn leaf_len(&self) -> usize {
        self.leaf_len
    }

    /// How group sums are combined.
    #[inline]
    pub fn aggregation(&self) -> Aggregation {
        self.aggregation
    }

    /// Get a reference to a specific tree.
    #[inline]
    pub fn tree(&self, idx: usize) -> &Tree {
        &self.trees[idx]
    }

    /// Get all tree group assignments as a slice.
    #[inline]
    pub fn tree_groups(&self) -> &[u32] {
        &self.tree_groups
    }

    /// Iterate over trees.
    pub fn trees(&self) -> impl Iterator<Item = &Tree> {
        self.trees.iter()
    }

    /// Iterate over trees with their group assignments.
    pub fn trees_with_groups(&self) -> impl Iterator<Item = (&Tree, u32)> {
        self.trees
            .iter()
            .zip(self.tree_groups.iter())
            .map(|(t, &g)| (t, g))
    }

    /// How many trees contribute to each group.
    ///
    /// Scalar-leaf trees count only toward their assigned group; vector-leaf
    /// trees count toward every group. Used by averaging aggregation.
    pub fn group_tree_counts(&self) -> Vec<u32> {
        let n_groups = self.n_groups as usize;
        if self.leaf_len > 1 {
            return vec![self.trees.len() as u32; n_groups];
        }
        let mut counts = vec![0u32; n_groups];
        for &g in &self.tree_groups {
            counts[g as usize] += 1;
        }
        counts
    }

    /// Validate structural invariants for this ensemble (trees, group
    /// assignments, leaf widths).
    ///
    /// Intended for model import and conversion checks.
    pub fn validate(&self) -> Result<(), EnsembleValidationError> {
        if self.n_groups == 0 {
            return Err(EnsembleValidationError::NoGroups);
        }
        if self.leaf_len != 1 && self.leaf_len != self.n_groups as usize {
            return Err(EnsembleValidationError::LeafLenInvalid {
                leaf_len: self.leaf_len,
                n_groups: self.n_groups,
            });
        }
        if self.tree_groups.len() != self.trees.len() {
            return Err(EnsembleValidationError::TreeGroupsLenMismatch {
                n_trees: self.trees.len(),
                len: self.tree_groups.len(),
            });
        }

        for (i, &g) in self.tree_groups.iter().enumerate() {
            if g >= self.n_groups {
                return Err(EnsembleValidationError::TreeGroupOutOfRange {
                    tree_idx: i,
                    group: g,
                    n_groups: self.n_groups,
                });
            }
        }

        for (i, tree) in self.trees.iter().enumerate() {
            if tree.leaf_len() != self.leaf_len {
                return Err(EnsembleValidationError::TreeLeafLenMismatch {
                    tree_idx: i,
                    expected: self.leaf_len,
                    actual: tree.leaf_len(),
                });
            }
            tree.validate()
                .map_err(|error| EnsembleValidationError::InvalidTree { tree_idx: i, error })?;
        }

        Ok(())
    }
}
