//! Categorical split storage for tree nodes.
//!
//! Categorical splits are stored as bitsets listing the MEMBER categories of
//! the split. Whether members go left or right is a per-node flag on the
//! tree; this module only answers membership queries.

// =============================================================================
// CategoriesStorage
// =============================================================================

/// Storage for categorical split bitsets in a tree.
///
/// Stores category sets as packed u32 bitsets, where each bit represents
/// whether a category value is a member of the node's category set.
///
/// # Format
///
/// - `categories`: flat array of u32 bitset words for all nodes
/// - `segments`: per-node `(start_index, size)` into categories array
#[derive(Debug, Clone, Default)]
pub struct CategoriesStorage {
    /// Flat array of bitset words (32 categories per word).
    categories: Box<[u32]>,
    /// Per-node segment: `(start_index, size)` into categories array.
    /// Indexed by node_idx. Nodes without categorical splits have `(0, 0)`.
    segments: Box<[(u32, u32)]>,
}

impl CategoriesStorage {
    /// Create empty categories storage.
    #[inline]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create categories storage from raw data.
    ///
    /// # Arguments
    ///
    /// * `categories` - Flat bitset data for all categorical nodes
    /// * `segments` - Per-node `(start, size)` into categories. Length must equal num_nodes.
    pub fn new(categories: Vec<u32>, segments: Vec<(u32, u32)>) -> Self {
        Self {
            categories: categories.into_boxed_slice(),
            segments: segments.into_boxed_slice(),
        }
    }

    /// Check if a category is a member of the set stored for a given node.
    ///
    /// Categories beyond the stored bitset are never members, and nodes
    /// without stored categories have no members at all.
    #[inline]
    pub fn contains(&self, node_idx: u32, category: u32) -> bool {
        let (start, size) = self.segments[node_idx as usize];
        if size == 0 {
            return false;
        }

        // word_idx = category / 32, bit_idx = category % 32
        let word_idx = category >> 5;
        let bit_idx = category & 31;

        if word_idx >= size {
            return false;
        }

        let word = self.categories[(start + word_idx) as usize];
        (word >> bit_idx) & 1 != 0
    }

    /// Whether this storage has any categorical data.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Get the segments array.
    #[inline]
    pub fn segments(&self) -> &[(u32, u32)] {
        &self.segments
    }

    /// Get the raw bitsets array.
    #[inline]
    pub fn bitsets(&self) -> &[u32] {
        &self.categories
    }

    /// Get the bitset slice for a specific node (for testing/debugging).
    #[inline]
    pub fn bitset_for_node(&self, node_idx: u32) -> &[u32] {
        let (start, size) = self.segments[node_idx as usize];
        &self.categories[start as usize..(start + size) as usize]
    }
}

// =============================================================================
// Bitset Builder Utilities
// =============================================================================

/// Convert a feature value (f64) to a category index (u32).
///
/// Category values travel through feature matrices as floats, so membership
/// tests round to the nearest integer first. Returns `None` when the value
/// cannot name a category at all: NaN, infinities, negatives, or values
/// beyond `u32::MAX`. Callers treat `None` like a missing value and take
/// the node's default direction.
#[inline]
pub fn float_to_category(value: f64) -> Option<u32> {
    if !value.is_finite() {
        return None;
    }
    let rounded = value.round();
    if rounded < 0.0 || rounded > u32::MAX as f64 {
        return None;
    }
    Some(rounded as u32)
}

/// Build a packed u32 bitset from a list of category values.
///
/// Sets bit `c` for each category value `c` in the input.
///
/// # Bitset Layout
///
/// Categories are packed into u32 words, 32 categories per word:
/// - Categories 0-31 are stored in word 0
/// - Categories 32-63 are stored in word 1
/// - And so on...
///
/// Within each word, bit `i` represents category `word_index * 32 + i`.
pub fn categories_to_bitset(categories: &[u32]) -> Vec<u32> {
    if categories.is_empty() {
        return vec![];
    }

    // Each word stores 32 categories, so we need ceil((max_cat + 1) / 32) words.
    let max_cat = categories.iter().copied().max().unwrap_or(0);
    let num_words = ((max_cat >> 5) + 1) as usize;
    let mut bitset = vec![0u32; num_words];

    for &cat in categories {
        let word_idx = (cat >> 5) as usize;
        let bit_idx = cat & 31;
        bitset[word_idx] |= 1u32 << bit_idx;
    }

    bitset
}

// =============================================================================
// Tests
// =============================================================================
