//! Tree node types.

/// Type of split in a decision tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum SplitKind {
    /// Numerical split: routed by comparing the feature value to a threshold.
    #[default]
    Numerical = 0,
    /// Categorical split: routed by membership in a category set.
    Categorical = 1,
}

/// Comparison operator of a numerical split.
///
/// A sample goes LEFT when `op(value, threshold)` holds, RIGHT otherwise.
/// Missing values bypass the comparison entirely and take the node's
/// default direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ComparisonOp {
    /// `value < threshold`
    Less = 0,
    /// `value <= threshold`
    #[default]
    LessEqual = 1,
    /// `value > threshold`
    Greater = 2,
    /// `value >= threshold`
    GreaterEqual = 3,
}

impl ComparisonOp {
    /// Evaluate the comparison for a finite feature value.
    #[inline]
    pub fn holds(self, value: f64, threshold: f64) -> bool {
        match self {
            ComparisonOp::Less => value < threshold,
            ComparisonOp::LessEqual => value <= threshold,
            ComparisonOp::Greater => value > threshold,
            ComparisonOp::GreaterEqual => value >= threshold,
        }
    }
}
