//! Crate-wide error types.
//!
//! Importers and the exporter validate eagerly and fail fast with the most
//! specific kind below; the inference engine assumes a validated [`Model`]
//! and only re-checks input shape per call.
//!
//! [`Model`]: crate::Model

use thiserror::Error;

use crate::repr::{EnsembleValidationError, TreeValidationError};

/// Convenience alias for fallible operations in this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by model import, validation, inference, and export.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The source model contains something the representation cannot express:
    /// string-valued categories, a non-constant initial estimator, per-target
    /// class counts that differ, and so on. Never recovered by approximation.
    #[error("unsupported construct: {reason}")]
    UnsupportedConstruct { reason: String },

    /// Arrays or matrices disagree about their dimensions, or an export
    /// target's required invariants (zero base scores) are violated.
    #[error("shape mismatch: {reason}")]
    ShapeMismatch { reason: String },

    /// A structural invariant is broken: out-of-range child index, cycle,
    /// leaf-vector width mismatch. Always a bug in the producing side.
    #[error("corrupt model: {reason}")]
    CorruptModel { reason: String },

    /// The model's family has no defined inverse mapping back to a native
    /// estimator (boosting with folded learning rates, isolation forests).
    #[error("unsupported for export: {reason}")]
    UnsupportedForExport { reason: String },
}

impl From<TreeValidationError> for Error {
    fn from(err: TreeValidationError) -> Self {
        Error::CorruptModel {
            reason: err.to_string(),
        }
    }
}

impl From<EnsembleValidationError> for Error {
    fn from(err: EnsembleValidationError) -> Self {
        Error::CorruptModel {
            reason: err.to_string(),
        }
    }
}
