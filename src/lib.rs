//! arbors: portable tree-ensemble models for Rust.
//!
//! A canonical representation for decision-tree ensembles, a batch
//! inference engine over it, and importers for fitted scikit-learn
//! estimators.
//!
//! # Key Types
//!
//! - [`Model`] - Complete package: trees, metadata, output transform
//! - [`Predictor`] - Batch inference over feature matrices
//! - [`repr::Ensemble`] / [`repr::Tree`] - Canonical tree storage
//! - [`compat::sklearn::SklearnModel`] - Fitted estimator descriptions
//!
//! # Importing scikit-learn Models
//!
//! Use [`compat::sklearn::import_model`] to convert a fitted estimator
//! description into a [`Model`], then wrap it in a [`Predictor`].
//! See the [`compat`] module for the family-by-family mapping.

// Re-export approx traits for users who want to compare predictions
pub use approx;

pub mod compat;
pub mod error;
pub mod inference;
pub mod model;
pub mod repr;
pub mod testing;
pub mod utils;

// =============================================================================
// Convenience Re-exports
// =============================================================================

// Error handling
pub use error::{Error, Result};

// High-level model and inference types
pub use inference::Predictor;
pub use model::{Model, ModelMeta, PostTransform, TaskKind};

// Representation types (for building ensembles directly)
pub use repr::{Aggregation, ComparisonOp, Ensemble, FeatureRow, Tree, TreeBuilder};

// Shared utilities
pub use utils::{run_with_threads, Parallelism};
