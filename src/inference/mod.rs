//! Inference engine for tree ensemble models.
//!
//! [`Predictor`] borrows a validated [`Model`](crate::Model) and evaluates
//! feature matrices against it: per-sample tree traversal, per-group
//! accumulation, aggregation, base scores, and the model's post-transform.

pub mod predictor;

pub use predictor::Predictor;
