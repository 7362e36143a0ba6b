//! Model metadata.
//!
//! Shared metadata types for model introspection.

use serde::{Deserialize, Serialize};

/// Type of machine learning task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TaskKind {
    /// Regression (single continuous target).
    #[default]
    Regression,
    /// Binary classification (2 classes).
    BinaryClassification,
    /// Multi-class classification (3+ classes).
    MulticlassClassification {
        /// Number of classes.
        n_classes: usize,
    },
    /// Regression with several continuous targets per sample.
    MultiTargetRegression,
    /// Isolation-forest style anomaly scoring.
    AnomalyDetection,
}

impl TaskKind {
    /// Returns true if this is a classification task.
    pub fn is_classification(&self) -> bool {
        matches!(
            self,
            Self::BinaryClassification | Self::MulticlassClassification { .. }
        )
    }

    /// Returns true if this is a regression task (single or multi target).
    pub fn is_regression(&self) -> bool {
        matches!(self, Self::Regression | Self::MultiTargetRegression)
    }
}

/// Shared metadata for all model kinds.
///
/// Describes the model's input and output layout: how many features it
/// consumes, how many targets it predicts, and the per-group offsets added
/// before the post-transform.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelMeta {
    /// Number of input features.
    pub n_features: usize,
    /// Number of predicted targets.
    pub n_targets: usize,
    /// Task type.
    pub task: TaskKind,
    /// Base scores (one per output group), added after aggregation.
    pub base_scores: Vec<f64>,
}

impl ModelMeta {
    /// Create metadata for a single-target regression task.
    pub fn for_regression(n_features: usize) -> Self {
        Self {
            n_features,
            n_targets: 1,
            task: TaskKind::Regression,
            base_scores: vec![0.0],
        }
    }

    /// Create metadata for binary classification with `n_groups` output
    /// groups (1 for margin-per-sample boosting, 2 for class-probability
    /// forests).
    pub fn for_binary(n_features: usize, n_groups: usize) -> Self {
        Self {
            n_features,
            n_targets: 1,
            task: TaskKind::BinaryClassification,
            base_scores: vec![0.0; n_groups],
        }
    }

    /// Create metadata for multi-class classification.
    pub fn for_multiclass(n_features: usize, n_classes: usize) -> Self {
        Self {
            n_features,
            n_targets: 1,
            task: TaskKind::MulticlassClassification { n_classes },
            base_scores: vec![0.0; n_classes],
        }
    }

    /// Create metadata for multi-target regression.
    pub fn for_multi_target_regression(n_features: usize, n_targets: usize) -> Self {
        Self {
            n_features,
            n_targets,
            task: TaskKind::MultiTargetRegression,
            base_scores: vec![0.0; n_targets],
        }
    }

    /// Create metadata for anomaly detection.
    pub fn for_anomaly(n_features: usize) -> Self {
        Self {
            n_features,
            n_targets: 1,
            task: TaskKind::AnomalyDetection,
            base_scores: vec![0.0],
        }
    }

    /// Set base scores.
    pub fn with_base_scores(mut self, scores: Vec<f64>) -> Self {
        self.base_scores = scores;
        self
    }
}
