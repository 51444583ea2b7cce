//! Training configuration

use crate::schema::TARGET_COLUMN;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Type of model to train
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelType {
    /// Single decision tree
    DecisionTree,
    /// Random forest
    RandomForest,
}

impl ModelType {
    pub fn name(&self) -> &'static str {
        match self {
            ModelType::DecisionTree => "Decision Tree",
            ModelType::RandomForest => "Random Forest",
        }
    }

    /// Parse the CLI/config token form.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "decision_tree" => Some(ModelType::DecisionTree),
            "random_forest" => Some(ModelType::RandomForest),
            _ => None,
        }
    }

    /// All trainable model types.
    pub fn all() -> [ModelType; 2] {
        [ModelType::DecisionTree, ModelType::RandomForest]
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Configuration for one training run.
///
/// Immutable once handed to the engine; tweak a copy through the builders
/// instead of mutating a shared value mid-run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Target column name
    pub target_column: String,

    /// Model type to train
    pub model_type: ModelType,

    /// Fraction of rows held out for validation metrics
    pub validation_split: f64,

    /// Number of trees (forest only)
    pub n_estimators: usize,

    /// Maximum tree depth (None = unbounded)
    pub max_depth: Option<usize>,

    /// Minimum samples to split a node
    pub min_samples_split: usize,

    /// Minimum samples per leaf
    pub min_samples_leaf: usize,

    /// Number of cross-validation folds (0 = no CV)
    pub cv_folds: usize,

    /// Seed for splitting and model fitting
    pub random_state: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            target_column: TARGET_COLUMN.to_string(),
            model_type: ModelType::RandomForest,
            validation_split: 0.2,
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            cv_folds: 0,
            random_state: 42,
        }
    }
}

impl TrainingConfig {
    pub fn new(target_column: impl Into<String>) -> Self {
        Self {
            target_column: target_column.into(),
            ..Self::default()
        }
    }

    pub fn with_model(mut self, model_type: ModelType) -> Self {
        self.model_type = model_type;
        self
    }

    pub fn with_n_estimators(mut self, n_estimators: usize) -> Self {
        self.n_estimators = n_estimators;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    pub fn with_validation_split(mut self, validation_split: f64) -> Self {
        self.validation_split = validation_split;
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    pub fn with_cv(mut self, cv_folds: usize) -> Self {
        self.cv_folds = cv_folds;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }
}
