//! Model training module
//!
//! Provides the training side of the pipeline:
//! - Decision tree and random forest classifiers
//! - Training engine that chains preparation, fitting, and evaluation
//! - Holdout metrics and stratified cross-validation

mod config;
mod engine;
mod metrics;
pub mod cross_validation;
pub mod decision_tree;
pub mod random_forest;

pub use config::{ModelType, TrainingConfig};
pub use cross_validation::{CvSplit, CvSummary, StratifiedKFold};
pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use engine::{compare_models, ModelComparison, TrainEngine};
pub use metrics::{ClassReport, ModelMetrics};
pub use random_forest::{MaxFeatures, RandomForest};

use crate::error::Result;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// A fitted classifier of either supported family, dispatching by value so
/// the whole model serializes into the artifact bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClassifierModel {
    DecisionTree(DecisionTree),
    RandomForest(RandomForest),
}

impl ClassifierModel {
    pub fn model_type(&self) -> ModelType {
        match self {
            ClassifierModel::DecisionTree(_) => ModelType::DecisionTree,
            ClassifierModel::RandomForest(_) => ModelType::RandomForest,
        }
    }

    /// Predict class codes.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            ClassifierModel::DecisionTree(tree) => tree.predict(x),
            ClassifierModel::RandomForest(forest) => forest.predict(x),
        }
    }

    /// Per-class probabilities, columns ordered like [`Self::classes`].
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        match self {
            ClassifierModel::DecisionTree(tree) => tree.predict_proba(x),
            ClassifierModel::RandomForest(forest) => forest.predict_proba(x),
        }
    }

    /// Sorted class codes seen at fit time.
    pub fn classes(&self) -> &[f64] {
        match self {
            ClassifierModel::DecisionTree(tree) => tree.classes(),
            ClassifierModel::RandomForest(forest) => forest.classes(),
        }
    }

    pub fn n_classes(&self) -> usize {
        self.classes().len()
    }

    pub fn n_features(&self) -> usize {
        match self {
            ClassifierModel::DecisionTree(tree) => tree.n_features(),
            ClassifierModel::RandomForest(forest) => forest.n_features(),
        }
    }

    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        match self {
            ClassifierModel::DecisionTree(tree) => tree.feature_importances(),
            ClassifierModel::RandomForest(forest) => forest.feature_importances(),
        }
    }
}
