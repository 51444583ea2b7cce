//! Training engine implementation

use super::decision_tree::DecisionTree;
use super::random_forest::RandomForest;
use super::{
    ClassifierModel, CvSummary, ModelMetrics, ModelType, StratifiedKFold, TrainingConfig,
};
use crate::artifacts::{ArtifactBundle, ARTIFACT_SCHEMA_VERSION};
use crate::error::{HabitusError, Result};
use crate::preprocessing::TrainingPreparer;
use chrono::Utc;
use ndarray::{Array1, Array2, Axis};
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::info;

/// One row of a model comparison run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelComparison {
    pub model_type: ModelType,
    pub accuracy: f64,
    pub precision_weighted: f64,
    pub recall_weighted: f64,
    pub f1_weighted: f64,
    pub cv_mean: Option<f64>,
    pub cv_std: Option<f64>,
    pub training_time_secs: f64,
}

/// Main training engine: preparation, holdout split, model fit, evaluation,
/// and assembly of the artifact bundle.
///
/// The model that goes into the bundle is the one fitted on the training
/// share of the holdout split, and the stored metrics describe that exact
/// model on data it never saw.
#[derive(Debug, Clone)]
pub struct TrainEngine {
    config: TrainingConfig,
    bundle: Option<ArtifactBundle>,
    cv: Option<CvSummary>,
    is_fitted: bool,
}

impl TrainEngine {
    /// Create a new training engine
    pub fn new(config: TrainingConfig) -> Self {
        Self {
            config,
            bundle: None,
            cv: None,
            is_fitted: false,
        }
    }

    /// Fit on raw training data.
    pub fn fit(&mut self, df: &DataFrame) -> Result<&mut Self> {
        if self.config.validation_split <= 0.0 || self.config.validation_split >= 1.0 {
            return Err(HabitusError::Training(format!(
                "validation_split must be in (0, 1), got {}",
                self.config.validation_split
            )));
        }

        let start = Instant::now();

        let prepared = TrainingPreparer::new(&self.config.target_column).prepare(df)?;

        let (x_train, x_val, y_train, y_val) = self.stratified_split(&prepared.x, &prepared.y)?;
        info!(
            train = x_train.nrows(),
            validation = x_val.nrows(),
            model = %self.config.model_type,
            "fitting model"
        );

        let model = Self::build_model(&self.config, &x_train, &y_train)?;

        let y_pred = model.predict(&x_val)?;
        let mut metrics = ModelMetrics::compute(&y_val, &y_pred, prepared.target_encoder.classes());
        metrics.training_time_secs = start.elapsed().as_secs_f64();
        metrics.n_features = prepared.x.ncols();
        metrics.n_samples = prepared.x.nrows();

        self.cv = if self.config.cv_folds > 0 {
            Some(Self::cross_validate(&self.config, &prepared.x, &prepared.y)?)
        } else {
            None
        };

        let bundle = ArtifactBundle {
            schema_version: ARTIFACT_SCHEMA_VERSION,
            created_at: Utc::now(),
            encoder: prepared.encoder,
            target_encoder: prepared.target_encoder,
            scaler: prepared.scaler,
            feature_order: prepared.feature_order,
            model,
            metrics: Some(metrics),
        };
        bundle.validate()?;

        info!(
            accuracy = bundle.metrics.as_ref().map(|m| m.accuracy).unwrap_or(0.0),
            elapsed_secs = start.elapsed().as_secs_f64(),
            "training complete"
        );

        self.bundle = Some(bundle);
        self.is_fitted = true;
        Ok(self)
    }

    /// Holdout split that keeps the class balance: indices are grouped per
    /// class, shuffled with the configured seed, and the validation share is
    /// taken from each class separately.
    fn stratified_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
    ) -> Result<(Array2<f64>, Array2<f64>, Array1<f64>, Array1<f64>)> {
        let val_ratio = self.config.validation_split;

        let mut class_indices: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (i, &label) in y.iter().enumerate() {
            class_indices.entry(label.round() as i64).or_default().push(i);
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.config.random_state);
        for indices in class_indices.values_mut() {
            indices.shuffle(&mut rng);
        }

        let mut train_indices = Vec::new();
        let mut val_indices = Vec::new();
        for indices in class_indices.values() {
            let class_val_size = ((indices.len() as f64) * val_ratio).max(1.0) as usize;
            let class_val_size = class_val_size.min(indices.len().saturating_sub(1));
            let split_point = indices.len() - class_val_size;
            train_indices.extend_from_slice(&indices[..split_point]);
            val_indices.extend_from_slice(&indices[split_point..]);
        }

        if train_indices.is_empty() || val_indices.is_empty() {
            return Err(HabitusError::Data(
                "stratified split produced an empty train or validation set".to_string(),
            ));
        }

        let x_train = x.select(Axis(0), &train_indices);
        let x_val = x.select(Axis(0), &val_indices);
        let y_train = Array1::from_iter(train_indices.iter().map(|&i| y[i]));
        let y_val = Array1::from_iter(val_indices.iter().map(|&i| y[i]));

        Ok((x_train, x_val, y_train, y_val))
    }

    fn build_model(
        config: &TrainingConfig,
        x: &Array2<f64>,
        y: &Array1<f64>,
    ) -> Result<ClassifierModel> {
        match config.model_type {
            ModelType::DecisionTree => {
                let mut tree = DecisionTree::new()
                    .with_min_samples_split(config.min_samples_split)
                    .with_min_samples_leaf(config.min_samples_leaf)
                    .with_random_state(config.random_state);
                if let Some(depth) = config.max_depth {
                    tree = tree.with_max_depth(depth);
                }
                tree.fit(x, y)?;
                Ok(ClassifierModel::DecisionTree(tree))
            }
            ModelType::RandomForest => {
                let mut forest = RandomForest::new(config.n_estimators)
                    .with_min_samples_split(config.min_samples_split)
                    .with_min_samples_leaf(config.min_samples_leaf)
                    .with_random_state(config.random_state);
                if let Some(depth) = config.max_depth {
                    forest = forest.with_max_depth(depth);
                }
                forest.fit(x, y)?;
                Ok(ClassifierModel::RandomForest(forest))
            }
        }
    }

    /// Fold accuracies from a fresh model per fold.
    fn cross_validate(
        config: &TrainingConfig,
        x: &Array2<f64>,
        y: &Array1<f64>,
    ) -> Result<CvSummary> {
        let splits = StratifiedKFold::new(config.cv_folds)
            .with_random_state(config.random_state)
            .split(y)?;

        let mut scores = Vec::with_capacity(splits.len());
        for split in &splits {
            let x_train = x.select(Axis(0), &split.train_indices);
            let y_train = Array1::from_iter(split.train_indices.iter().map(|&i| y[i]));
            let x_test = x.select(Axis(0), &split.test_indices);
            let y_test = Array1::from_iter(split.test_indices.iter().map(|&i| y[i]));

            let model = Self::build_model(config, &x_train, &y_train)?;
            let y_pred = model.predict(&x_test)?;

            let correct = y_test
                .iter()
                .zip(y_pred.iter())
                .filter(|(t, p)| (*t - *p).abs() < 0.5)
                .count();
            scores.push(correct as f64 / y_test.len() as f64);
        }

        Ok(CvSummary::from_scores(scores))
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Holdout metrics of the fitted model.
    pub fn metrics(&self) -> Option<&ModelMetrics> {
        self.bundle.as_ref().and_then(|b| b.metrics.as_ref())
    }

    /// Cross-validation summary, if folds were configured.
    pub fn cv(&self) -> Option<&CvSummary> {
        self.cv.as_ref()
    }

    pub fn bundle(&self) -> Option<&ArtifactBundle> {
        self.bundle.as_ref()
    }

    /// Take ownership of the fitted bundle.
    pub fn into_bundle(self) -> Result<ArtifactBundle> {
        self.bundle.ok_or(HabitusError::ModelNotFitted)
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Plain-text training report.
    pub fn generate_report(&self) -> String {
        let mut report = String::new();
        report.push_str("=== Habitus Training Report ===\n\n");

        report.push_str(&format!("Model:  {}\n", self.config.model_type));
        report.push_str(&format!("Target: {}\n", self.config.target_column));
        report.push_str(&format!("Fitted: {}\n\n", self.is_fitted));

        let metrics = match self.metrics() {
            Some(m) => m,
            None => {
                report.push_str("No metrics available (model not fitted).\n");
                return report;
            }
        };

        report.push_str("--- Data Shape ---\n");
        report.push_str(&format!("Samples:  {}\n", metrics.n_samples));
        report.push_str(&format!("Features: {}\n\n", metrics.n_features));

        report.push_str("--- Training Time ---\n");
        report.push_str(&format!("{:.4} seconds\n\n", metrics.training_time_secs));

        report.push_str("--- Metrics Summary ---\n");
        report.push_str(&format!("Accuracy:  {:.4}\n", metrics.accuracy));
        report.push_str(&format!("Precision: {:.4} (weighted)\n", metrics.precision_weighted));
        report.push_str(&format!("Recall:    {:.4} (weighted)\n", metrics.recall_weighted));
        report.push_str(&format!("F1 Score:  {:.4} (weighted)\n\n", metrics.f1_weighted));

        if let Some(cv) = &self.cv {
            report.push_str("--- Cross-Validation ---\n");
            report.push_str(&format!(
                "Accuracy: {:.4} +/- {:.4} over {} folds\n\n",
                cv.mean, cv.std, cv.n_folds
            ));
        }

        report.push_str("--- Per-Class ---\n");
        for class in &metrics.per_class {
            report.push_str(&format!(
                "{:<22} precision {:.4}  recall {:.4}  f1 {:.4}  support {}\n",
                class.label, class.precision, class.recall, class.f1, class.support
            ));
        }
        report.push('\n');

        if let Some(bundle) = &self.bundle {
            if let Some(importances) = bundle.model.feature_importances() {
                report.push_str("--- Feature Importance ---\n");
                let mut pairs: Vec<(&str, f64)> = bundle
                    .feature_order
                    .iter()
                    .map(|s| s.as_str())
                    .zip(importances.iter().copied())
                    .collect();
                pairs.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
                for (name, importance) in pairs.iter().take(10) {
                    report.push_str(&format!("{:<22} {:.4}\n", name, importance));
                }
            }
        }

        report
    }
}

/// Train every supported model type on the same data and rank the results
/// by holdout accuracy, best first.
pub fn compare_models(df: &DataFrame, base_config: &TrainingConfig) -> Result<Vec<ModelComparison>> {
    let mut rows = Vec::new();

    for model_type in ModelType::all() {
        let config = base_config.clone().with_model(model_type);
        let mut engine = TrainEngine::new(config);
        engine.fit(df)?;

        let metrics = engine
            .metrics()
            .ok_or_else(|| HabitusError::Training("fit produced no metrics".to_string()))?;

        rows.push(ModelComparison {
            model_type,
            accuracy: metrics.accuracy,
            precision_weighted: metrics.precision_weighted,
            recall_weighted: metrics.recall_weighted,
            f1_weighted: metrics.f1_weighted,
            cv_mean: engine.cv().map(|cv| cv.mean),
            cv_std: engine.cv().map(|cv| cv.std),
            training_time_secs: metrics.training_time_secs,
        });
    }

    rows.sort_by(|a, b| {
        b.accuracy
            .partial_cmp(&a.accuracy)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TARGET_COLUMN;

    fn training_df() -> DataFrame {
        let n = 12usize;
        let genders: Vec<&str> = (0..n).map(|i| if i % 2 == 0 { "Male" } else { "Female" }).collect();
        let yes_no: Vec<&str> = (0..n).map(|i| if i % 3 == 0 { "yes" } else { "no" }).collect();
        let heights: Vec<f64> = (0..n).map(|i| 1.55 + 0.03 * i as f64).collect();
        // Weights spread the rows across three BMI bands, one per label
        let weights: Vec<f64> = (0..n)
            .map(|i| match i % 3 {
                0 => 50.0 + i as f64,
                1 => 75.0 + i as f64,
                _ => 110.0 + i as f64,
            })
            .collect();
        let labels: Vec<&str> = (0..n)
            .map(|i| match i % 3 {
                0 => "Normal_Weight",
                1 => "Overweight_Level_I",
                _ => "Obesity_Type_I",
            })
            .collect();

        df!(
            "Gender" => genders,
            "Age" => (0..n).map(|i| 20.0 + i as f64).collect::<Vec<_>>(),
            "Height" => heights,
            "Weight" => weights,
            "family_history" => yes_no.clone(),
            "FAVC" => yes_no.clone(),
            "FCVC" => (0..n).map(|i| 1.0 + (i % 3) as f64).collect::<Vec<_>>(),
            "NCP" => (0..n).map(|i| 1.0 + (i % 4) as f64).collect::<Vec<_>>(),
            "CAEC" => (0..n).map(|i| if i % 2 == 0 { "Sometimes" } else { "no" }).collect::<Vec<_>>(),
            "SMOKE" => yes_no.clone(),
            "CH2O" => (0..n).map(|i| 1.0 + (i % 3) as f64).collect::<Vec<_>>(),
            "SCC" => yes_no.clone(),
            "FAF" => (0..n).map(|i| (i % 4) as f64).collect::<Vec<_>>(),
            "TUE" => (0..n).map(|i| (i % 3) as f64).collect::<Vec<_>>(),
            "CALC" => (0..n).map(|i| if i % 2 == 0 { "no" } else { "Sometimes" }).collect::<Vec<_>>(),
            "MTRANS" => (0..n).map(|i| if i % 2 == 0 { "Automobile" } else { "Walking" }).collect::<Vec<_>>(),
            TARGET_COLUMN => labels,
        )
        .unwrap()
    }

    #[test]
    fn test_fit_produces_valid_bundle() {
        let config = TrainingConfig::default().with_n_estimators(10);
        let mut engine = TrainEngine::new(config);
        engine.fit(&training_df()).unwrap();

        assert!(engine.is_fitted());
        let bundle = engine.bundle().unwrap();
        bundle.validate().unwrap();
        assert_eq!(bundle.feature_order.len(), 17);
        assert_eq!(bundle.model.n_classes(), 3);

        let metrics = engine.metrics().unwrap();
        assert_eq!(metrics.n_samples, 12);
        assert_eq!(metrics.n_features, 17);
        assert!(metrics.accuracy >= 0.0 && metrics.accuracy <= 1.0);
    }

    #[test]
    fn test_cross_validation_runs() {
        let config = TrainingConfig::default()
            .with_model(ModelType::DecisionTree)
            .with_cv(2);
        let mut engine = TrainEngine::new(config);
        engine.fit(&training_df()).unwrap();

        let cv = engine.cv().unwrap();
        assert_eq!(cv.n_folds, 2);
        assert!(cv.scores.iter().all(|s| (0.0..=1.0).contains(s)));
    }

    #[test]
    fn test_same_seed_same_bundle_predictions() {
        let config = TrainingConfig::default().with_n_estimators(10);
        let mut a = TrainEngine::new(config.clone());
        let mut b = TrainEngine::new(config);
        a.fit(&training_df()).unwrap();
        b.fit(&training_df()).unwrap();

        let x = TrainingPreparer::new(TARGET_COLUMN)
            .prepare(&training_df())
            .unwrap()
            .x;
        let pa = a.bundle().unwrap().model.predict_proba(&x).unwrap();
        let pb = b.bundle().unwrap().model.predict_proba(&x).unwrap();
        assert_eq!(pa, pb);
    }

    #[test]
    fn test_invalid_validation_split_is_an_error() {
        let config = TrainingConfig::default().with_validation_split(1.5);
        let mut engine = TrainEngine::new(config);
        assert!(matches!(
            engine.fit(&training_df()).unwrap_err(),
            HabitusError::Training(_)
        ));
    }

    #[test]
    fn test_report_sections() {
        let config = TrainingConfig::default()
            .with_model(ModelType::DecisionTree)
            .with_cv(2);
        let mut engine = TrainEngine::new(config);
        engine.fit(&training_df()).unwrap();

        let report = engine.generate_report();
        assert!(report.contains("Training Report"));
        assert!(report.contains("Metrics Summary"));
        assert!(report.contains("Cross-Validation"));
        assert!(report.contains("Feature Importance"));
        assert!(report.contains("Normal_Weight"));
    }

    #[test]
    fn test_compare_is_sorted_by_accuracy() {
        let base = TrainingConfig::default().with_n_estimators(10);
        let rows = compare_models(&training_df(), &base).unwrap();

        assert_eq!(rows.len(), 2);
        assert!(rows[0].accuracy >= rows[1].accuracy);
    }
}
