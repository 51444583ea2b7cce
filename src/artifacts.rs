//! Persisted training artifacts.
//!
//! Everything a serving process needs travels as one [`ArtifactBundle`]:
//! the fitted encoders, the scaler, the frozen feature order, and the model.
//! The bundle is saved and loaded as a unit and validated as a matched set,
//! so a model can never be paired with transforms from a different run.

use crate::error::{HabitusError, Result};
use crate::preprocessing::{CategoryEncoder, InferencePreparer, StandardScaler, TargetEncoder};
use crate::training::{ClassifierModel, ModelMetrics};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

/// Bump when the serialized layout changes incompatibly.
pub const ARTIFACT_SCHEMA_VERSION: u32 = 1;

/// One training run's outputs, serialized together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactBundle {
    pub schema_version: u32,
    pub created_at: DateTime<Utc>,
    pub encoder: CategoryEncoder,
    pub target_encoder: TargetEncoder,
    pub scaler: StandardScaler,
    /// Exact column order the model was fitted on.
    pub feature_order: Vec<String>,
    pub model: ClassifierModel,
    /// Holdout metrics from the run that produced the model.
    pub metrics: Option<ModelMetrics>,
}

impl ArtifactBundle {
    /// Check that the pieces belong together. Every failure is an
    /// [`HabitusError::ArtifactMismatch`]: a bundle that fails here must not
    /// serve predictions.
    pub fn validate(&self) -> Result<()> {
        if self.schema_version != ARTIFACT_SCHEMA_VERSION {
            return Err(HabitusError::ArtifactMismatch(format!(
                "artifact schema version {} is not supported (expected {})",
                self.schema_version, ARTIFACT_SCHEMA_VERSION
            )));
        }
        if !self.encoder.is_fitted() {
            return Err(HabitusError::ArtifactMismatch(
                "categorical encoder is not fitted".to_string(),
            ));
        }
        if !self.scaler.is_fitted() {
            return Err(HabitusError::ArtifactMismatch(
                "scaler is not fitted".to_string(),
            ));
        }
        if !self.target_encoder.is_fitted() {
            return Err(HabitusError::ArtifactMismatch(
                "target encoder is not fitted".to_string(),
            ));
        }

        if self.feature_order.is_empty() {
            return Err(HabitusError::ArtifactMismatch(
                "feature order is empty".to_string(),
            ));
        }
        let order_set: HashSet<&str> = self.feature_order.iter().map(|s| s.as_str()).collect();
        if order_set.len() != self.feature_order.len() {
            return Err(HabitusError::ArtifactMismatch(
                "feature order contains duplicates".to_string(),
            ));
        }

        let encoded: HashSet<&str> = self.encoder.columns().iter().map(|s| s.as_str()).collect();
        let scaled: HashSet<&str> = self.scaler.columns().iter().map(|s| s.as_str()).collect();

        if let Some(col) = encoded.intersection(&scaled).next() {
            return Err(HabitusError::ArtifactMismatch(format!(
                "column '{}' is both encoded and scaled",
                col
            )));
        }
        for col in encoded.union(&scaled) {
            if !order_set.contains(col) {
                return Err(HabitusError::ArtifactMismatch(format!(
                    "fitted column '{}' is missing from the feature order",
                    col
                )));
            }
        }
        if encoded.len() + scaled.len() != self.feature_order.len() {
            return Err(HabitusError::ArtifactMismatch(format!(
                "feature order has {} columns but transforms cover {}",
                self.feature_order.len(),
                encoded.len() + scaled.len()
            )));
        }

        if self.model.n_features() != self.feature_order.len() {
            return Err(HabitusError::ArtifactMismatch(format!(
                "model expects {} features but feature order has {}",
                self.model.n_features(),
                self.feature_order.len()
            )));
        }
        if self.model.n_classes() != self.target_encoder.n_classes() {
            return Err(HabitusError::ArtifactMismatch(format!(
                "model has {} classes but target encoder has {}",
                self.model.n_classes(),
                self.target_encoder.n_classes()
            )));
        }
        for &code in self.model.classes() {
            let rounded = code.round() as i64;
            if rounded < 0 || rounded as usize >= self.target_encoder.n_classes() {
                return Err(HabitusError::ArtifactMismatch(format!(
                    "model class code {} has no target encoder entry",
                    code
                )));
            }
        }

        Ok(())
    }

    /// Serialize the bundle to pretty JSON, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        info!(path = %path.display(), "saved artifact bundle");
        Ok(())
    }

    /// Load a bundle and validate it before returning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let bundle: Self = serde_json::from_str(&json)?;
        bundle.validate()?;
        info!(path = %path.display(), "loaded artifact bundle");
        Ok(bundle)
    }

    /// Inference preparer borrowing this bundle's fitted pieces.
    pub fn preparer(&self) -> InferencePreparer<'_> {
        InferencePreparer::new(&self.encoder, &self.scaler, &self.feature_order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::TrainingPreparer;
    use crate::schema::TARGET_COLUMN;
    use crate::training::DecisionTree;
    use polars::prelude::*;

    fn fitted_bundle() -> ArtifactBundle {
        let df = df!(
            "Gender" => ["Male", "Female", "Male", "Female"],
            "Age" => [23.0, 31.0, 45.0, 26.0],
            "Height" => [1.80, 1.62, 1.75, 1.68],
            "Weight" => [85.0, 55.0, 110.0, 62.0],
            "family_history" => ["yes", "no", "yes", "no"],
            "FAVC" => ["yes", "no", "yes", "yes"],
            "FCVC" => [2.0, 3.0, 1.0, 2.0],
            "NCP" => [3.0, 3.0, 4.0, 1.0],
            "CAEC" => ["Sometimes", "no", "Frequently", "Sometimes"],
            "SMOKE" => ["no", "no", "yes", "no"],
            "CH2O" => [2.0, 1.0, 3.0, 2.0],
            "SCC" => ["no", "yes", "no", "no"],
            "FAF" => [1.0, 2.0, 0.0, 3.0],
            "TUE" => [1.0, 0.0, 2.0, 1.0],
            "CALC" => ["Sometimes", "no", "Frequently", "no"],
            "MTRANS" => ["Public_Transportation", "Walking", "Automobile", "Walking"],
            TARGET_COLUMN => ["Overweight_Level_I", "Normal_Weight", "Obesity_Type_II", "Normal_Weight"],
        )
        .unwrap();

        let prepared = TrainingPreparer::new(TARGET_COLUMN).prepare(&df).unwrap();
        let mut tree = DecisionTree::new();
        tree.fit(&prepared.x, &prepared.y).unwrap();

        ArtifactBundle {
            schema_version: ARTIFACT_SCHEMA_VERSION,
            created_at: Utc::now(),
            encoder: prepared.encoder,
            target_encoder: prepared.target_encoder,
            scaler: prepared.scaler,
            feature_order: prepared.feature_order,
            model: ClassifierModel::DecisionTree(tree),
            metrics: None,
        }
    }

    #[test]
    fn test_valid_bundle_passes() {
        assert!(fitted_bundle().validate().is_ok());
    }

    #[test]
    fn test_wrong_version_is_rejected() {
        let mut bundle = fitted_bundle();
        bundle.schema_version = 99;
        assert!(matches!(
            bundle.validate().unwrap_err(),
            HabitusError::ArtifactMismatch(_)
        ));
    }

    #[test]
    fn test_truncated_feature_order_is_rejected() {
        let mut bundle = fitted_bundle();
        bundle.feature_order.pop();
        assert!(matches!(
            bundle.validate().unwrap_err(),
            HabitusError::ArtifactMismatch(_)
        ));
    }

    #[test]
    fn test_foreign_scaler_is_rejected() {
        let mut bundle = fitted_bundle();
        // A freshly constructed scaler has no fitted columns
        bundle.scaler = StandardScaler::new();
        assert!(matches!(
            bundle.validate().unwrap_err(),
            HabitusError::ArtifactMismatch(_)
        ));
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models").join("bundle.json");

        let bundle = fitted_bundle();
        bundle.save(&path).unwrap();
        let loaded = ArtifactBundle::load(&path).unwrap();

        assert_eq!(loaded.feature_order, bundle.feature_order);
        assert_eq!(
            loaded.target_encoder.classes(),
            bundle.target_encoder.classes()
        );
        assert_eq!(loaded.model.n_features(), bundle.model.n_features());
    }

    #[test]
    fn test_load_rejects_tampered_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.json");

        let bundle = fitted_bundle();
        bundle.save(&path).unwrap();

        let json = std::fs::read_to_string(&path).unwrap();
        let tampered = json.replace("\"schema_version\": 1", "\"schema_version\": 3");
        std::fs::write(&path, tampered).unwrap();

        assert!(matches!(
            ArtifactBundle::load(&path).unwrap_err(),
            HabitusError::ArtifactMismatch(_)
        ));
    }
}
