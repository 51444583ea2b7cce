//! Survey-record prediction over a fitted artifact bundle.

use crate::artifacts::ArtifactBundle;
use crate::error::{HabitusError, Result};
use crate::interpret::Interpretation;
use crate::schema::{ObesityClass, SurveyRecord};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// A classified survey record.
#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    /// Winning class.
    pub class: ObesityClass,
    /// Probability attached to the winning class.
    pub confidence: f64,
    /// Per-class probabilities in severity order, least to most severe.
    /// Classes the model never saw during training carry probability zero.
    pub probabilities: Vec<(ObesityClass, f64)>,
    /// BMI derived from the submitted height and weight.
    pub bmi: f64,
    /// Plain-language BMI band for the derived BMI.
    pub bmi_category: String,
}

/// Serves predictions from a persisted artifact bundle.
///
/// The bundle is validated once on construction; after that every record
/// goes through exactly the transforms the bundle was trained with, so a
/// prediction can only be produced by a matched encoder/scaler/model set.
pub struct Predictor {
    bundle: Arc<ArtifactBundle>,
    interpretation: Interpretation,
}

impl Predictor {
    /// Wrap a fitted bundle. Fails if the bundle is not a matched set.
    pub fn new(bundle: ArtifactBundle) -> Result<Self> {
        bundle.validate()?;
        debug!(
            classes = bundle.model.n_classes(),
            features = bundle.feature_order.len(),
            "predictor ready"
        );
        Ok(Self {
            bundle: Arc::new(bundle),
            interpretation: Interpretation::default(),
        })
    }

    /// Load a bundle from disk and wrap it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(ArtifactBundle::load(path)?)
    }

    pub fn with_interpretation(mut self, interpretation: Interpretation) -> Self {
        self.interpretation = interpretation;
        self
    }

    /// Classify one survey record.
    pub fn predict(&self, record: &SurveyRecord) -> Result<Prediction> {
        let mut predictions = self.predict_batch(std::slice::from_ref(record))?;
        predictions
            .pop()
            .ok_or_else(|| HabitusError::Data("prediction produced no output row".to_string()))
    }

    /// Classify a batch of survey records, preserving input order.
    pub fn predict_batch(&self, records: &[SurveyRecord]) -> Result<Vec<Prediction>> {
        let x = self.bundle.preparer().prepare_records(records)?;
        let proba = self.bundle.model.predict_proba(&x)?;
        let classes = self.model_classes()?;

        debug!(rows = records.len(), "scored records");

        records
            .iter()
            .zip(proba.outer_iter())
            .map(|(record, row)| self.row_to_prediction(record, &classes, &row.to_vec()))
            .collect()
    }

    /// Lifestyle recommendations for a scored record.
    pub fn explain(&self, record: &SurveyRecord, prediction: &Prediction) -> Vec<String> {
        self.interpretation.recommendations(record, prediction.class)
    }

    pub fn bundle(&self) -> &ArtifactBundle {
        &self.bundle
    }

    pub fn interpretation(&self) -> &Interpretation {
        &self.interpretation
    }

    /// Map the model's class codes back to outcome classes, in the model's
    /// own class order.
    fn model_classes(&self) -> Result<Vec<ObesityClass>> {
        self.bundle
            .model
            .classes()
            .iter()
            .map(|&code| {
                let label = self.bundle.target_encoder.decode(code.round() as u32)?;
                ObesityClass::from_label(label).ok_or_else(|| {
                    HabitusError::Data(format!(
                        "model class label '{}' is not a known obesity class",
                        label
                    ))
                })
            })
            .collect()
    }

    fn row_to_prediction(
        &self,
        record: &SurveyRecord,
        classes: &[ObesityClass],
        row: &[f64],
    ) -> Result<Prediction> {
        // Argmax with the lowest class code winning ties, matching the
        // model's own predict.
        let mut best = 0usize;
        for (i, &p) in row.iter().enumerate() {
            if p > row[best] {
                best = i;
            }
        }

        let probabilities: Vec<(ObesityClass, f64)> = ObesityClass::CANONICAL_ORDER
            .iter()
            .map(|&class| {
                let p = classes
                    .iter()
                    .position(|&c| c == class)
                    .map(|i| row[i])
                    .unwrap_or(0.0);
                (class, p)
            })
            .collect();

        let bmi = record.bmi()?;
        Ok(Prediction {
            class: classes[best],
            confidence: row[best],
            probabilities,
            bmi,
            bmi_category: self.interpretation.bmi_category(bmi).to_string(),
        })
    }
}

impl std::fmt::Debug for Predictor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Predictor")
            .field("classes", &self.bundle.model.n_classes())
            .field("features", &self.bundle.feature_order.len())
            .finish()
    }
}
