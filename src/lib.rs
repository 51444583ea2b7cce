//! Habitus - Obesity-category classification pipeline
//!
//! This crate trains and serves a seven-class obesity classifier over
//! lifestyle survey data, with the training-time transforms persisted so
//! that serving can never drift from them:
//! - Survey schema, physiological bounds, and BMI derivation
//! - Fit/transform preprocessing (category encoding, target encoding,
//!   standardization) frozen into a single artifact bundle
//! - Decision tree and random forest classifiers with stratified
//!   validation and cross-validation
//! - Single-record and batch inference with severity-ordered
//!   probabilities and lifestyle recommendations
//!
//! # Modules
//!
//! - [`schema`] - Survey columns, record validation, outcome classes
//! - [`preprocessing`] - Encoders, scaler, and the training/inference preparers
//! - [`training`] - Tree models, metrics, cross-validation, training engine
//! - [`artifacts`] - The persisted, self-validating artifact bundle
//! - [`inference`] - Prediction over a loaded bundle
//! - [`interpret`] - BMI bands, severity levels, recommendations
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Domain schema and interpretation
pub mod interpret;
pub mod schema;

// Pipeline
pub mod artifacts;
pub mod inference;
pub mod preprocessing;
pub mod training;

// Services
pub mod cli;

pub use error::{HabitusError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{HabitusError, Result};

    // Schema
    pub use crate::schema::{ObesityClass, SurveyRecord};

    // Preprocessing
    pub use crate::preprocessing::{
        CategoryEncoder, InferencePreparer, StandardScaler, TargetEncoder, TrainingPreparer,
    };

    // Training
    pub use crate::training::{ModelType, TrainEngine, TrainingConfig};

    // Artifacts
    pub use crate::artifacts::ArtifactBundle;

    // Inference
    pub use crate::inference::{Prediction, Predictor};

    // Interpretation
    pub use crate::interpret::{Interpretation, Severity};
}
