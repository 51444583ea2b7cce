//! Inference module
//!
//! Serves predictions from a persisted artifact bundle:
//! - Single-record and batch prediction from raw survey answers
//! - Per-class probabilities in severity order
//! - BMI category and lifestyle recommendations alongside each prediction

mod predictor;

pub use predictor::{Prediction, Predictor};
