//! Fit-time and serve-time feature preparation.
//!
//! [`TrainingPreparer`] fits the encoders and scaler and produces the model
//! matrix plus the frozen feature order. [`InferencePreparer`] replays exactly
//! those fitted transforms on raw records and reprojects the result into the
//! stored feature order, so a row prepared at serve time is numerically
//! identical to what the model saw at fit time.

use crate::error::{HabitusError, Result};
use crate::preprocessing::{CategoryEncoder, StandardScaler, TargetEncoder};
use crate::schema::{
    SurveyRecord, BMI_COLUMN, CATEGORICAL_COLUMNS, NUMERIC_COLUMNS, RAW_COLUMNS,
};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use std::collections::HashSet;
use tracing::{debug, info};

/// Derive the BMI column from height and weight, replacing any supplied BMI.
/// BMI is never accepted from input: deriving it on both paths keeps the
/// training and serving values in lockstep.
fn derive_bmi(df: &DataFrame) -> Result<DataFrame> {
    let height_col = df
        .column("Height")
        .map_err(|_| HabitusError::Schema("column 'Height' not found".to_string()))?
        .as_materialized_series()
        .cast(&DataType::Float64)
        .map_err(|e| HabitusError::Data(e.to_string()))?;
    let weight_col = df
        .column("Weight")
        .map_err(|_| HabitusError::Schema("column 'Weight' not found".to_string()))?
        .as_materialized_series()
        .cast(&DataType::Float64)
        .map_err(|e| HabitusError::Data(e.to_string()))?;

    let heights = height_col
        .f64()
        .map_err(|e| HabitusError::Data(e.to_string()))?;
    let weights = weight_col
        .f64()
        .map_err(|e| HabitusError::Data(e.to_string()))?;

    let mut values: Vec<f64> = Vec::with_capacity(df.height());
    for (h, w) in heights.into_iter().zip(weights.into_iter()) {
        let h = h.ok_or_else(|| HabitusError::Data("null value in column 'Height'".to_string()))?;
        let w = w.ok_or_else(|| HabitusError::Data("null value in column 'Weight'".to_string()))?;
        if h <= 0.0 {
            return Err(HabitusError::Range {
                field: "Height".to_string(),
                value: h,
                reason: "height must be positive".to_string(),
            });
        }
        values.push(w / (h * h));
    }

    let mut result = df.clone();
    result
        .with_column(Series::new(BMI_COLUMN.into(), values))
        .map_err(|e| HabitusError::Data(e.to_string()))?;
    Ok(result)
}

/// Verify the raw survey schema: every expected column present, nothing
/// unrecognized. A supplied BMI column is tolerated because it is overwritten.
fn check_schema(df: &DataFrame, target_column: Option<&str>) -> Result<()> {
    let actual: HashSet<&str> = df.get_column_names().iter().map(|n| n.as_str()).collect();

    let mut missing: Vec<&str> = RAW_COLUMNS
        .iter()
        .copied()
        .filter(|c| !actual.contains(c))
        .collect();
    if let Some(target) = target_column {
        if !actual.contains(target) {
            missing.push(target);
        }
    }
    if !missing.is_empty() {
        return Err(HabitusError::Schema(format!(
            "missing columns: {}",
            missing.join(", ")
        )));
    }

    let mut allowed: HashSet<&str> = RAW_COLUMNS.iter().copied().collect();
    allowed.insert(BMI_COLUMN);
    if let Some(target) = target_column {
        allowed.insert(target);
    }
    let mut unexpected: Vec<String> = df
        .get_column_names()
        .iter()
        .filter(|n| !allowed.contains(n.as_str()))
        .map(|n| n.to_string())
        .collect();
    if !unexpected.is_empty() {
        unexpected.sort();
        return Err(HabitusError::Schema(format!(
            "unexpected columns: {}",
            unexpected.join(", ")
        )));
    }

    Ok(())
}

/// Extract named columns into a row-major matrix.
/// A null cell is a data error here, not a zero: by this point every value
/// has passed encoding and scaling, so a null means an upstream bug.
fn columns_to_array2(df: &DataFrame, col_names: &[String]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let n_cols = col_names.len();

    let col_data: Vec<Vec<f64>> = col_names
        .iter()
        .map(|col_name| {
            let series = df
                .column(col_name)
                .map_err(|_| HabitusError::Schema(format!("column '{}' not found", col_name)))?
                .as_materialized_series()
                .cast(&DataType::Float64)
                .map_err(|e| HabitusError::Data(e.to_string()))?;
            let ca = series
                .f64()
                .map_err(|e| HabitusError::Data(e.to_string()))?;
            ca.into_iter()
                .map(|v| {
                    v.ok_or_else(|| {
                        HabitusError::Data(format!("null value in column '{}'", col_name))
                    })
                })
                .collect::<Result<Vec<f64>>>()
        })
        .collect::<Result<Vec<Vec<f64>>>>()?;

    let col_refs: Vec<&[f64]> = col_data.iter().map(|c| c.as_slice()).collect();
    Ok(Array2::from_shape_fn((n_rows, n_cols), |(r, c)| {
        col_refs[c][r]
    }))
}

/// Everything produced by one training preparation pass.
#[derive(Debug, Clone)]
pub struct PreparedTraining {
    /// Fully transformed feature frame, columns in feature order.
    pub features: DataFrame,
    /// Row-major model matrix, one column per entry of `feature_order`.
    pub x: Array2<f64>,
    /// Encoded target codes as floats.
    pub y: Array1<f64>,
    pub encoder: CategoryEncoder,
    pub target_encoder: TargetEncoder,
    pub scaler: StandardScaler,
    /// Exact column order of `x`, frozen for serving.
    pub feature_order: Vec<String>,
}

/// Fits the full preprocessing chain on raw training data.
///
/// Transform order is fixed: derive BMI, split the target off, encode
/// categoricals, encode the target, then standardize the numeric columns.
/// The scaler is fitted over [`NUMERIC_COLUMNS`] only; the integer codes
/// produced by the categorical encoder are left unscaled.
#[derive(Debug, Clone)]
pub struct TrainingPreparer {
    target_column: String,
}

impl TrainingPreparer {
    pub fn new(target_column: impl Into<String>) -> Self {
        Self {
            target_column: target_column.into(),
        }
    }

    pub fn prepare(&self, df: &DataFrame) -> Result<PreparedTraining> {
        check_schema(df, Some(&self.target_column))?;
        if df.height() == 0 {
            return Err(HabitusError::Data("training data has no rows".to_string()));
        }

        let df = derive_bmi(df)?;

        let target_series = df
            .column(&self.target_column)
            .map_err(|_| {
                HabitusError::Schema(format!("target column '{}' not found", self.target_column))
            })?
            .as_materialized_series();
        let features = df
            .drop(&self.target_column)
            .map_err(|e| HabitusError::Data(e.to_string()))?;

        let mut encoder = CategoryEncoder::new();
        let features = encoder.fit_transform(&features, &CATEGORICAL_COLUMNS)?;

        let mut target_encoder = TargetEncoder::new();
        let codes = target_encoder.fit_transform(target_series)?;

        let mut scaler = StandardScaler::new();
        let features = scaler.fit_transform(&features, &NUMERIC_COLUMNS)?;

        let feature_order: Vec<String> = features
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect();

        let x = columns_to_array2(&features, &feature_order)?;
        let y = Array1::from_iter(codes.iter().map(|&c| c as f64));

        info!(
            rows = x.nrows(),
            features = feature_order.len(),
            classes = target_encoder.n_classes(),
            "prepared training data"
        );

        Ok(PreparedTraining {
            features,
            x,
            y,
            encoder,
            target_encoder,
            scaler,
            feature_order,
        })
    }
}

/// Replays fitted transforms on raw records at serve time.
///
/// Borrows the fitted pieces rather than owning them so a loaded artifact
/// bundle stays the single source of truth.
#[derive(Debug, Clone)]
pub struct InferencePreparer<'a> {
    encoder: &'a CategoryEncoder,
    scaler: &'a StandardScaler,
    feature_order: &'a [String],
}

impl<'a> InferencePreparer<'a> {
    pub fn new(
        encoder: &'a CategoryEncoder,
        scaler: &'a StandardScaler,
        feature_order: &'a [String],
    ) -> Self {
        Self {
            encoder,
            scaler,
            feature_order,
        }
    }

    /// Prepare a raw-schema frame into the model matrix.
    ///
    /// The final projection selects exactly the stored feature order, so the
    /// caller's column order never leaks into the matrix layout.
    pub fn prepare(&self, df: &DataFrame) -> Result<Array2<f64>> {
        check_schema(df, None)?;
        if df.height() == 0 {
            return Err(HabitusError::Data("input has no rows".to_string()));
        }

        let df = derive_bmi(df)?;
        let df = self.encoder.transform(&df)?;
        let df = self.scaler.transform(&df)?;

        let projected = df
            .select(self.feature_order.iter().map(|s| s.as_str()))
            .map_err(|e| {
                HabitusError::Schema(format!("cannot project stored feature order: {}", e))
            })?;

        let x = columns_to_array2(&projected, self.feature_order)?;
        debug!(rows = x.nrows(), features = x.ncols(), "prepared inference input");
        Ok(x)
    }

    /// Validate and prepare typed records.
    pub fn prepare_records(&self, records: &[SurveyRecord]) -> Result<Array2<f64>> {
        if records.is_empty() {
            return Err(HabitusError::Data("no records to prepare".to_string()));
        }
        for record in records {
            record.validate()?;
        }
        let df = SurveyRecord::to_dataframe(records)?;
        self.prepare(&df)
    }

    pub fn feature_order(&self) -> &[String] {
        self.feature_order
    }
}
