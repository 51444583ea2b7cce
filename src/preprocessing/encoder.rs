//! Categorical encoding for survey columns.

use crate::error::{HabitusError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Label encoder over a fixed set of string columns.
///
/// Each fitted column gets a sorted vocabulary of its distinct values; a
/// category's code is its index in that vocabulary. Sorting makes the codes a
/// function of the value set alone, not of row order, so refitting on a
/// shuffled copy of the data yields identical codes.
///
/// Transform is strict: a value outside the fitted vocabulary is an
/// [`HabitusError::UnknownCategory`], never a default code. Silently mapping
/// unseen categories would push a skewed feature into the model instead of
/// surfacing the data problem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryEncoder {
    // Maps column name -> sorted vocabulary; code = index in the vocabulary
    vocabularies: HashMap<String, Vec<String>>,
    // Fitted columns in fit order, for deterministic iteration
    columns: Vec<String>,
    is_fitted: bool,
}

impl Default for CategoryEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl CategoryEncoder {
    pub fn new() -> Self {
        Self {
            vocabularies: HashMap::new(),
            columns: Vec::new(),
            is_fitted: false,
        }
    }

    /// Fit one vocabulary per column.
    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        self.vocabularies.clear();
        self.columns.clear();

        for col_name in columns {
            let column = df.column(col_name).map_err(|_| {
                HabitusError::Schema(format!("categorical column '{}' not found", col_name))
            })?;
            let series = column.as_materialized_series();

            let vocabulary = Self::build_vocabulary(col_name, series)?;
            self.vocabularies.insert(col_name.to_string(), vocabulary);
            self.columns.push(col_name.to_string());
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Replace every fitted column with its integer codes.
    /// Builds all replacement columns first, then applies them in a single
    /// pass, same as the scaler.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(HabitusError::ModelNotFitted);
        }

        let mut replacements: Vec<Series> = Vec::with_capacity(self.columns.len());
        for col_name in &self.columns {
            let column = df.column(col_name).map_err(|_| {
                HabitusError::Schema(format!("categorical column '{}' not found", col_name))
            })?;
            let series = column.as_materialized_series();
            replacements.push(self.encode_series(col_name, series)?);
        }

        let mut result = df.clone();
        for encoded in replacements {
            result = result
                .with_column(encoded)
                .map_err(|e| HabitusError::Data(e.to_string()))?
                .clone();
        }

        Ok(result)
    }

    /// Fit and transform in one step.
    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[&str]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    /// Code for a single value of a fitted column.
    pub fn encode_value(&self, column: &str, value: &str) -> Result<i64> {
        let vocabulary = self
            .vocabularies
            .get(column)
            .ok_or_else(|| HabitusError::Schema(format!("column '{}' was not fitted", column)))?;
        match vocabulary.binary_search_by(|v| v.as_str().cmp(value)) {
            Ok(idx) => Ok(idx as i64),
            Err(_) => Err(HabitusError::UnknownCategory {
                column: column.to_string(),
                value: value.to_string(),
            }),
        }
    }

    /// Original value for a code of a fitted column.
    pub fn decode_value(&self, column: &str, code: i64) -> Result<&str> {
        let vocabulary = self
            .vocabularies
            .get(column)
            .ok_or_else(|| HabitusError::Schema(format!("column '{}' was not fitted", column)))?;
        vocabulary
            .get(code as usize)
            .map(|s| s.as_str())
            .ok_or_else(|| HabitusError::Data(format!("code {} out of range for '{}'", code, column)))
    }

    /// Fitted column names, in fit order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Sorted vocabulary of one fitted column.
    pub fn vocabulary(&self, column: &str) -> Option<&[String]> {
        self.vocabularies.get(column).map(|v| v.as_slice())
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    fn build_vocabulary(col_name: &str, series: &Series) -> Result<Vec<String>> {
        let ca = series
            .str()
            .map_err(|e| HabitusError::Data(e.to_string()))?;

        let mut vocabulary: Vec<String> = Vec::new();
        for val in ca.into_iter() {
            match val {
                Some(v) => {
                    if !vocabulary.iter().any(|existing| existing == v) {
                        vocabulary.push(v.to_string());
                    }
                }
                None => {
                    return Err(HabitusError::Data(format!(
                        "null value in categorical column '{}'",
                        col_name
                    )));
                }
            }
        }

        if vocabulary.is_empty() {
            return Err(HabitusError::Data(format!(
                "categorical column '{}' has no values",
                col_name
            )));
        }

        vocabulary.sort();
        Ok(vocabulary)
    }

    fn encode_series(&self, col_name: &str, series: &Series) -> Result<Series> {
        let ca = series
            .str()
            .map_err(|e| HabitusError::Data(e.to_string()))?;

        let mut values: Vec<i64> = Vec::with_capacity(ca.len());
        for val in ca.into_iter() {
            match val {
                Some(v) => values.push(self.encode_value(col_name, v)?),
                None => {
                    return Err(HabitusError::Data(format!(
                        "null value in categorical column '{}'",
                        col_name
                    )));
                }
            }
        }

        Ok(Series::new(col_name.into(), values))
    }
}
