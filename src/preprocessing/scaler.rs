//! Standardization of numeric survey columns.

use crate::error::{HabitusError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Fit-time statistics for one column.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ColumnStats {
    pub mean: f64,
    /// Population standard deviation (zero degrees of freedom).
    pub std: f64,
}

/// Z-score scaler: (x - mean) / std, with statistics frozen at fit time.
///
/// A zero-variance column is an [`HabitusError::ZeroVariance`] at fit time,
/// not a silently substituted scale of 1.0: a constant column carries no
/// signal and standardizing it would hide a data defect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    stats: HashMap<String, ColumnStats>,
    // Fitted columns in fit order, for deterministic iteration
    columns: Vec<String>,
    is_fitted: bool,
}

impl Default for StandardScaler {
    fn default() -> Self {
        Self::new()
    }
}

impl StandardScaler {
    pub fn new() -> Self {
        Self {
            stats: HashMap::new(),
            columns: Vec::new(),
            is_fitted: false,
        }
    }

    /// Compute mean and population std for each column.
    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        self.stats.clear();
        self.columns.clear();

        for col_name in columns {
            let column = df.column(col_name).map_err(|_| {
                HabitusError::Schema(format!("numeric column '{}' not found", col_name))
            })?;
            let series = column
                .as_materialized_series()
                .cast(&DataType::Float64)
                .map_err(|e| HabitusError::Data(e.to_string()))?;

            let stats = Self::compute_stats(col_name, &series)?;
            self.stats.insert(col_name.to_string(), stats);
            self.columns.push(col_name.to_string());
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Standardize every fitted column.
    /// Builds all replacement columns first, then applies them in a single
    /// pass (avoids N DataFrame clones for N columns).
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(HabitusError::ModelNotFitted);
        }

        let mut replacements: Vec<Series> = Vec::with_capacity(self.columns.len());
        for col_name in &self.columns {
            let column = df.column(col_name).map_err(|_| {
                HabitusError::Schema(format!("numeric column '{}' not found", col_name))
            })?;
            let series = column.as_materialized_series();
            let stats = &self.stats[col_name.as_str()];
            replacements.push(Self::scale_series(col_name, series, stats)?);
        }

        let mut result = df.clone();
        for scaled in replacements {
            result = result
                .with_column(scaled)
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

    /// Fitted column names, in fit order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Statistics for one fitted column.
    pub fn stats_for(&self, column: &str) -> Option<ColumnStats> {
        self.stats.get(column).copied()
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    fn compute_stats(col_name: &str, series: &Series) -> Result<ColumnStats> {
        let ca = series
            .f64()
            .map_err(|e| HabitusError::Data(e.to_string()))?;

        if ca.null_count() > 0 {
            return Err(HabitusError::Data(format!(
                "null value in numeric column '{}'",
                col_name
            )));
        }

        let mean = ca
            .mean()
            .ok_or_else(|| HabitusError::Data(format!("column '{}' has no values", col_name)))?;
        let std = ca
            .std(0)
            .ok_or_else(|| HabitusError::Data(format!("column '{}' has no values", col_name)))?;

        if std == 0.0 {
            return Err(HabitusError::ZeroVariance(col_name.to_string()));
        }

        Ok(ColumnStats { mean, std })
    }

    fn scale_series(col_name: &str, series: &Series, stats: &ColumnStats) -> Result<Series> {
        let cast = series
            .cast(&DataType::Float64)
            .map_err(|e| HabitusError::Data(e.to_string()))?;
        let ca = cast
            .f64()
            .map_err(|e| HabitusError::Data(e.to_string()))?;

        if ca.null_count() > 0 {
            return Err(HabitusError::Data(format!(
                "null value in numeric column '{}'",
                col_name
            )));
        }

        let scaled: Float64Chunked = ca
            .into_iter()
            .map(|opt| opt.map(|v| (v - stats.mean) / stats.std))
            .collect();

        Ok(scaled.with_name(series.name().clone()).into_series())
    }
}
