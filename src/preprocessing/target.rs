//! Target label encoding.

use crate::error::{HabitusError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Label encoder for the target column.
///
/// Classes are sorted, so code assignment depends only on the set of labels
/// present in the training data. Note that sorted order is NOT severity
/// order for the obesity labels ("Overweight_Level_I" sorts after
/// "Obesity_Type_III"); consumers that need severity ordering must map codes
/// back to labels and rank via the canonical class list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetEncoder {
    classes: Vec<String>,
    is_fitted: bool,
}

impl Default for TargetEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl TargetEncoder {
    pub fn new() -> Self {
        Self {
            classes: Vec::new(),
            is_fitted: false,
        }
    }

    /// Collect and sort the distinct labels.
    pub fn fit(&mut self, series: &Series) -> Result<&mut Self> {
        let ca = series
            .str()
            .map_err(|e| HabitusError::Data(e.to_string()))?;

        let mut classes: Vec<String> = Vec::new();
        for val in ca.into_iter() {
            match val {
                Some(v) => {
                    if !classes.iter().any(|c| c == v) {
                        classes.push(v.to_string());
                    }
                }
                None => {
                    return Err(HabitusError::Data(format!(
                        "null value in target column '{}'",
                        series.name()
                    )));
                }
            }
        }

        if classes.is_empty() {
            return Err(HabitusError::Data(format!(
                "target column '{}' has no values",
                series.name()
            )));
        }

        classes.sort();
        self.classes = classes;
        self.is_fitted = true;
        Ok(self)
    }

    /// Encode every label to its class code.
    pub fn transform(&self, series: &Series) -> Result<Vec<u32>> {
        if !self.is_fitted {
            return Err(HabitusError::ModelNotFitted);
        }

        let ca = series
            .str()
            .map_err(|e| HabitusError::Data(e.to_string()))?;

        let mut codes: Vec<u32> = Vec::with_capacity(ca.len());
        for val in ca.into_iter() {
            match val {
                Some(v) => codes.push(self.encode(v)?),
                None => {
                    return Err(HabitusError::Data(format!(
                        "null value in target column '{}'",
                        series.name()
                    )));
                }
            }
        }
        Ok(codes)
    }

    /// Fit and transform in one step.
    pub fn fit_transform(&mut self, series: &Series) -> Result<Vec<u32>> {
        self.fit(series)?;
        self.transform(series)
    }

    /// Code for one label.
    pub fn encode(&self, label: &str) -> Result<u32> {
        match self.classes.binary_search_by(|c| c.as_str().cmp(label)) {
            Ok(idx) => Ok(idx as u32),
            Err(_) => Err(HabitusError::UnknownCategory {
                column: "target".to_string(),
                value: label.to_string(),
            }),
        }
    }

    /// Label for one code.
    pub fn decode(&self, code: u32) -> Result<&str> {
        self.classes
            .get(code as usize)
            .map(|s| s.as_str())
            .ok_or_else(|| HabitusError::Data(format!("target code {} out of range", code)))
    }

    /// Fitted class labels, sorted.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_obesity_labels_sort_out_of_severity_order() {
        let series = Series::new(
            "Obesity".into(),
            &[
                "Normal_Weight",
                "Obesity_Type_III",
                "Insufficient_Weight",
                "Overweight_Level_I",
                "Obesity_Type_I",
                "Overweight_Level_II",
                "Obesity_Type_II",
            ],
        );

        let mut encoder = TargetEncoder::new();
        encoder.fit(&series).unwrap();

        // Sorted order interleaves the obesity and overweight labels
        assert_eq!(encoder.encode("Insufficient_Weight").unwrap(), 0);
        assert_eq!(encoder.encode("Normal_Weight").unwrap(), 1);
        assert_eq!(encoder.encode("Obesity_Type_I").unwrap(), 2);
        assert_eq!(encoder.encode("Obesity_Type_II").unwrap(), 3);
        assert_eq!(encoder.encode("Obesity_Type_III").unwrap(), 4);
        assert_eq!(encoder.encode("Overweight_Level_I").unwrap(), 5);
        assert_eq!(encoder.encode("Overweight_Level_II").unwrap(), 6);
    }

    #[test]
    fn test_round_trip() {
        let series = Series::new("y".into(), &["b", "a", "c", "a"]);
        let mut encoder = TargetEncoder::new();
        let codes = encoder.fit_transform(&series).unwrap();
        assert_eq!(codes, vec![1, 0, 2, 0]);
        assert_eq!(encoder.decode(2).unwrap(), "c");
        assert_eq!(encoder.n_classes(), 3);
    }

    #[test]
    fn test_unknown_label_is_an_error() {
        let series = Series::new("y".into(), &["a", "b"]);
        let mut encoder = TargetEncoder::new();
        encoder.fit(&series).unwrap();
        assert!(matches!(
            encoder.encode("z").unwrap_err(),
            HabitusError::UnknownCategory { .. }
        ));
    }
}
