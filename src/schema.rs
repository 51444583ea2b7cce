//! Survey record schema and outcome classes.
//!
//! Field names follow the obesity-levels survey dataset (UCI "Estimation of
//! Obesity Levels" and its derivatives): demographic + lifestyle answers plus
//! a derived BMI column. The raw column names are kept verbatim so that CSV
//! headers, encoder keys, and the stored feature order all agree.

use crate::error::{HabitusError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of the target column in training data.
pub const TARGET_COLUMN: &str = "Obesity";

/// Name of the derived BMI column.
pub const BMI_COLUMN: &str = "BMI";

/// Raw survey columns, in dataset order. The target is not included.
pub const RAW_COLUMNS: [&str; 16] = [
    "Gender",
    "Age",
    "Height",
    "Weight",
    "family_history",
    "FAVC",
    "FCVC",
    "NCP",
    "CAEC",
    "SMOKE",
    "CH2O",
    "SCC",
    "FAF",
    "TUE",
    "CALC",
    "MTRANS",
];

/// String-valued survey columns, encoded at training time.
pub const CATEGORICAL_COLUMNS: [&str; 8] = [
    "Gender",
    "family_history",
    "FAVC",
    "CAEC",
    "SMOKE",
    "SCC",
    "CALC",
    "MTRANS",
];

/// Numeric survey columns (including derived BMI), standardized at training
/// time. Encoded categorical codes are deliberately NOT in this list: the
/// scaler statistics cover only the columns that were numeric in the raw data.
pub const NUMERIC_COLUMNS: [&str; 9] = [
    "Age", "Height", "Weight", "FCVC", "NCP", "CH2O", "FAF", "TUE", "BMI",
];

/// Physiological bounds accepted by [`SurveyRecord::validate`]. Values taken
/// from the survey instrument's input limits.
pub const AGE_RANGE: (f64, f64) = (10.0, 120.0);
pub const HEIGHT_RANGE: (f64, f64) = (1.2, 2.3);
pub const WEIGHT_RANGE: (f64, f64) = (30.0, 300.0);
pub const BMI_RANGE: (f64, f64) = (10.0, 80.0);

/// One raw survey answer set, as submitted for prediction or read from a
/// training row. BMI is never a field here: it is always derived from height
/// and weight so that training and serving cannot disagree on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyRecord {
    /// Gender: "Female" or "Male"
    #[serde(rename = "Gender")]
    pub gender: String,

    /// Age in years
    #[serde(rename = "Age")]
    pub age: f64,

    /// Height in meters
    #[serde(rename = "Height")]
    pub height: f64,

    /// Weight in kilograms
    #[serde(rename = "Weight")]
    pub weight: f64,

    /// Family history of overweight: "yes" or "no"
    #[serde(rename = "family_history")]
    pub family_history: String,

    /// Frequent consumption of high-caloric food: "yes" or "no"
    #[serde(rename = "FAVC")]
    pub favc: String,

    /// Frequency of vegetable consumption, 1-3 scale
    #[serde(rename = "FCVC")]
    pub fcvc: f64,

    /// Number of main meals per day, 1-4
    #[serde(rename = "NCP")]
    pub ncp: f64,

    /// Consumption of food between meals: no/Sometimes/Frequently/Always
    #[serde(rename = "CAEC")]
    pub caec: String,

    /// Smoker: "yes" or "no"
    #[serde(rename = "SMOKE")]
    pub smoke: String,

    /// Daily water intake, 1-3 scale
    #[serde(rename = "CH2O")]
    pub ch2o: f64,

    /// Monitors calorie intake: "yes" or "no"
    #[serde(rename = "SCC")]
    pub scc: String,

    /// Physical activity frequency, 0-3 scale
    #[serde(rename = "FAF")]
    pub faf: f64,

    /// Time using screens/devices, 0-2 scale
    #[serde(rename = "TUE")]
    pub tue: f64,

    /// Alcohol consumption: no/Sometimes/Frequently/Always
    #[serde(rename = "CALC")]
    pub calc: String,

    /// Usual transportation mode
    #[serde(rename = "MTRANS")]
    pub mtrans: String,
}

impl SurveyRecord {
    /// Check physiological bounds before any transformation is attempted.
    ///
    /// Height is checked first: a non-positive height would make the BMI
    /// derivation divide by zero and feed NaN into the scaler.
    pub fn validate(&self) -> Result<()> {
        if self.height <= 0.0 {
            return Err(HabitusError::Range {
                field: "Height".to_string(),
                value: self.height,
                reason: "height must be positive".to_string(),
            });
        }
        Self::check_range("Height", self.height, HEIGHT_RANGE)?;
        Self::check_range("Weight", self.weight, WEIGHT_RANGE)?;
        Self::check_range("Age", self.age, AGE_RANGE)?;
        Self::check_range(BMI_COLUMN, self.bmi()?, BMI_RANGE)?;
        Ok(())
    }

    fn check_range(field: &str, value: f64, (lo, hi): (f64, f64)) -> Result<()> {
        if !(lo..=hi).contains(&value) {
            return Err(HabitusError::Range {
                field: field.to_string(),
                value,
                reason: format!("expected {} to {}", lo, hi),
            });
        }
        Ok(())
    }

    /// Body Mass Index: weight(kg) / height(m)².
    pub fn bmi(&self) -> Result<f64> {
        if self.height <= 0.0 {
            return Err(HabitusError::Range {
                field: "Height".to_string(),
                value: self.height,
                reason: "height must be positive".to_string(),
            });
        }
        Ok(self.weight / (self.height * self.height))
    }

    /// Build a raw-schema DataFrame from a batch of records (no BMI column;
    /// the preparers derive it).
    pub fn to_dataframe(records: &[SurveyRecord]) -> Result<DataFrame> {
        let df = df!(
            "Gender" => records.iter().map(|r| r.gender.clone()).collect::<Vec<_>>(),
            "Age" => records.iter().map(|r| r.age).collect::<Vec<_>>(),
            "Height" => records.iter().map(|r| r.height).collect::<Vec<_>>(),
            "Weight" => records.iter().map(|r| r.weight).collect::<Vec<_>>(),
            "family_history" => records.iter().map(|r| r.family_history.clone()).collect::<Vec<_>>(),
            "FAVC" => records.iter().map(|r| r.favc.clone()).collect::<Vec<_>>(),
            "FCVC" => records.iter().map(|r| r.fcvc).collect::<Vec<_>>(),
            "NCP" => records.iter().map(|r| r.ncp).collect::<Vec<_>>(),
            "CAEC" => records.iter().map(|r| r.caec.clone()).collect::<Vec<_>>(),
            "SMOKE" => records.iter().map(|r| r.smoke.clone()).collect::<Vec<_>>(),
            "CH2O" => records.iter().map(|r| r.ch2o).collect::<Vec<_>>(),
            "SCC" => records.iter().map(|r| r.scc.clone()).collect::<Vec<_>>(),
            "FAF" => records.iter().map(|r| r.faf).collect::<Vec<_>>(),
            "TUE" => records.iter().map(|r| r.tue).collect::<Vec<_>>(),
            "CALC" => records.iter().map(|r| r.calc.clone()).collect::<Vec<_>>(),
            "MTRANS" => records.iter().map(|r| r.mtrans.clone()).collect::<Vec<_>>(),
        )?;
        Ok(df)
    }
}

/// The seven outcome classes, declared in canonical severity order
/// (lowest to highest). The target encoder assigns codes alphabetically,
/// which is a different order: anything that ranks or displays classes by
/// severity must go through [`ObesityClass::CANONICAL_ORDER`], never through
/// the encoded integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObesityClass {
    #[serde(rename = "Insufficient_Weight")]
    InsufficientWeight,
    #[serde(rename = "Normal_Weight")]
    NormalWeight,
    #[serde(rename = "Overweight_Level_I")]
    OverweightLevelI,
    #[serde(rename = "Overweight_Level_II")]
    OverweightLevelII,
    #[serde(rename = "Obesity_Type_I")]
    ObesityTypeI,
    #[serde(rename = "Obesity_Type_II")]
    ObesityTypeII,
    #[serde(rename = "Obesity_Type_III")]
    ObesityTypeIII,
}

impl ObesityClass {
    /// All classes, lowest severity first.
    pub const CANONICAL_ORDER: [ObesityClass; 7] = [
        ObesityClass::InsufficientWeight,
        ObesityClass::NormalWeight,
        ObesityClass::OverweightLevelI,
        ObesityClass::OverweightLevelII,
        ObesityClass::ObesityTypeI,
        ObesityClass::ObesityTypeII,
        ObesityClass::ObesityTypeIII,
    ];

    /// The raw label as it appears in the dataset target column.
    pub fn as_label(&self) -> &'static str {
        match self {
            ObesityClass::InsufficientWeight => "Insufficient_Weight",
            ObesityClass::NormalWeight => "Normal_Weight",
            ObesityClass::OverweightLevelI => "Overweight_Level_I",
            ObesityClass::OverweightLevelII => "Overweight_Level_II",
            ObesityClass::ObesityTypeI => "Obesity_Type_I",
            ObesityClass::ObesityTypeII => "Obesity_Type_II",
            ObesityClass::ObesityTypeIII => "Obesity_Type_III",
        }
    }

    /// Parse a raw dataset label.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::CANONICAL_ORDER
            .iter()
            .copied()
            .find(|c| c.as_label() == label)
    }

    /// Rank in the canonical severity order, 0 (insufficient weight) to
    /// 6 (obesity type III).
    pub fn severity_rank(&self) -> usize {
        Self::CANONICAL_ORDER
            .iter()
            .position(|c| c == self)
            .unwrap_or(0)
    }
}

impl fmt::Display for ObesityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}
