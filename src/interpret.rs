//! Human-readable interpretation of predicted classes.
//!
//! Maps each outcome class to a severity bucket, general guidance, and
//! personalized recommendations derived from the survey answers. Display
//! ordering always follows [`ObesityClass::CANONICAL_ORDER`].

use crate::schema::{ObesityClass, SurveyRecord};
use serde::{Deserialize, Serialize};

/// Severity bucket for an outcome class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Normal,
    Medium,
    MediumHigh,
    High,
    VeryHigh,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Normal => "normal",
            Severity::Medium => "medium",
            Severity::MediumHigh => "medium-high",
            Severity::High => "high",
            Severity::VeryHigh => "very-high",
            Severity::Critical => "critical",
        }
    }
}

/// Static description of one outcome class.
#[derive(Debug, Clone)]
pub struct ClassInfo {
    pub class: ObesityClass,
    /// Short display label, e.g. "Obesity Type I".
    pub label: &'static str,
    pub severity: Severity,
    /// General advice shown for every prediction of this class.
    pub advice: &'static [&'static str],
}

static CLASS_TABLE: [ClassInfo; 7] = [
    ClassInfo {
        class: ObesityClass::InsufficientWeight,
        label: "Insufficient Weight",
        severity: Severity::Low,
        advice: &[
            "Increase caloric intake with nutrient-dense foods",
            "Add strength training to build muscle mass",
            "Eat regular meals and avoid skipping breakfast",
        ],
    },
    ClassInfo {
        class: ObesityClass::NormalWeight,
        label: "Normal Weight",
        severity: Severity::Normal,
        advice: &[
            "Maintain your current balanced eating habits",
            "Keep a regular physical activity routine",
            "Monitor weight occasionally to catch changes early",
        ],
    },
    ClassInfo {
        class: ObesityClass::OverweightLevelI,
        label: "Overweight Level I",
        severity: Severity::Medium,
        advice: &[
            "Reduce portion sizes gradually",
            "Increase weekly physical activity",
            "Limit sugary drinks and processed snacks",
        ],
    },
    ClassInfo {
        class: ObesityClass::OverweightLevelII,
        label: "Overweight Level II",
        severity: Severity::MediumHigh,
        advice: &[
            "Adopt a structured meal plan with controlled portions",
            "Aim for at least 150 minutes of exercise per week",
            "Track food intake to identify problem patterns",
        ],
    },
    ClassInfo {
        class: ObesityClass::ObesityTypeI,
        label: "Obesity Type I",
        severity: Severity::High,
        advice: &[
            "Follow a supervised calorie-reduction plan",
            "Combine aerobic exercise with strength work",
            "Schedule regular health checkups",
        ],
    },
    ClassInfo {
        class: ObesityClass::ObesityTypeII,
        label: "Obesity Type II",
        severity: Severity::VeryHigh,
        advice: &[
            "Work with a healthcare team on a weight-loss program",
            "Screen for blood pressure, glucose, and lipid issues",
            "Start with low-impact activity such as walking or swimming",
        ],
    },
    ClassInfo {
        class: ObesityClass::ObesityTypeIII,
        label: "Obesity Type III",
        severity: Severity::Critical,
        advice: &[
            "Seek immediate medical evaluation",
            "Discuss all treatment options with a specialist",
            "Begin supervised, gradual lifestyle changes",
        ],
    },
];

/// Interpretation tables for predictions: class descriptions, BMI category
/// cut points, and personalized recommendation rules.
///
/// Kept as a value rather than free functions so a caller can hold it next
/// to a loaded artifact bundle and treat the pair as one serving unit.
#[derive(Debug, Clone)]
pub struct Interpretation {
    /// BMI thresholds between categories, ascending.
    bmi_cuts: [f64; 5],
}

impl Default for Interpretation {
    fn default() -> Self {
        Self {
            bmi_cuts: [18.5, 25.0, 30.0, 35.0, 40.0],
        }
    }
}

impl Interpretation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full description of one class.
    pub fn info(&self, class: ObesityClass) -> &'static ClassInfo {
        // CLASS_TABLE is declared in canonical order.
        &CLASS_TABLE[class.severity_rank()]
    }

    /// Short display label for a class.
    pub fn label(&self, class: ObesityClass) -> &'static str {
        self.info(class).label
    }

    /// Severity bucket for a class.
    pub fn severity(&self, class: ObesityClass) -> Severity {
        self.info(class).severity
    }

    /// WHO-style BMI category name.
    pub fn bmi_category(&self, bmi: f64) -> &'static str {
        let [under, normal, over, class1, class2] = self.bmi_cuts;
        if bmi < under {
            "Underweight"
        } else if bmi < normal {
            "Normal weight"
        } else if bmi < over {
            "Overweight"
        } else if bmi < class1 {
            "Obesity class I"
        } else if bmi < class2 {
            "Obesity class II"
        } else {
            "Obesity class III (morbid)"
        }
    }

    /// Personalized recommendations for one prediction: survey-driven rules
    /// first, then class-specific guidance at the front/back where the class
    /// warrants escalation.
    pub fn recommendations(&self, record: &SurveyRecord, class: ObesityClass) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();

        if record.faf == 0.0 {
            out.push("Start with light walks of 20-30 minutes, 3 times per week".to_string());
        } else if record.faf < 2.0 {
            out.push("Increase physical activity to 3-4 days per week".to_string());
        } else {
            out.push("Keep up your current physical activity level".to_string());
        }

        if record.favc.eq_ignore_ascii_case("yes") {
            out.push("Reduce high-caloric food consumption".to_string());
        } else {
            out.push("Keep avoiding high-caloric food".to_string());
        }

        if record.fcvc <= 1.0 {
            out.push("Include vegetables in at least 2 meals per day".to_string());
        } else if record.fcvc <= 2.0 {
            out.push("Add vegetables to all main meals".to_string());
        } else {
            out.push("Vegetable intake is adequate, keep the variety".to_string());
        }

        if record.ch2o <= 1.0 {
            out.push("Drink at least 2 liters of water per day".to_string());
        } else if record.ch2o <= 2.0 {
            out.push("Aim for 2-3 liters of water per day".to_string());
        }

        if record.family_history.eq_ignore_ascii_case("yes") {
            out.push("Schedule preventive checkups given your family history".to_string());
        }

        match record.calc.as_str() {
            "Frequently" | "Always" => {
                out.push("Cut alcohol back to special occasions only".to_string());
            }
            "Sometimes" => {
                out.push("Keep alcohol consumption moderate and monitored".to_string());
            }
            _ => {}
        }

        if record.tue >= 2.0 {
            out.push("Reduce recreational screen time".to_string());
        }

        match record.mtrans.as_str() {
            "Automobile" | "Motorbike" => {
                out.push("Swap short trips for walking or cycling".to_string());
            }
            "Public_Transportation" => {
                out.push("Keep the walking built into your commute".to_string());
            }
            _ => {}
        }

        match class {
            ObesityClass::ObesityTypeII | ObesityClass::ObesityTypeIII => {
                out.insert(0, "Seek specialized medical care promptly".to_string());
                out.push("Consider a multidisciplinary follow-up program".to_string());
            }
            ObesityClass::ObesityTypeI => {
                out.insert(0, "Consult a healthcare professional".to_string());
                out.push("Monitor weight and BMI monthly".to_string());
            }
            ObesityClass::OverweightLevelI | ObesityClass::OverweightLevelII => {
                out.push("Consider guidance from a nutritionist".to_string());
            }
            ObesityClass::InsufficientWeight => {
                out.insert(0, "Consult a doctor about your low weight".to_string());
            }
            ObesityClass::NormalWeight => {}
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> SurveyRecord {
        SurveyRecord {
            gender: "Male".to_string(),
            age: 30.0,
            height: 1.75,
            weight: 80.0,
            family_history: "yes".to_string(),
            favc: "yes".to_string(),
            fcvc: 2.0,
            ncp: 3.0,
            caec: "Sometimes".to_string(),
            smoke: "no".to_string(),
            ch2o: 2.0,
            scc: "no".to_string(),
            faf: 1.0,
            tue: 1.0,
            calc: "Sometimes".to_string(),
            mtrans: "Public_Transportation".to_string(),
        }
    }

    #[test]
    fn test_class_table_is_canonical() {
        let interp = Interpretation::new();
        for (i, class) in ObesityClass::CANONICAL_ORDER.iter().enumerate() {
            assert_eq!(interp.info(*class).class, *class, "slot {}", i);
        }
        assert_eq!(
            interp.severity(ObesityClass::ObesityTypeIII),
            Severity::Critical
        );
        assert_eq!(interp.severity(ObesityClass::NormalWeight), Severity::Normal);
    }

    #[test]
    fn test_bmi_categories() {
        let interp = Interpretation::new();
        assert_eq!(interp.bmi_category(17.0), "Underweight");
        assert_eq!(interp.bmi_category(18.5), "Normal weight");
        assert_eq!(interp.bmi_category(26.1), "Overweight");
        assert_eq!(interp.bmi_category(32.0), "Obesity class I");
        assert_eq!(interp.bmi_category(37.5), "Obesity class II");
        assert_eq!(interp.bmi_category(45.0), "Obesity class III (morbid)");
    }

    #[test]
    fn test_recommendations_follow_survey_answers() {
        let interp = Interpretation::new();
        let mut r = record();
        r.faf = 0.0;
        let recs = interp.recommendations(&r, ObesityClass::NormalWeight);
        assert!(recs.iter().any(|s| s.contains("light walks")));
        assert!(recs.iter().any(|s| s.contains("Reduce high-caloric")));
        assert!(recs.iter().any(|s| s.contains("family history")));
    }

    #[test]
    fn test_recommendations_escalate_for_severe_classes() {
        let interp = Interpretation::new();
        let recs = interp.recommendations(&record(), ObesityClass::ObesityTypeIII);
        assert!(recs[0].contains("specialized medical care"));
        assert!(recs.last().unwrap().contains("multidisciplinary"));

        let recs = interp.recommendations(&record(), ObesityClass::InsufficientWeight);
        assert!(recs[0].contains("low weight"));
    }
}
