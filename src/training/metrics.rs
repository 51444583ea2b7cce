//! Classification metrics.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Precision, recall, and F1 for one class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassReport {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Number of true samples of this class in the evaluation set.
    pub support: usize,
}

/// Holdout metrics for a fitted classifier.
///
/// Weighted averages weigh each class by its support, and an undefined ratio
/// (class never predicted, or absent from the evaluation set) scores 0.0
/// rather than poisoning the averages with NaN.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub accuracy: f64,
    pub precision_weighted: f64,
    pub recall_weighted: f64,
    pub f1_weighted: f64,
    pub per_class: Vec<ClassReport>,
    /// confusion[i][j] counts samples of true class i predicted as class j,
    /// rows and columns in class-label order.
    pub confusion: Vec<Vec<usize>>,
    /// Training time in seconds
    pub training_time_secs: f64,
    /// Number of features
    pub n_features: usize,
    /// Number of training samples
    pub n_samples: usize,
}

impl Default for ModelMetrics {
    fn default() -> Self {
        Self {
            accuracy: 0.0,
            precision_weighted: 0.0,
            recall_weighted: 0.0,
            f1_weighted: 0.0,
            per_class: Vec::new(),
            confusion: Vec::new(),
            training_time_secs: 0.0,
            n_features: 0,
            n_samples: 0,
        }
    }
}

impl ModelMetrics {
    /// Compute multiclass metrics from encoded codes. `class_labels[i]` names
    /// the class with code `i`.
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>, class_labels: &[String]) -> Self {
        let n = y_true.len();
        let n_classes = class_labels.len();

        let mut metrics = Self {
            n_samples: n,
            ..Self::default()
        };
        if n == 0 || n_classes == 0 {
            return metrics;
        }

        let mut confusion = vec![vec![0usize; n_classes]; n_classes];
        let mut correct = 0usize;
        for (t, p) in y_true.iter().zip(y_pred.iter()) {
            let ti = t.round() as usize;
            let pi = p.round() as usize;
            if ti < n_classes && pi < n_classes {
                confusion[ti][pi] += 1;
            }
            if (t - p).abs() < 0.5 {
                correct += 1;
            }
        }
        metrics.accuracy = correct as f64 / n as f64;

        let mut per_class = Vec::with_capacity(n_classes);
        let mut weighted_p = 0.0;
        let mut weighted_r = 0.0;
        let mut weighted_f1 = 0.0;
        let mut total_support = 0usize;

        for (c, label) in class_labels.iter().enumerate() {
            let tp = confusion[c][c];
            let fp: usize = (0..n_classes).filter(|&r| r != c).map(|r| confusion[r][c]).sum();
            let fn_: usize = (0..n_classes).filter(|&p| p != c).map(|p| confusion[c][p]).sum();
            let support = tp + fn_;

            let precision = if tp + fp > 0 {
                tp as f64 / (tp + fp) as f64
            } else {
                0.0
            };
            let recall = if support > 0 {
                tp as f64 / support as f64
            } else {
                0.0
            };
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };

            weighted_p += precision * support as f64;
            weighted_r += recall * support as f64;
            weighted_f1 += f1 * support as f64;
            total_support += support;

            per_class.push(ClassReport {
                label: label.clone(),
                precision,
                recall,
                f1,
                support,
            });
        }

        if total_support > 0 {
            metrics.precision_weighted = weighted_p / total_support as f64;
            metrics.recall_weighted = weighted_r / total_support as f64;
            metrics.f1_weighted = weighted_f1 / total_support as f64;
        }
        metrics.per_class = per_class;
        metrics.confusion = confusion;

        metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_hand_computed_multiclass() {
        let y_true = array![0.0, 0.0, 1.0, 1.0, 2.0, 2.0];
        let y_pred = array![0.0, 1.0, 1.0, 1.0, 2.0, 0.0];
        let metrics = ModelMetrics::compute(&y_true, &y_pred, &labels(&["a", "b", "c"]));

        assert!((metrics.accuracy - 4.0 / 6.0).abs() < 1e-12);

        let a = &metrics.per_class[0];
        assert!((a.precision - 0.5).abs() < 1e-12);
        assert!((a.recall - 0.5).abs() < 1e-12);
        assert_eq!(a.support, 2);

        let b = &metrics.per_class[1];
        assert!((b.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((b.recall - 1.0).abs() < 1e-12);
        assert!((b.f1 - 0.8).abs() < 1e-12);

        let c = &metrics.per_class[2];
        assert!((c.precision - 1.0).abs() < 1e-12);
        assert!((c.recall - 0.5).abs() < 1e-12);

        assert!((metrics.recall_weighted - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(
            metrics.confusion,
            vec![vec![1, 1, 0], vec![0, 2, 0], vec![1, 0, 1]]
        );
    }

    #[test]
    fn test_perfect_predictions() {
        let y = array![0.0, 1.0, 2.0, 1.0];
        let metrics = ModelMetrics::compute(&y, &y, &labels(&["a", "b", "c"]));
        assert!((metrics.accuracy - 1.0).abs() < 1e-12);
        assert!((metrics.f1_weighted - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_never_predicted_class_scores_zero() {
        let y_true = array![0.0, 1.0, 1.0];
        let y_pred = array![1.0, 1.0, 1.0];
        let metrics = ModelMetrics::compute(&y_true, &y_pred, &labels(&["a", "b"]));

        let a = &metrics.per_class[0];
        assert_eq!(a.precision, 0.0);
        assert_eq!(a.recall, 0.0);
        assert_eq!(a.f1, 0.0);
        assert!(metrics.precision_weighted.is_finite());
    }

    #[test]
    fn test_empty_input() {
        let empty = Array1::<f64>::zeros(0);
        let metrics = ModelMetrics::compute(&empty, &empty, &labels(&["a"]));
        assert_eq!(metrics.accuracy, 0.0);
        assert_eq!(metrics.n_samples, 0);
    }
}
