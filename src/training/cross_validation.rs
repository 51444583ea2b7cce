//! Cross-validation splitting.

use crate::error::{HabitusError, Result};
use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single train/validation split
#[derive(Debug, Clone)]
pub struct CvSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Stratified k-fold splitter: every fold keeps (roughly) the class balance
/// of the full data.
///
/// Classes are grouped through a BTreeMap and shuffling is always seeded, so
/// the same target vector and seed produce the same folds on every run.
#[derive(Debug, Clone)]
pub struct StratifiedKFold {
    n_splits: usize,
    shuffle: bool,
    random_state: u64,
}

impl StratifiedKFold {
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            shuffle: true,
            random_state: 42,
        }
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Generate the train/validation splits from encoded class codes.
    pub fn split(&self, y: &Array1<f64>) -> Result<Vec<CvSplit>> {
        if self.n_splits < 2 {
            return Err(HabitusError::Training(
                "n_splits must be at least 2".to_string(),
            ));
        }

        let mut class_indices: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (idx, &val) in y.iter().enumerate() {
            class_indices.entry(val.round() as i64).or_default().push(idx);
        }

        if let Some((class, indices)) = class_indices.iter().min_by_key(|(_, v)| v.len()) {
            if indices.len() < self.n_splits {
                return Err(HabitusError::Training(format!(
                    "class {} has {} samples but n_splits is {}",
                    class,
                    indices.len(),
                    self.n_splits
                )));
            }
        } else {
            return Err(HabitusError::Training("no samples to split".to_string()));
        }

        if self.shuffle {
            let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
            for indices in class_indices.values_mut() {
                indices.shuffle(&mut rng);
            }
        }

        // Deal each class round-robin so folds stay balanced
        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); self.n_splits];
        for indices in class_indices.values() {
            for (i, &idx) in indices.iter().enumerate() {
                folds[i % self.n_splits].push(idx);
            }
        }

        let mut splits = Vec::with_capacity(self.n_splits);
        for fold_idx in 0..self.n_splits {
            let test_indices = folds[fold_idx].clone();
            let train_indices: Vec<usize> = folds
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != fold_idx)
                .flat_map(|(_, f)| f.iter().copied())
                .collect();

            splits.push(CvSplit {
                train_indices,
                test_indices,
                fold_idx,
            });
        }

        Ok(splits)
    }
}

/// Aggregated cross-validation scores
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CvSummary {
    /// Scores for each fold
    pub scores: Vec<f64>,
    /// Mean score across folds
    pub mean: f64,
    /// Standard deviation of scores
    pub std: f64,
    /// Number of folds
    pub n_folds: usize,
}

impl CvSummary {
    /// Aggregate fold scores.
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let n_folds = scores.len();
        if n_folds == 0 {
            return Self {
                scores,
                mean: 0.0,
                std: 0.0,
                n_folds: 0,
            };
        }

        let mean = scores.iter().sum::<f64>() / n_folds as f64;
        let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n_folds as f64;

        Self {
            std: variance.sqrt(),
            scores,
            mean,
            n_folds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn balanced_y() -> Array1<f64> {
        Array1::from_vec(vec![0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0])
    }

    #[test]
    fn test_folds_are_stratified() {
        let y = balanced_y();
        let splits = StratifiedKFold::new(5).split(&y).unwrap();

        assert_eq!(splits.len(), 5);
        for split in &splits {
            assert_eq!(split.test_indices.len(), 2);
            assert_eq!(split.train_indices.len(), 8);
            // One sample per class in each test fold
            let class_one = split.test_indices.iter().filter(|&&i| y[i] == 1.0).count();
            assert_eq!(class_one, 1);
        }

        let mut all_test: Vec<usize> = splits
            .iter()
            .flat_map(|s| s.test_indices.clone())
            .collect();
        all_test.sort_unstable();
        assert_eq!(all_test, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_same_seed_same_folds() {
        let y = balanced_y();
        let a = StratifiedKFold::new(5).with_random_state(9).split(&y).unwrap();
        let b = StratifiedKFold::new(5).with_random_state(9).split(&y).unwrap();

        for (sa, sb) in a.iter().zip(b.iter()) {
            assert_eq!(sa.test_indices, sb.test_indices);
            assert_eq!(sa.train_indices, sb.train_indices);
        }
    }

    #[test]
    fn test_too_small_class_is_an_error() {
        let y = Array1::from_vec(vec![0.0, 0.0, 0.0, 0.0, 1.0]);
        let err = StratifiedKFold::new(3).split(&y).unwrap_err();
        assert!(matches!(err, HabitusError::Training(ref msg) if msg.contains("class 1")));
    }

    #[test]
    fn test_single_split_is_an_error() {
        let y = balanced_y();
        assert!(StratifiedKFold::new(1).split(&y).is_err());
    }

    #[test]
    fn test_summary_statistics() {
        let summary = CvSummary::from_scores(vec![0.8, 0.9, 1.0]);
        assert!((summary.mean - 0.9).abs() < 1e-12);
        let expected_std = (2.0 / 300.0_f64).sqrt();
        assert!((summary.std - expected_std).abs() < 1e-12);
        assert_eq!(summary.n_folds, 3);
    }
}
