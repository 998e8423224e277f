//! Rule-based majority baseline.
//!
//! Always predicts the most frequent training class. Exists so every
//! comparison table has a floor to beat.

use super::Classifier;
use crate::error::{LearningError, Result};
use ndarray::{Array2, ArrayView2};

#[derive(Debug, Clone, Default)]
pub struct MajorityClassifier {
    /// Training class frequencies, used as constant scores.
    frequencies: Vec<f64>,
}

impl MajorityClassifier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Classifier for MajorityClassifier {
    fn fit(&mut self, _x: ArrayView2<'_, f64>, y: &[usize], n_classes: usize) -> Result<()> {
        if y.is_empty() {
            return Err(LearningError::InvalidData(
                "cannot fit on an empty training set".to_string(),
            ));
        }
        let mut counts = vec![0usize; n_classes];
        for &label in y {
            counts[label] += 1;
        }
        let n = y.len() as f64;
        self.frequencies = counts.iter().map(|&c| c as f64 / n).collect();
        Ok(())
    }

    fn predict_scores(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        if self.frequencies.is_empty() {
            return Err(LearningError::InvalidData("model is not fitted".to_string()));
        }
        let k = self.frequencies.len();
        let mut scores = Array2::zeros((x.nrows(), k));
        for mut row in scores.rows_mut() {
            for (j, &freq) in self.frequencies.iter().enumerate() {
                row[j] = freq;
            }
        }
        Ok(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_predicts_majority_class() {
        let x = arr2(&[[0.0], [1.0], [2.0], [3.0]]);
        let mut model = MajorityClassifier::new();
        model.fit(x.view(), &[1, 1, 1, 0], 2).unwrap();
        assert_eq!(model.predict(x.view()).unwrap(), vec![1, 1, 1, 1]);

        let scores = model.predict_scores(x.view()).unwrap();
        assert!((scores[[0, 1]] - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_unfitted_errors() {
        let x = arr2(&[[0.0]]);
        assert!(MajorityClassifier::new().predict(x.view()).is_err());
    }
}
