//! Gaussian naive Bayes.

use super::Classifier;
use crate::error::{LearningError, Result};
use ndarray::{Array2, ArrayView2};

/// Variance smoothing factor, relative to the largest feature variance.
const VAR_SMOOTHING: f64 = 1e-9;

#[derive(Debug, Clone, Default)]
pub struct GaussianNbClassifier {
    /// Per class: (log prior, per-feature mean, per-feature variance).
    classes: Vec<(f64, Vec<f64>, Vec<f64>)>,
}

impl GaussianNbClassifier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Classifier for GaussianNbClassifier {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: &[usize], n_classes: usize) -> Result<()> {
        let (n, d) = (x.nrows(), x.ncols());
        if n == 0 || d == 0 {
            return Err(LearningError::InvalidData(
                "empty feature matrix".to_string(),
            ));
        }

        // Global variance scale for smoothing, so constant features do not
        // produce zero variances and infinite likelihoods.
        let mut max_var = 0.0f64;
        for col in x.columns() {
            let mean = col.sum() / n as f64;
            let var = col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
            max_var = max_var.max(var);
        }
        let smoothing = VAR_SMOOTHING * max_var.max(1.0);

        let mut classes = Vec::with_capacity(n_classes);
        for class in 0..n_classes {
            let indices: Vec<usize> = y
                .iter()
                .enumerate()
                .filter(|(_, &label)| label == class)
                .map(|(i, _)| i)
                .collect();
            if indices.is_empty() {
                classes.push((f64::NEG_INFINITY, vec![0.0; d], vec![smoothing; d]));
                continue;
            }
            let count = indices.len() as f64;
            let mut means = vec![0.0; d];
            let mut vars = vec![0.0; d];
            for &i in &indices {
                for j in 0..d {
                    means[j] += x[[i, j]];
                }
            }
            for mean in &mut means {
                *mean /= count;
            }
            for &i in &indices {
                for j in 0..d {
                    vars[j] += (x[[i, j]] - means[j]).powi(2);
                }
            }
            for var in &mut vars {
                *var = *var / count + smoothing;
            }
            classes.push(((count / n as f64).ln(), means, vars));
        }
        self.classes = classes;
        Ok(())
    }

    fn predict_scores(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        if self.classes.is_empty() {
            return Err(LearningError::InvalidData("model is not fitted".to_string()));
        }
        let k = self.classes.len();
        let mut scores = Array2::zeros((x.nrows(), k));

        for (i, row) in x.rows().into_iter().enumerate() {
            let mut log_joint = vec![0.0; k];
            for (c, (log_prior, means, vars)) in self.classes.iter().enumerate() {
                let mut ll = *log_prior;
                for (j, value) in row.iter().enumerate() {
                    let var = vars[j];
                    ll += -0.5 * ((2.0 * std::f64::consts::PI * var).ln())
                        - (value - means[j]).powi(2) / (2.0 * var);
                }
                log_joint[c] = ll;
            }
            // Normalize to posteriors via log-sum-exp.
            let max = log_joint.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let mut total = 0.0;
            for value in &mut log_joint {
                *value = (*value - max).exp();
                total += *value;
            }
            for (c, value) in log_joint.into_iter().enumerate() {
                scores[[i, c]] = if total > 0.0 { value / total } else { 0.0 };
            }
        }
        Ok(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::{blobs, three_blobs};

    #[test]
    fn test_classifies_blobs() {
        let (x, y) = blobs();
        let mut model = GaussianNbClassifier::new();
        model.fit(x.view(), &y, 2).unwrap();
        assert_eq!(model.predict(x.view()).unwrap(), y);
    }

    #[test]
    fn test_multiclass_posteriors_sum_to_one() {
        let (x, y) = three_blobs();
        let mut model = GaussianNbClassifier::new();
        model.fit(x.view(), &y, 3).unwrap();
        let scores = model.predict_scores(x.view()).unwrap();
        for row in scores.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_constant_feature_does_not_blow_up() {
        let x = ndarray::arr2(&[[1.0, 0.0], [1.0, 1.0], [1.0, 10.0], [1.0, 11.0]]);
        let y = vec![0, 0, 1, 1];
        let mut model = GaussianNbClassifier::new();
        model.fit(x.view(), &y, 2).unwrap();
        let predictions = model.predict(x.view()).unwrap();
        assert_eq!(predictions, y);
    }
}
