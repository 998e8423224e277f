//! Multinomial logistic regression.
//!
//! Softmax regression trained with full-batch gradient descent and L2
//! regularization (strength `1/C`). Expects scaled features, which is what
//! the preprocessing transform produces.

use super::{class_weights, Classifier};
use crate::error::{LearningError, Result};
use ndarray::{Array1, Array2, ArrayView2, Axis};

const LEARNING_RATE: f64 = 0.1;
const MAX_ITER: usize = 300;

#[derive(Debug, Clone)]
pub struct LogisticRegressionClassifier {
    c: f64,
    balanced: bool,
    weights: Option<Array2<f64>>, // (n_classes, n_features)
    bias: Option<Array1<f64>>,    // (n_classes,)
}

impl LogisticRegressionClassifier {
    pub fn new(c: f64, balanced: bool) -> Self {
        Self {
            c,
            balanced,
            weights: None,
            bias: None,
        }
    }

    fn softmax_rows(mut logits: Array2<f64>) -> Array2<f64> {
        for mut row in logits.rows_mut() {
            let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            row.mapv_inplace(|v| (v - max).exp());
            let sum: f64 = row.sum();
            if sum > 0.0 {
                row.mapv_inplace(|v| v / sum);
            }
        }
        logits
    }
}

impl Classifier for LogisticRegressionClassifier {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: &[usize], n_classes: usize) -> Result<()> {
        let (n, d) = (x.nrows(), x.ncols());
        if n == 0 || d == 0 {
            return Err(LearningError::InvalidData(
                "empty feature matrix".to_string(),
            ));
        }
        if self.c <= 0.0 {
            return Err(LearningError::ModelFailed {
                model: "Logistic Regression".to_string(),
                reason: format!("C must be positive, got {}", self.c),
            });
        }

        let per_class = class_weights(y, n_classes, self.balanced);
        let sample_weights: Vec<f64> = y.iter().map(|&label| per_class[label]).collect();
        let weight_sum: f64 = sample_weights.iter().sum();
        let lambda = 1.0 / self.c;

        let mut weights = Array2::<f64>::zeros((n_classes, d));
        let mut bias = Array1::<f64>::zeros(n_classes);

        for _ in 0..MAX_ITER {
            let logits = x.dot(&weights.t()) + &bias;
            let probs = Self::softmax_rows(logits);

            // error = sample_weight * (p - onehot)
            let mut error = probs;
            for (i, &label) in y.iter().enumerate() {
                error[[i, label]] -= 1.0;
            }
            for (i, &w) in sample_weights.iter().enumerate() {
                error.row_mut(i).mapv_inplace(|v| v * w);
            }

            let grad_w = error.t().dot(&x) / weight_sum + &(weights.clone() * (lambda / n as f64));
            let grad_b = error.sum_axis(Axis(0)) / weight_sum;

            weights = weights - grad_w * LEARNING_RATE;
            bias = bias - grad_b * LEARNING_RATE;
        }

        self.weights = Some(weights);
        self.bias = Some(bias);
        Ok(())
    }

    fn predict_scores(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        let (Some(weights), Some(bias)) = (&self.weights, &self.bias) else {
            return Err(LearningError::InvalidData("model is not fitted".to_string()));
        };
        let logits = x.dot(&weights.t()) + bias;
        Ok(Self::softmax_rows(logits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::{blobs, three_blobs};

    #[test]
    fn test_separates_two_blobs() {
        let (x, y) = blobs();
        let mut model = LogisticRegressionClassifier::new(1.0, false);
        model.fit(x.view(), &y, 2).unwrap();
        assert_eq!(model.predict(x.view()).unwrap(), y);
    }

    #[test]
    fn test_multiclass() {
        let (x, y) = three_blobs();
        let mut model = LogisticRegressionClassifier::new(10.0, true);
        model.fit(x.view(), &y, 3).unwrap();
        let predictions = model.predict(x.view()).unwrap();
        let correct = predictions.iter().zip(&y).filter(|(p, t)| p == t).count();
        assert!(correct >= 22, "expected near-perfect fit, got {correct}/24");
    }

    #[test]
    fn test_scores_are_probabilities() {
        let (x, y) = blobs();
        let mut model = LogisticRegressionClassifier::new(1.0, false);
        model.fit(x.view(), &y, 2).unwrap();
        let scores = model.predict_scores(x.view()).unwrap();
        for row in scores.rows() {
            let sum: f64 = row.sum();
            assert!((sum - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_invalid_c_rejected() {
        let (x, y) = blobs();
        let mut model = LogisticRegressionClassifier::new(-1.0, false);
        assert!(model.fit(x.view(), &y, 2).is_err());
    }
}
