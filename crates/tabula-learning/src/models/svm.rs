//! Linear support-vector classifier.
//!
//! One-vs-rest hinge-loss SGD (Pegasos-style schedule) with L2
//! regularization `1/C`. Scores are raw decision margins, which is what
//! ROC-AUC needs from a model without calibrated probabilities.

use super::{class_weights, Classifier};
use crate::error::{LearningError, Result};
use ndarray::{Array1, Array2, ArrayView2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

const EPOCHS: usize = 60;

#[derive(Debug, Clone)]
pub struct LinearSvmClassifier {
    c: f64,
    seed: u64,
    balanced: bool,
    /// One (weights, bias) pair per class.
    hyperplanes: Vec<(Array1<f64>, f64)>,
}

impl LinearSvmClassifier {
    pub fn new(c: f64, seed: u64, balanced: bool) -> Self {
        Self {
            c,
            seed,
            balanced,
            hyperplanes: Vec::new(),
        }
    }

    /// Train a single one-vs-rest hyperplane for `positive` class.
    fn fit_binary(
        &self,
        x: ArrayView2<'_, f64>,
        y: &[usize],
        positive: usize,
        sample_weights: &[f64],
        rng: &mut StdRng,
    ) -> (Array1<f64>, f64) {
        let n = x.nrows();
        let lambda = 1.0 / (self.c * n as f64);
        let mut w = Array1::<f64>::zeros(x.ncols());
        let mut b = 0.0;
        let mut order: Vec<usize> = (0..n).collect();

        let mut t = 0usize;
        for _ in 0..EPOCHS {
            order.shuffle(rng);
            for &i in &order {
                t += 1;
                let eta = 1.0 / (lambda * t as f64);
                let target = if y[i] == positive { 1.0 } else { -1.0 };
                let margin = x.row(i).dot(&w) + b;
                if target * margin < 1.0 {
                    let step = eta * sample_weights[i] * target;
                    w = &w * (1.0 - eta * lambda) + &(x.row(i).to_owned() * step);
                    b += step;
                } else {
                    w *= 1.0 - eta * lambda;
                }
            }
        }
        (w, b)
    }
}

impl Classifier for LinearSvmClassifier {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: &[usize], n_classes: usize) -> Result<()> {
        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(LearningError::InvalidData(
                "empty feature matrix".to_string(),
            ));
        }
        if self.c <= 0.0 {
            return Err(LearningError::ModelFailed {
                model: "SVM".to_string(),
                reason: format!("C must be positive, got {}", self.c),
            });
        }
        let per_class = class_weights(y, n_classes, self.balanced);
        let sample_weights: Vec<f64> = y.iter().map(|&label| per_class[label]).collect();

        let mut rng = StdRng::seed_from_u64(self.seed);
        self.hyperplanes = (0..n_classes)
            .map(|class| self.fit_binary(x, y, class, &sample_weights, &mut rng))
            .collect();
        Ok(())
    }

    fn predict_scores(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        if self.hyperplanes.is_empty() {
            return Err(LearningError::InvalidData("model is not fitted".to_string()));
        }
        let mut scores = Array2::zeros((x.nrows(), self.hyperplanes.len()));
        for (i, row) in x.rows().into_iter().enumerate() {
            for (j, (w, b)) in self.hyperplanes.iter().enumerate() {
                scores[[i, j]] = row.dot(w) + b;
            }
        }
        Ok(scores)
    }
}
