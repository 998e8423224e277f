//! Gradient-boosted trees.
//!
//! One-vs-rest logistic-loss boosting over shallow regression trees: each
//! round fits a tree to the current pseudo-residuals and adds it with
//! shrinkage. Scores are the normalized per-class sigmoids.

use super::Classifier;
use crate::error::{LearningError, Result};
use ndarray::{Array2, ArrayView2};

/// A depth-limited regression tree on squared error, mean-value leaves.
#[derive(Debug, Clone)]
enum RegressionNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<RegressionNode>,
        right: Box<RegressionNode>,
    },
}

#[derive(Debug, Clone)]
struct RegressionTree {
    root: RegressionNode,
}

impl RegressionTree {
    fn fit(x: ArrayView2<'_, f64>, targets: &[f64], max_depth: usize) -> Self {
        let indices: Vec<usize> = (0..x.nrows()).collect();
        Self {
            root: Self::build(x, targets, &indices, max_depth),
        }
    }

    fn mean(targets: &[f64], indices: &[usize]) -> f64 {
        if indices.is_empty() {
            return 0.0;
        }
        indices.iter().map(|&i| targets[i]).sum::<f64>() / indices.len() as f64
    }

    /// Best (feature, threshold) by sum-of-squares reduction.
    fn find_split(
        x: ArrayView2<'_, f64>,
        targets: &[f64],
        indices: &[usize],
    ) -> Option<(usize, f64)> {
        let n = indices.len() as f64;
        let total_sum: f64 = indices.iter().map(|&i| targets[i]).sum();
        let mut best: Option<(usize, f64, f64)> = None;

        for feature in 0..x.ncols() {
            let mut column: Vec<(f64, f64)> = indices
                .iter()
                .map(|&i| (x[[i, feature]], targets[i]))
                .collect();
            column.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

            let mut left_sum = 0.0;
            let mut left_n = 0.0;
            for pair in column.windows(2) {
                left_sum += pair[0].1;
                left_n += 1.0;
                if pair[0].0 >= pair[1].0 {
                    continue;
                }
                let right_sum = total_sum - left_sum;
                let right_n = n - left_n;
                // Maximizing sum-of-squares reduction is equivalent to
                // maximizing this score.
                let score = left_sum * left_sum / left_n + right_sum * right_sum / right_n;
                if score > best.map(|(_, _, s)| s).unwrap_or(f64::NEG_INFINITY) {
                    best = Some((feature, (pair[0].0 + pair[1].0) / 2.0, score));
                }
            }
        }
        best.map(|(feature, threshold, _)| (feature, threshold))
    }

    fn build(
        x: ArrayView2<'_, f64>,
        targets: &[f64],
        indices: &[usize],
        depth_left: usize,
    ) -> RegressionNode {
        if depth_left == 0 || indices.len() < 2 {
            return RegressionNode::Leaf {
                value: Self::mean(targets, indices),
            };
        }
        let Some((feature, threshold)) = Self::find_split(x, targets, indices) else {
            return RegressionNode::Leaf {
                value: Self::mean(targets, indices),
            };
        };
        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .copied()
            .partition(|&i| x[[i, feature]] <= threshold);
        if left.is_empty() || right.is_empty() {
            return RegressionNode::Leaf {
                value: Self::mean(targets, indices),
            };
        }
        RegressionNode::Split {
            feature,
            threshold,
            left: Box::new(Self::build(x, targets, &left, depth_left - 1)),
            right: Box::new(Self::build(x, targets, &right, depth_left - 1)),
        }
    }

    fn predict_one(&self, row: &[f64]) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                RegressionNode::Leaf { value } => return *value,
                RegressionNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }
}

fn sigmoid(v: f64) -> f64 {
    1.0 / (1.0 + (-v).exp())
}

#[derive(Debug, Clone)]
pub struct GradientBoostingClassifier {
    n_estimators: usize,
    learning_rate: f64,
    max_depth: usize,
    /// Per class: (initial log-odds, boosted trees).
    ensembles: Vec<(f64, Vec<RegressionTree>)>,
}

impl GradientBoostingClassifier {
    pub fn new(n_estimators: usize, learning_rate: f64, max_depth: usize) -> Self {
        Self {
            n_estimators,
            learning_rate,
            max_depth,
            ensembles: Vec::new(),
        }
    }

    fn raw_scores(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        let mut scores = Array2::zeros((x.nrows(), self.ensembles.len()));
        for (i, row) in x.rows().into_iter().enumerate() {
            let row_vec: Vec<f64> = row.iter().copied().collect();
            for (c, (base, trees)) in self.ensembles.iter().enumerate() {
                let mut f = *base;
                for tree in trees {
                    f += self.learning_rate * tree.predict_one(&row_vec);
                }
                scores[[i, c]] = f;
            }
        }
        scores
    }
}

impl Classifier for GradientBoostingClassifier {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: &[usize], n_classes: usize) -> Result<()> {
        let n = x.nrows();
        if n == 0 || x.ncols() == 0 {
            return Err(LearningError::InvalidData(
                "empty feature matrix".to_string(),
            ));
        }
        if self.n_estimators == 0 || self.learning_rate <= 0.0 {
            return Err(LearningError::ModelFailed {
                model: "Gradient Boosting".to_string(),
                reason: "n_estimators and learning_rate must be positive".to_string(),
            });
        }

        self.ensembles = Vec::with_capacity(n_classes);
        for class in 0..n_classes {
            let targets01: Vec<f64> = y
                .iter()
                .map(|&label| if label == class { 1.0 } else { 0.0 })
                .collect();
            let positive_rate = targets01.iter().sum::<f64>() / n as f64;
            // Initial log-odds, clamped away from the degenerate rates.
            let p = positive_rate.clamp(1e-6, 1.0 - 1e-6);
            let base = (p / (1.0 - p)).ln();

            let mut f = vec![base; n];
            let mut trees = Vec::with_capacity(self.n_estimators);
            for _ in 0..self.n_estimators {
                let residuals: Vec<f64> = f
                    .iter()
                    .zip(&targets01)
                    .map(|(&fi, &ti)| ti - sigmoid(fi))
                    .collect();
                let tree = RegressionTree::fit(x, &residuals, self.max_depth);
                for (i, fi) in f.iter_mut().enumerate() {
                    let row: Vec<f64> = x.row(i).iter().copied().collect();
                    *fi += self.learning_rate * tree.predict_one(&row);
                }
                trees.push(tree);
            }
            self.ensembles.push((base, trees));
        }
        Ok(())
    }

    fn predict_scores(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        if self.ensembles.is_empty() {
            return Err(LearningError::InvalidData("model is not fitted".to_string()));
        }
        let mut scores = self.raw_scores(x);
        for mut row in scores.rows_mut() {
            row.mapv_inplace(sigmoid);
            let sum: f64 = row.sum();
            if sum > 0.0 {
                row.mapv_inplace(|v| v / sum);
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
    fn test_boosting_classifies_blobs() {
        let (x, y) = blobs();
        let mut model = GradientBoostingClassifier::new(20, 0.1, 3);
        model.fit(x.view(), &y, 2).unwrap();
        assert_eq!(model.predict(x.view()).unwrap(), y);
    }

    #[test]
    fn test_boosting_multiclass() {
        let (x, y) = three_blobs();
        let mut model = GradientBoostingClassifier::new(20, 0.1, 3);
        model.fit(x.view(), &y, 3).unwrap();
        let predictions = model.predict(x.view()).unwrap();
        let correct = predictions.iter().zip(&y).filter(|(p, t)| p == t).count();
        assert!(correct >= 22, "boosting too weak: {correct}/24");
    }

    #[test]
    fn test_regression_tree_fits_step_function() {
        let x = ndarray::arr2(&[[0.0], [1.0], [2.0], [10.0], [11.0], [12.0]]);
        let targets = vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let tree = RegressionTree::fit(x.view(), &targets, 2);
        assert!((tree.predict_one(&[1.0]) - 0.0).abs() < 1e-9);
        assert!((tree.predict_one(&[11.0]) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_params_rejected() {
        let (x, y) = blobs();
        let mut model = GradientBoostingClassifier::new(0, 0.1, 3);
        assert!(model.fit(x.view(), &y, 2).is_err());
    }
}
