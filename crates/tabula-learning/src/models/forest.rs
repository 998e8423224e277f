//! Bagged tree ensembles: random forest and extra-trees.
//!
//! Both average leaf distributions across trees. The forest bootstraps rows
//! and subsamples sqrt(d) features per split; extra-trees keeps all rows and
//! draws random split thresholds.

use super::tree::{DecisionTreeClassifier, SplitMode};
use super::{class_weights, Classifier};
use crate::error::{LearningError, Result};
use ndarray::{Array2, ArrayView2};
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;

#[derive(Debug, Clone)]
struct BaggedTrees {
    n_estimators: usize,
    max_depth: Option<usize>,
    bootstrap: bool,
    split_mode: SplitMode,
    seed: u64,
    balanced: bool,
    trees: Vec<DecisionTreeClassifier>,
    n_classes: usize,
}

impl BaggedTrees {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: &[usize], n_classes: usize) -> Result<()> {
        let n = x.nrows();
        if n == 0 {
            return Err(LearningError::InvalidData(
                "cannot fit on an empty training set".to_string(),
            ));
        }
        if self.n_estimators == 0 {
            return Err(LearningError::InvalidData(
                "n_estimators must be at least 1".to_string(),
            ));
        }
        let feature_subsample = Some(((x.ncols() as f64).sqrt().ceil() as usize).max(1));
        let per_class = class_weights(y, n_classes, self.balanced);
        let mut rng = StdRng::seed_from_u64(self.seed);

        self.n_classes = n_classes;
        self.trees = Vec::with_capacity(self.n_estimators);
        for t in 0..self.n_estimators {
            // Bootstrap weights: how often each row was drawn.
            let mut weights: Vec<f64> = if self.bootstrap {
                let mut counts = vec![0.0; n];
                for _ in 0..n {
                    counts[rng.gen_range(0..n)] += 1.0;
                }
                counts
            } else {
                vec![1.0; n]
            };
            for (i, weight) in weights.iter_mut().enumerate() {
                *weight *= per_class[y[i]];
            }

            let mut tree = DecisionTreeClassifier::new(
                self.max_depth,
                2,
                feature_subsample,
                self.split_mode,
                self.seed.wrapping_add(t as u64 + 1),
                false,
            );
            tree.fit_weighted(x, y, &weights, n_classes)?;
            self.trees.push(tree);
        }
        Ok(())
    }

    fn predict_scores(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        if self.trees.is_empty() {
            return Err(LearningError::InvalidData("model is not fitted".to_string()));
        }
        let mut scores = Array2::zeros((x.nrows(), self.n_classes));
        for tree in &self.trees {
            scores = scores + tree.predict_scores(x)?;
        }
        Ok(scores / self.trees.len() as f64)
    }
}

/// Random forest: bootstrapped trees with per-split feature subsampling.
#[derive(Debug, Clone)]
pub struct RandomForestClassifier {
    inner: BaggedTrees,
}

impl RandomForestClassifier {
    pub fn new(n_estimators: usize, max_depth: Option<usize>, seed: u64, balanced: bool) -> Self {
        Self {
            inner: BaggedTrees {
                n_estimators,
                max_depth,
                bootstrap: true,
                split_mode: SplitMode::Best,
                seed,
                balanced,
                trees: Vec::new(),
                n_classes: 0,
            },
        }
    }
}

impl Classifier for RandomForestClassifier {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: &[usize], n_classes: usize) -> Result<()> {
        self.inner.fit(x, y, n_classes)
    }

    fn predict_scores(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        self.inner.predict_scores(x)
    }
}

/// Extra-trees: no bootstrapping, random split thresholds.
#[derive(Debug, Clone)]
pub struct ExtraTreesClassifier {
    inner: BaggedTrees,
}

impl ExtraTreesClassifier {
    pub fn new(n_estimators: usize, max_depth: Option<usize>, seed: u64, balanced: bool) -> Self {
        Self {
            inner: BaggedTrees {
                n_estimators,
                max_depth,
                bootstrap: false,
                split_mode: SplitMode::RandomThreshold,
                seed,
                balanced,
                trees: Vec::new(),
                n_classes: 0,
            },
        }
    }
}

impl Classifier for ExtraTreesClassifier {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: &[usize], n_classes: usize) -> Result<()> {
        self.inner.fit(x, y, n_classes)
    }

    fn predict_scores(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        self.inner.predict_scores(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::{blobs, three_blobs};

    #[test]
    fn test_forest_classifies_blobs() {
        let (x, y) = blobs();
        let mut model = RandomForestClassifier::new(25, None, 42, false);
        model.fit(x.view(), &y, 2).unwrap();
        assert_eq!(model.predict(x.view()).unwrap(), y);
    }

    #[test]
    fn test_extra_trees_multiclass() {
        let (x, y) = three_blobs();
        let mut model = ExtraTreesClassifier::new(25, None, 42, false);
        model.fit(x.view(), &y, 3).unwrap();
        let predictions = model.predict(x.view()).unwrap();
        let correct = predictions.iter().zip(&y).filter(|(p, t)| p == t).count();
        assert!(correct >= 22, "extra trees too weak: {correct}/24");
    }

    #[test]
    fn test_forest_deterministic_under_seed() {
        let (x, y) = blobs();
        let mut a = RandomForestClassifier::new(10, Some(5), 3, false);
        let mut b = RandomForestClassifier::new(10, Some(5), 3, false);
        a.fit(x.view(), &y, 2).unwrap();
        b.fit(x.view(), &y, 2).unwrap();
        assert_eq!(
            a.predict_scores(x.view()).unwrap(),
            b.predict_scores(x.view()).unwrap()
        );
    }

    #[test]
    fn test_scores_average_to_probabilities() {
        let (x, y) = blobs();
        let mut model = RandomForestClassifier::new(10, None, 42, false);
        model.fit(x.view(), &y, 2).unwrap();
        let scores = model.predict_scores(x.view()).unwrap();
        for row in scores.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_zero_estimators_rejected() {
        let (x, y) = blobs();
        let mut model = RandomForestClassifier::new(0, None, 42, false);
        assert!(model.fit(x.view(), &y, 2).is_err());
    }
}
