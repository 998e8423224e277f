//! CART decision tree.
//!
//! Gini-impurity splits with optional depth and minimum-split limits,
//! per-split feature subsampling (for forests), and a random-threshold
//! split mode (for extra-trees). Leaves hold weighted class distributions,
//! which double as probability scores.

use super::{class_weights, Classifier};
use crate::error::{LearningError, Result};
use ndarray::{Array2, ArrayView2};
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;

/// How split thresholds are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitMode {
    /// Scan all candidate thresholds per feature for the best Gini gain.
    Best,
    /// Draw one random threshold per candidate feature (extra-trees style).
    RandomThreshold,
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        distribution: Vec<f64>,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

#[derive(Debug, Clone)]
pub struct DecisionTreeClassifier {
    max_depth: Option<usize>,
    min_samples_split: usize,
    /// Features considered per split; `None` means all.
    feature_subsample: Option<usize>,
    split_mode: SplitMode,
    seed: u64,
    balanced: bool,
    root: Option<Node>,
    n_classes: usize,
}

impl DecisionTreeClassifier {
    pub fn new(
        max_depth: Option<usize>,
        min_samples_split: usize,
        feature_subsample: Option<usize>,
        split_mode: SplitMode,
        seed: u64,
        balanced: bool,
    ) -> Self {
        Self {
            max_depth,
            min_samples_split: min_samples_split.max(2),
            feature_subsample,
            split_mode,
            seed,
            balanced,
            root: None,
            n_classes: 0,
        }
    }

    /// Fit using externally supplied per-sample weights (used by boosting
    /// and bagging wrappers that already weighted their samples).
    pub fn fit_weighted(
        &mut self,
        x: ArrayView2<'_, f64>,
        y: &[usize],
        weights: &[f64],
        n_classes: usize,
    ) -> Result<()> {
        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(LearningError::InvalidData(
                "empty feature matrix".to_string(),
            ));
        }
        let indices: Vec<usize> = (0..x.nrows()).collect();
        let mut rng = StdRng::seed_from_u64(self.seed);
        self.n_classes = n_classes;
        self.root = Some(self.build_node(x, y, weights, &indices, 0, &mut rng));
        Ok(())
    }

    fn leaf(&self, y: &[usize], weights: &[f64], indices: &[usize]) -> Node {
        let mut distribution = vec![0.0; self.n_classes];
        for &i in indices {
            distribution[y[i]] += weights[i];
        }
        let total: f64 = distribution.iter().sum();
        if total > 0.0 {
            for value in &mut distribution {
                *value /= total;
            }
        }
        Node::Leaf { distribution }
    }

    fn gini(class_weight_sums: &[f64], total: f64) -> f64 {
        if total <= 0.0 {
            return 0.0;
        }
        1.0 - class_weight_sums
            .iter()
            .map(|&w| (w / total).powi(2))
            .sum::<f64>()
    }

    fn candidate_features(&self, n_features: usize, rng: &mut StdRng) -> Vec<usize> {
        match self.feature_subsample {
            Some(m) if m < n_features => {
                rand::seq::index::sample(rng, n_features, m).into_vec()
            }
            _ => (0..n_features).collect(),
        }
    }

    /// Best (feature, threshold, weighted-impurity) over candidate features,
    /// or `None` when no split improves on the node impurity.
    fn find_split(
        &self,
        x: ArrayView2<'_, f64>,
        y: &[usize],
        weights: &[f64],
        indices: &[usize],
        rng: &mut StdRng,
    ) -> Option<(usize, f64)> {
        let mut node_counts = vec![0.0; self.n_classes];
        let mut node_total = 0.0;
        for &i in indices {
            node_counts[y[i]] += weights[i];
            node_total += weights[i];
        }
        let node_impurity = Self::gini(&node_counts, node_total);
        if node_impurity <= 0.0 {
            return None;
        }

        let mut best: Option<(usize, f64, f64)> = None;
        for feature in self.candidate_features(x.ncols(), rng) {
            let mut column: Vec<(f64, usize)> =
                indices.iter().map(|&i| (x[[i, feature]], i)).collect();
            column.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

            let thresholds: Vec<f64> = match self.split_mode {
                SplitMode::Best => column
                    .windows(2)
                    .filter(|pair| pair[0].0 < pair[1].0)
                    .map(|pair| (pair[0].0 + pair[1].0) / 2.0)
                    .collect(),
                SplitMode::RandomThreshold => {
                    let min = column.first().map(|(v, _)| *v).unwrap_or(0.0);
                    let max = column.last().map(|(v, _)| *v).unwrap_or(0.0);
                    if max > min {
                        vec![rng.gen_range(min..max)]
                    } else {
                        Vec::new()
                    }
                }
            };

            for threshold in thresholds {
                let mut left_counts = vec![0.0; self.n_classes];
                let mut left_total = 0.0;
                for &(value, i) in &column {
                    if value > threshold {
                        break;
                    }
                    left_counts[y[i]] += weights[i];
                    left_total += weights[i];
                }
                let right_total = node_total - left_total;
                if left_total <= 0.0 || right_total <= 0.0 {
                    continue;
                }
                let right_counts: Vec<f64> = node_counts
                    .iter()
                    .zip(&left_counts)
                    .map(|(n, l)| n - l)
                    .collect();
                let weighted = (left_total * Self::gini(&left_counts, left_total)
                    + right_total * Self::gini(&right_counts, right_total))
                    / node_total;
                if weighted + 1e-12 < best.map(|(_, _, w)| w).unwrap_or(node_impurity) {
                    best = Some((feature, threshold, weighted));
                }
            }
        }
        best.map(|(feature, threshold, _)| (feature, threshold))
    }

    fn build_node(
        &self,
        x: ArrayView2<'_, f64>,
        y: &[usize],
        weights: &[f64],
        indices: &[usize],
        depth: usize,
        rng: &mut StdRng,
    ) -> Node {
        let depth_reached = self.max_depth.is_some_and(|max| depth >= max);
        if depth_reached || indices.len() < self.min_samples_split {
            return self.leaf(y, weights, indices);
        }
        let Some((feature, threshold)) = self.find_split(x, y, weights, indices, rng) else {
            return self.leaf(y, weights, indices);
        };

        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .copied()
            .partition(|&i| x[[i, feature]] <= threshold);
        if left.is_empty() || right.is_empty() {
            return self.leaf(y, weights, indices);
        }
        Node::Split {
            feature,
            threshold,
            left: Box::new(self.build_node(x, y, weights, &left, depth + 1, rng)),
            right: Box::new(self.build_node(x, y, weights, &right, depth + 1, rng)),
        }
    }

    fn traverse<'a>(&'a self, node: &'a Node, row: &[f64]) -> &'a [f64] {
        match node {
            Node::Leaf { distribution } => distribution,
            Node::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if row[*feature] <= *threshold {
                    self.traverse(left, row)
                } else {
                    self.traverse(right, row)
                }
            }
        }
    }
}

impl Classifier for DecisionTreeClassifier {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: &[usize], n_classes: usize) -> Result<()> {
        let per_class = class_weights(y, n_classes, self.balanced);
        let weights: Vec<f64> = y.iter().map(|&label| per_class[label]).collect();
        self.fit_weighted(x, y, &weights, n_classes)
    }

    fn predict_scores(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        let Some(root) = &self.root else {
            return Err(LearningError::InvalidData("model is not fitted".to_string()));
        };
        let mut scores = Array2::zeros((x.nrows(), self.n_classes));
        for (i, row) in x.rows().into_iter().enumerate() {
            let row_vec: Vec<f64> = row.iter().copied().collect();
            let distribution = self.traverse(root, &row_vec);
            for (j, &value) in distribution.iter().enumerate() {
                scores[[i, j]] = value;
            }
        }
        Ok(scores)
    }
}
