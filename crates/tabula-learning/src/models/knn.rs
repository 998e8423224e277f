//! K-nearest-neighbor classifier.
//!
//! Brute-force Euclidean neighbors; fine at the row caps the session store
//! admits. Scores are (optionally distance-weighted) vote shares.

use super::Classifier;
use crate::error::{LearningError, Result};
use ndarray::{Array2, ArrayView2};

#[derive(Debug, Clone)]
pub struct KnnClassifier {
    n_neighbors: usize,
    distance_weighted: bool,
    train: Option<Array2<f64>>,
    labels: Vec<usize>,
    n_classes: usize,
}

impl KnnClassifier {
    pub fn new(n_neighbors: usize, distance_weighted: bool) -> Self {
        Self {
            n_neighbors,
            distance_weighted,
            train: None,
            labels: Vec::new(),
            n_classes: 0,
        }
    }
}

impl Classifier for KnnClassifier {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: &[usize], n_classes: usize) -> Result<()> {
        if x.nrows() == 0 {
            return Err(LearningError::InvalidData(
                "cannot fit on an empty training set".to_string(),
            ));
        }
        if self.n_neighbors == 0 {
            return Err(LearningError::ModelFailed {
                model: "K-Neighbors".to_string(),
                reason: "n_neighbors must be at least 1".to_string(),
            });
        }
        self.train = Some(x.to_owned());
        self.labels = y.to_vec();
        self.n_classes = n_classes;
        Ok(())
    }

    fn predict_scores(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        let Some(train) = &self.train else {
            return Err(LearningError::InvalidData("model is not fitted".to_string()));
        };
        let k = self.n_neighbors.min(train.nrows());
        let mut scores = Array2::zeros((x.nrows(), self.n_classes));

        for (i, row) in x.rows().into_iter().enumerate() {
            let mut distances: Vec<(f64, usize)> = train
                .rows()
                .into_iter()
                .enumerate()
                .map(|(j, train_row)| {
                    let d = row
                        .iter()
                        .zip(train_row.iter())
                        .map(|(a, b)| (a - b).powi(2))
                        .sum::<f64>()
                        .sqrt();
                    (d, j)
                })
                .collect();
            distances
                .sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

            let mut votes = vec![0.0; self.n_classes];
            for &(distance, j) in distances.iter().take(k) {
                let weight = if self.distance_weighted {
                    1.0 / (distance + 1e-10)
                } else {
                    1.0
                };
                votes[self.labels[j]] += weight;
            }
            let total: f64 = votes.iter().sum();
            for (j, vote) in votes.into_iter().enumerate() {
                scores[[i, j]] = if total > 0.0 { vote / total } else { 0.0 };
            }
        }
        Ok(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::blobs;
    use ndarray::arr2;

    #[test]
    fn test_neighbors_classify_blobs() {
        let (x, y) = blobs();
        let mut model = KnnClassifier::new(3, false);
        model.fit(x.view(), &y, 2).unwrap();
        assert_eq!(model.predict(x.view()).unwrap(), y);
    }

    #[test]
    fn test_distance_weighting_prefers_closest() {
        let x = arr2(&[[0.0], [1.0], [10.0]]);
        let y = vec![0, 0, 1];
        let mut model = KnnClassifier::new(3, true);
        model.fit(x.view(), &y, 2).unwrap();
        // Query right on top of the class-1 point: distance weighting wins
        // even though class 0 has the majority of neighbors.
        let query = arr2(&[[10.0]]);
        assert_eq!(model.predict(query.view()).unwrap(), vec![1]);
    }

    #[test]
    fn test_k_larger_than_train_is_clamped() {
        let x = arr2(&[[0.0], [5.0]]);
        let y = vec![0, 1];
        let mut model = KnnClassifier::new(7, false);
        model.fit(x.view(), &y, 2).unwrap();
        assert_eq!(model.predict(x.view()).unwrap().len(), 2);
    }
}
