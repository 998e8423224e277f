//! Classifier implementations.
//!
//! Every model implements [`Classifier`] over an `ndarray` feature matrix.
//! Scores are per-class: probabilities where the model has them, decision
//! values otherwise. Both are acceptable inputs to ROC-AUC.

mod baseline;
mod bayes;
mod boosting;
mod forest;
mod knn;
mod linear;
mod svm;
mod tree;

pub use baseline::MajorityClassifier;
pub use bayes::GaussianNbClassifier;
pub use boosting::GradientBoostingClassifier;
pub use forest::{ExtraTreesClassifier, RandomForestClassifier};
pub use knn::KnnClassifier;
pub use linear::LogisticRegressionClassifier;
pub use svm::LinearSvmClassifier;
pub use tree::{DecisionTreeClassifier, SplitMode};

use crate::error::{LearningError, Result};
use crate::registry::{ModelKind, ParamMap};
use ndarray::ArrayView2;
use serde_json::Value;

/// Options shared by every model build.
#[derive(Debug, Clone, Copy)]
pub struct ModelOptions {
    pub seed: u64,
    pub class_weight_auto: bool,
}

/// A fitted or fittable classifier.
pub trait Classifier: Send {
    /// Fit on a feature matrix and class-index labels in `0..n_classes`.
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: &[usize], n_classes: usize) -> Result<()>;

    /// Per-class scores, shape `(n_samples, n_classes)`.
    fn predict_scores(&self, x: ArrayView2<'_, f64>) -> Result<ndarray::Array2<f64>>;

    /// Predicted class indices (argmax of the scores).
    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Vec<usize>> {
        let scores = self.predict_scores(x)?;
        Ok(scores
            .rows()
            .into_iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
                    .map(|(i, _)| i)
                    .unwrap_or(0)
            })
            .collect())
    }
}

/// Build a classifier for the given kind and hyperparameters.
///
/// Fails for unavailable kinds; the search engine turns that failure into a
/// per-model error record.
pub fn build_model(
    kind: ModelKind,
    params: &ParamMap,
    options: &ModelOptions,
) -> Result<Box<dyn Classifier>> {
    if !kind.is_available() {
        return Err(LearningError::ModelFailed {
            model: kind.display_name().to_string(),
            reason: "model is not available in this build".to_string(),
        });
    }
    let weighted = options.class_weight_auto;
    Ok(match kind {
        ModelKind::MajorityBaseline => Box::new(MajorityClassifier::new()),
        ModelKind::LogisticRegression => Box::new(LogisticRegressionClassifier::new(
            param_f64(params, "C", 1.0),
            weighted,
        )),
        ModelKind::KNearestNeighbors => Box::new(KnnClassifier::new(
            param_usize(params, "n_neighbors", 5),
            param_str(params, "weights", "uniform") == "distance",
        )),
        ModelKind::DecisionTree => Box::new(DecisionTreeClassifier::new(
            param_opt_usize(params, "max_depth"),
            param_usize(params, "min_samples_split", 2),
            None,
            SplitMode::Best,
            options.seed,
            weighted,
        )),
        ModelKind::GaussianNaiveBayes => Box::new(GaussianNbClassifier::new()),
        ModelKind::RandomForest => Box::new(RandomForestClassifier::new(
            param_usize(params, "n_estimators", 100),
            param_opt_usize(params, "max_depth"),
            options.seed,
            weighted,
        )),
        ModelKind::LinearSvm => Box::new(LinearSvmClassifier::new(
            param_f64(params, "C", 1.0),
            options.seed,
            weighted,
        )),
        ModelKind::GradientBoosting => Box::new(GradientBoostingClassifier::new(
            param_usize(params, "n_estimators", 100),
            param_f64(params, "learning_rate", 0.1),
            param_usize(params, "max_depth", 3),
        )),
        ModelKind::ExtraTrees => Box::new(ExtraTreesClassifier::new(
            param_usize(params, "n_estimators", 100),
            param_opt_usize(params, "max_depth"),
            options.seed,
            weighted,
        )),
        ModelKind::XgBoost | ModelKind::LightGbm => unreachable!("guarded by is_available"),
    })
}

/// Per-class sample weights: `n / (k * count)` when balancing, 1.0 otherwise.
pub(crate) fn class_weights(y: &[usize], n_classes: usize, balanced: bool) -> Vec<f64> {
    if !balanced {
        return vec![1.0; n_classes];
    }
    let mut counts = vec![0usize; n_classes];
    for &label in y {
        counts[label] += 1;
    }
    let n = y.len() as f64;
    counts
        .iter()
        .map(|&c| {
            if c == 0 {
                0.0
            } else {
                n / (n_classes as f64 * c as f64)
            }
        })
        .collect()
}

fn param_f64(params: &ParamMap, key: &str, default: f64) -> f64 {
    params.get(key).and_then(Value::as_f64).unwrap_or(default)
}

fn param_usize(params: &ParamMap, key: &str, default: usize) -> usize {
    params
        .get(key)
        .and_then(Value::as_u64)
        .map(|v| v as usize)
        .unwrap_or(default)
}

fn param_opt_usize(params: &ParamMap, key: &str) -> Option<usize> {
    params.get(key).and_then(Value::as_u64).map(|v| v as usize)
}

fn param_str<'a>(params: &'a ParamMap, key: &str, default: &'a str) -> &'a str {
    params.get(key).and_then(Value::as_str).unwrap_or(default)
}

#[cfg(test)]
pub(crate) mod test_support {
    use ndarray::Array2;

    /// Two well-separated Gaussian-ish blobs, 10 samples per class.
    pub fn blobs() -> (Array2<f64>, Vec<usize>) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..10 {
            let jitter = (i as f64) * 0.05;
            rows.push([0.0 + jitter, 0.0 - jitter]);
            labels.push(0);
            rows.push([5.0 - jitter, 5.0 + jitter]);
            labels.push(1);
        }
        let flat: Vec<f64> = rows.iter().flatten().copied().collect();
        (Array2::from_shape_vec((20, 2), flat).unwrap(), labels)
    }

    /// Three separated blobs.
    pub fn three_blobs() -> (Array2<f64>, Vec<usize>) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..8 {
            let jitter = (i as f64) * 0.03;
            rows.push([0.0 + jitter, 0.0]);
            labels.push(0);
            rows.push([4.0, 4.0 - jitter]);
            labels.push(1);
            rows.push([8.0 - jitter, 0.0 + jitter]);
            labels.push(2);
        }
        let flat: Vec<f64> = rows.iter().flatten().copied().collect();
        (Array2::from_shape_vec((24, 2), flat).unwrap(), labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_build_model_unavailable_kind() {
        let options = ModelOptions {
            seed: 42,
            class_weight_auto: false,
        };
        let err = build_model(ModelKind::XgBoost, &ParamMap::new(), &options).err().unwrap();
        assert!(err.to_string().contains("not available"));
    }

    #[test]
    fn test_build_model_all_available_kinds() {
        let options = ModelOptions {
            seed: 42,
            class_weight_auto: true,
        };
        for kind in ModelKind::all().iter().filter(|k| k.is_available()) {
            let params = kind.expand_grid().into_iter().next().unwrap();
            assert!(build_model(*kind, &params, &options).is_ok());
        }
    }

    #[test]
    fn test_class_weights_balanced() {
        let y = vec![0, 0, 0, 1];
        let weights = class_weights(&y, 2, true);
        // n=4, k=2: w0 = 4/(2*3), w1 = 4/(2*1)
        assert!((weights[0] - 4.0 / 6.0).abs() < 1e-12);
        assert!((weights[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_param_extraction() {
        let params = ParamMap::from([
            ("C".to_string(), json!(0.5)),
            ("max_depth".to_string(), serde_json::Value::Null),
            ("weights".to_string(), json!("distance")),
        ]);
        assert_eq!(param_f64(&params, "C", 1.0), 0.5);
        assert_eq!(param_opt_usize(&params, "max_depth"), None);
        assert_eq!(param_str(&params, "weights", "uniform"), "distance");
        assert_eq!(param_usize(&params, "n_estimators", 100), 100);
    }
}
