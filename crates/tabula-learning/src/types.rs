//! Result types returned by the search engine.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Everything recorded about one model in a training run.
///
/// A failed model keeps its timing and carries the failure in `error`; the
/// metric fields stay `None`. This is data, not an error path: one model
/// failing never aborts the batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelReport {
    /// Display name of the model (e.g. "Random Forest").
    pub model: String,

    /// Hyperparameters of the winning configuration.
    pub best_params: HashMap<String, serde_json::Value>,

    /// Wall-clock training time in seconds, search included.
    pub training_time: f64,

    /// Cross-validation mean of the scoring metric at the winning
    /// configuration.
    pub cv_mean: Option<f64>,

    /// Cross-validation standard deviation at the winning configuration.
    pub cv_std: Option<f64>,

    /// Effective fold count used (after clamping to the smallest class).
    pub cv_folds: usize,

    /// Holdout accuracy.
    pub accuracy: Option<f64>,

    /// Holdout precision (binary for 2 classes, weighted otherwise).
    pub precision: Option<f64>,

    /// Holdout recall.
    pub recall: Option<f64>,

    /// Holdout F1.
    pub f1_score: Option<f64>,

    /// Holdout ROC-AUC; `None` when not computable for this model/split.
    pub roc_auc: Option<f64>,

    /// Confusion matrix, rows = actual class.
    pub confusion_matrix: Option<Vec<Vec<usize>>>,

    /// Failure message when this model could not be trained or evaluated.
    pub error: Option<String>,
}

impl ModelReport {
    /// An all-empty report carrying only a failure message.
    pub fn failed(model: impl Into<String>, cv_folds: usize, training_time: f64, error: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            best_params: HashMap::new(),
            training_time,
            cv_mean: None,
            cv_std: None,
            cv_folds,
            accuracy: None,
            precision: None,
            recall: None,
            f1_score: None,
            roc_auc: None,
            confusion_matrix: None,
            error: Some(error.into()),
        }
    }

    /// Whether the model trained and evaluated successfully.
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of a full search-and-evaluate run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOutcome {
    /// Class labels in index order (sorted lexicographically).
    pub classes: Vec<String>,

    /// Effective cross-validation fold count after clamping.
    pub effective_cv: usize,

    /// One report per requested model, in request order.
    pub reports: Vec<ModelReport>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_report() {
        let report = ModelReport::failed("XGBoost", 5, 0.01, "not available");
        assert!(!report.succeeded());
        assert_eq!(report.model, "XGBoost");
        assert!(report.accuracy.is_none());
    }

    #[test]
    fn test_report_serialization_keeps_nulls() {
        let report = ModelReport::failed("SVM", 3, 0.5, "boom");
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"accuracy\":null"));
        assert!(json.contains("\"error\":\"boom\""));
    }
}
