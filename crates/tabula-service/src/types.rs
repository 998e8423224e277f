//! Request and response types for the service surface.
//!
//! Wire-level routing and payload validation are owned by an external
//! router; these are the structured contracts it maps onto.

use crate::state::JobStatus;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tabula_learning::{ModelKind, ScoringMetric, SearchStrategy, TrainConfig};
use tabula_processing::{DiffSummary, PreprocessConfig};

/// Preprocessing request: the pipeline configuration plus the designated
/// target column. `test_fraction` rides along inside the config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessRequest {
    #[serde(flatten)]
    pub config: PreprocessConfig,
    pub target_column: String,
}

/// Preprocessing response: confirmation, a preview of the transformed
/// table, and the before/after diff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessResponse {
    pub message: String,
    pub preview: Vec<serde_json::Map<String, serde_json::Value>>,
    pub diff: DiffSummary,
}

/// Training request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainRequest {
    pub models: Vec<ModelKind>,
    pub search_type: SearchStrategy,
    pub cv_folds: usize,
    pub scoring: ScoringMetric,
    pub class_weight_auto: bool,
}

impl Default for TrainRequest {
    fn default() -> Self {
        Self {
            models: vec![ModelKind::LogisticRegression, ModelKind::RandomForest],
            search_type: SearchStrategy::Grid,
            cv_folds: 5,
            scoring: ScoringMetric::F1,
            class_weight_auto: true,
        }
    }
}

impl TrainRequest {
    /// Lower into the engine's configuration with the orchestrator's seed.
    pub fn to_config(&self, seed: u64) -> TrainConfig {
        TrainConfig {
            models: self.models.clone(),
            search: self.search_type,
            cv_folds: self.cv_folds,
            scoring: self.scoring,
            class_weight_auto: self.class_weight_auto,
            seed,
            random_iterations: 10,
        }
    }
}

/// Immediate acknowledgment of a training request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainAck {
    pub message: String,
    pub status: JobStatus,
}

/// One row of the comparison table, restricted to the metric whitelist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub model: String,
    pub accuracy: Option<f64>,
    pub precision: Option<f64>,
    pub recall: Option<f64>,
    pub f1_score: Option<f64>,
    pub roc_auc: Option<f64>,
    pub training_time: Option<f64>,
    pub cv_mean: Option<f64>,
}

/// One row of the ranked table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedRow {
    pub rank: usize,
    pub model: String,
    pub score: Option<f64>,
}

/// Full per-model metrics for the detailed view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailedMetrics {
    pub model: String,
    pub accuracy: Option<f64>,
    pub precision: Option<f64>,
    pub recall: Option<f64>,
    pub f1_score: Option<f64>,
    pub roc_auc: Option<f64>,
    pub training_time: Option<f64>,
    pub cv_mean: Option<f64>,
    pub cv_std: Option<f64>,
    pub best_params: String,
    pub error: Option<String>,
}

/// One of the top-three models with its composite score and reasoning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopModel {
    pub model: String,
    pub composite_score: f64,
    pub accuracy: f64,
    pub f1_score: f64,
    pub roc_auc: f64,
    pub cv_mean: f64,
    pub training_time: f64,
    pub best_params: String,
    pub reasons: Vec<String>,
    pub rank_medal: String,
}

/// Weights of the composite score used for top-three selection.
///
/// The defaults mirror the established 0.35/0.25/0.25/0.15 blend but are
/// deliberately configurable rather than baked in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CompositeWeights {
    pub accuracy: f64,
    pub f1: f64,
    pub roc_auc: f64,
    pub cv_mean: f64,
}

impl Default for CompositeWeights {
    fn default() -> Self {
        Self {
            accuracy: 0.35,
            f1: 0.25,
            roc_auc: 0.25,
            cv_mean: 0.15,
        }
    }
}

/// Results query response. When the job is not done, only `status` is
/// meaningful and the tables are empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsResponse {
    pub status: JobStatus,
    pub comparison: Vec<ComparisonRow>,
    pub ranked: Vec<RankedRow>,
    pub versions: Vec<String>,
    pub detailed_metrics: Vec<DetailedMetrics>,
    pub top_three: Vec<TopModel>,
}

impl ResultsResponse {
    /// A status-only response (job not done yet, or nothing trained).
    pub fn status_only(status: JobStatus) -> Self {
        Self {
            status,
            comparison: Vec::new(),
            ranked: Vec::new(),
            versions: Vec::new(),
            detailed_metrics: Vec::new(),
            top_three: Vec::new(),
        }
    }
}

/// Render a hyperparameter map for display ("None" when empty).
pub fn format_params(params: &HashMap<String, serde_json::Value>) -> String {
    if params.is_empty() {
        return "None".to_string();
    }
    let mut keys: Vec<&String> = params.keys().collect();
    keys.sort();
    let ordered: serde_json::Map<String, serde_json::Value> = keys
        .into_iter()
        .map(|k| (k.clone(), params[k].clone()))
        .collect();
    serde_json::to_string(&ordered).unwrap_or_else(|_| "None".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_preprocess_request_flattens_config() {
        let json = r#"{
            "numeric_impute": "median",
            "categorical_impute": "most_frequent",
            "scaling": "standard",
            "encoding": "one_hot",
            "outlier_action": "cap",
            "outlier_method": "iqr",
            "zscore_threshold": 3.0,
            "iqr_multiplier": 1.5,
            "auto_encoding_budget": 200,
            "test_fraction": 0.25,
            "target_column": "label"
        }"#;
        let request: PreprocessRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.target_column, "label");
        assert_eq!(request.config.test_fraction, 0.25);
    }

    #[test]
    fn test_train_request_to_config() {
        let request = TrainRequest::default();
        let config = request.to_config(7);
        assert_eq!(config.seed, 7);
        assert_eq!(config.models, request.models);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_format_params() {
        assert_eq!(format_params(&HashMap::new()), "None");
        let params = HashMap::from([
            ("n_estimators".to_string(), json!(100)),
            ("max_depth".to_string(), json!(10)),
        ]);
        let rendered = format_params(&params);
        assert!(rendered.contains("\"n_estimators\":100"));
        // Keys render in sorted order.
        assert!(rendered.starts_with("{\"max_depth\""));
    }

    #[test]
    fn test_composite_weights_default() {
        let weights = CompositeWeights::default();
        let total = weights.accuracy + weights.f1 + weights.roc_auc + weights.cv_mean;
        assert!((total - 1.0).abs() < 1e-12);
    }
}
