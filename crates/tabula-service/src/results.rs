//! Results aggregation and ranking.
//!
//! Reads a session's latest (or a named) result version and produces the
//! comparison table, the ranked table, the detailed metrics, and the
//! composite-scored top three with human-readable justifications.

use crate::error::{Result, ServiceError};
use crate::state::{AppState, JobStatus};
use crate::train::sorted_versions;
use crate::types::{
    format_params, ComparisonRow, CompositeWeights, DetailedMetrics, RankedRow, ResultsResponse,
    TopModel,
};
use std::sync::Arc;
use tabula_learning::ModelReport;
use tracing::debug;

/// The fixed metric whitelist, in column order. Ranking falls back through
/// this order when the preferred metrics are absent.
const METRIC_WHITELIST: [&str; 7] = [
    "accuracy",
    "precision",
    "recall",
    "f1_score",
    "roc_auc",
    "training_time",
    "cv_mean",
];

const MEDALS: [&str; 3] = ["Best Model", "Second Best", "Third Best"];

/// Builds ranked summaries from stored result versions.
#[derive(Clone)]
pub struct ResultsService {
    state: Arc<AppState>,
    weights: CompositeWeights,
}

impl ResultsService {
    pub fn new(state: Arc<AppState>, weights: CompositeWeights) -> Self {
        Self { state, weights }
    }

    /// Fetch results for a session: the latest version, or a named one.
    ///
    /// Returns a status-only response while the job is not done. An unknown
    /// version is a not-found error.
    pub fn get_results(&self, session_id: &str, version: Option<&str>) -> Result<ResultsResponse> {
        let jobs = self.state.jobs.read();
        let Some(job) = jobs.get(session_id) else {
            return Ok(ResultsResponse::status_only(JobStatus::NotStarted));
        };
        if job.status != JobStatus::Done {
            return Ok(ResultsResponse::status_only(job.status));
        }

        let versions = sorted_versions(job);
        let available: Vec<String> = versions.iter().map(|v| v.version.clone()).collect();
        let selected = match version {
            Some(wanted) => versions
                .iter()
                .find(|v| v.version == wanted)
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Result version '{wanted}' not found"))
                })?,
            None => versions
                .first()
                .ok_or_else(|| ServiceError::NotFound("No result versions stored".to_string()))?,
        };

        let reports = &selected.outcome.reports;
        let comparison: Vec<ComparisonRow> = reports.iter().map(comparison_row).collect();
        let detailed_metrics: Vec<DetailedMetrics> = reports.iter().map(detailed_row).collect();
        let ranked = rank_rows(&comparison);
        let top_three = select_top_three(&detailed_metrics, &self.weights);

        Ok(ResultsResponse {
            status: JobStatus::Done,
            comparison,
            ranked,
            versions: available,
            detailed_metrics,
            top_three,
        })
    }
}

fn comparison_row(report: &ModelReport) -> ComparisonRow {
    ComparisonRow {
        model: report.model.clone(),
        accuracy: report.accuracy,
        precision: report.precision,
        recall: report.recall,
        f1_score: report.f1_score,
        roc_auc: report.roc_auc,
        training_time: Some(report.training_time),
        cv_mean: report.cv_mean,
    }
}

fn detailed_row(report: &ModelReport) -> DetailedMetrics {
    DetailedMetrics {
        model: report.model.clone(),
        accuracy: report.accuracy,
        precision: report.precision,
        recall: report.recall,
        f1_score: report.f1_score,
        roc_auc: report.roc_auc,
        training_time: Some(report.training_time),
        cv_mean: report.cv_mean,
        cv_std: report.cv_std,
        best_params: format_params(&report.best_params),
        error: report.error.clone(),
    }
}

fn metric_value(row: &ComparisonRow, metric: &str) -> Option<f64> {
    match metric {
        "accuracy" => row.accuracy,
        "precision" => row.precision,
        "recall" => row.recall,
        "f1_score" => row.f1_score,
        "roc_auc" => row.roc_auc,
        "training_time" => row.training_time,
        "cv_mean" => row.cv_mean,
        _ => None,
    }
}

/// Ranking metric: accuracy, falling back to F1, then the first whitelist
/// metric any row actually has.
fn pick_ranking_metric(rows: &[ComparisonRow]) -> &'static str {
    for preferred in ["accuracy", "f1_score"] {
        if rows.iter().any(|row| metric_value(row, preferred).is_some()) {
            return preferred;
        }
    }
    METRIC_WHITELIST
        .iter()
        .copied()
        .find(|metric| rows.iter().any(|row| metric_value(row, metric).is_some()))
        .unwrap_or("accuracy")
}

/// Sort descending by the chosen metric, missing values last, and annotate
/// with 1-based rank positions.
fn rank_rows(rows: &[ComparisonRow]) -> Vec<RankedRow> {
    let metric = pick_ranking_metric(rows);
    debug!(metric, "ranking models");
    let mut scored: Vec<(String, Option<f64>)> = rows
        .iter()
        .map(|row| (row.model.clone(), metric_value(row, metric)))
        .collect();
    scored.sort_by(|a, b| match (a.1, b.1) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(std::cmp::Ordering::Equal),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    scored
        .into_iter()
        .enumerate()
        .map(|(i, (model, score))| RankedRow {
            rank: i + 1,
            model,
            score,
        })
        .collect()
}

/// Composite-score the models and keep the top three with justifications.
fn select_top_three(rows: &[DetailedMetrics], weights: &CompositeWeights) -> Vec<TopModel> {
    let mut scored: Vec<TopModel> = rows
        .iter()
        .map(|row| {
            let accuracy = row.accuracy.unwrap_or(0.0);
            let f1 = row.f1_score.unwrap_or(0.0);
            let roc_auc = row.roc_auc.unwrap_or(0.0);
            let cv_mean = row.cv_mean.unwrap_or(0.0);
            let training_time = row.training_time.unwrap_or(0.0);

            let composite_score = accuracy * weights.accuracy
                + f1 * weights.f1
                + roc_auc * weights.roc_auc
                + cv_mean * weights.cv_mean;

            let mut reasons = Vec::new();
            if accuracy >= 0.9 {
                reasons.push(format!("High accuracy ({:.1}%)", accuracy * 100.0));
            }
            if f1 >= 0.9 {
                reasons.push(format!("Excellent F1-score ({f1:.4})"));
            }
            if roc_auc >= 0.95 {
                reasons.push(format!("Outstanding ROC-AUC ({roc_auc:.4})"));
            }
            if cv_mean >= 0.92 {
                reasons.push(format!("Strong cross-validation stability ({cv_mean:.4})"));
            }
            if training_time > 0.0 && training_time < 5.0 {
                reasons.push(format!("Fast training ({training_time:.2}s)"));
            }
            if reasons.is_empty() {
                reasons.push("Balanced performance across metrics".to_string());
            }

            TopModel {
                model: row.model.clone(),
                composite_score,
                accuracy,
                f1_score: f1,
                roc_auc,
                cv_mean,
                training_time,
                best_params: row.best_params.clone(),
                reasons,
                rank_medal: String::new(),
            }
        })
        .collect();

    scored.sort_by(|a, b| {
        b.composite_score
            .partial_cmp(&a.composite_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(3);
    for (i, model) in scored.iter_mut().enumerate() {
        model.rank_medal = MEDALS[i].to_string();
    }
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ResultVersion, TrainingJob};
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use tabula_learning::SearchOutcome;

    fn report(model: &str, accuracy: Option<f64>, f1: Option<f64>) -> ModelReport {
        ModelReport {
            model: model.to_string(),
            best_params: HashMap::new(),
            training_time: 1.0,
            cv_mean: None,
            cv_std: None,
            cv_folds: 5,
            accuracy,
            precision: None,
            recall: None,
            f1_score: f1,
            roc_auc: None,
            confusion_matrix: None,
            error: None,
        }
    }

    fn service_with_version(reports: Vec<ModelReport>) -> (ResultsService, String) {
        let state = Arc::new(AppState::new());
        let mut job = TrainingJob {
            status: JobStatus::Done,
            versions: vec![],
        };
        job.versions.push(ResultVersion {
            version: "100".to_string(),
            created_at: 100,
            outcome: SearchOutcome {
                classes: vec!["no".to_string(), "yes".to_string()],
                effective_cv: 5,
                reports,
            },
            models_trained: vec![],
            cv_folds: 5,
        });
        state.jobs.write().insert("s1".to_string(), job);
        (
            ResultsService::new(state, CompositeWeights::default()),
            "s1".to_string(),
        )
    }

    #[test]
    fn test_status_only_when_not_done() {
        let state = Arc::new(AppState::new());
        let service = ResultsService::new(state.clone(), CompositeWeights::default());
        let response = service.get_results("ghost", None).unwrap();
        assert_eq!(response.status, JobStatus::NotStarted);
        assert!(response.comparison.is_empty());

        state.jobs.write().insert(
            "s1".to_string(),
            TrainingJob {
                status: JobStatus::Running,
                versions: vec![],
            },
        );
        let response = service.get_results("s1", None).unwrap();
        assert_eq!(response.status, JobStatus::Running);
    }

    #[test]
    fn test_ranking_missing_values_last() {
        // Accuracy absent everywhere: ranking falls back to f1_score.
        let (service, id) = service_with_version(vec![
            report("A", None, Some(0.8)),
            report("B", None, None),
            report("C", None, Some(0.9)),
        ]);
        let response = service.get_results(&id, None).unwrap();
        let order: Vec<&str> = response.ranked.iter().map(|r| r.model.as_str()).collect();
        assert_eq!(order, vec!["C", "A", "B"]);
        assert_eq!(response.ranked[0].rank, 1);
        assert_eq!(response.ranked[2].score, None);
    }

    #[test]
    fn test_ranking_prefers_accuracy() {
        let (service, id) = service_with_version(vec![
            report("A", Some(0.7), Some(0.99)),
            report("B", Some(0.9), Some(0.1)),
        ]);
        let response = service.get_results(&id, None).unwrap();
        assert_eq!(response.ranked[0].model, "B");
    }

    #[test]
    fn test_composite_top_three_and_justifications() {
        let mut x = report("X", Some(0.95), Some(0.93));
        x.roc_auc = Some(0.97);
        x.cv_mean = Some(0.94);
        x.training_time = 1.2;
        let mut y = report("Y", Some(0.70), Some(0.65));
        y.roc_auc = Some(0.71);
        y.cv_mean = Some(0.69);
        y.training_time = 9.0;

        let (service, id) = service_with_version(vec![y, x]);
        let response = service.get_results(&id, None).unwrap();

        let top = &response.top_three;
        assert_eq!(top[0].model, "X");
        assert_eq!(top[0].rank_medal, "Best Model");
        assert!(top[0].composite_score > top[1].composite_score);
        assert!(top[0].reasons.iter().any(|r| r.starts_with("High accuracy")));
        assert!(top[0]
            .reasons
            .iter()
            .any(|r| r.starts_with("Outstanding ROC-AUC")));

        // Y triggers no threshold: balanced-performance fallback.
        assert_eq!(top[1].model, "Y");
        assert_eq!(
            top[1].reasons,
            vec!["Balanced performance across metrics".to_string()]
        );
    }

    #[test]
    fn test_unknown_version_is_not_found() {
        let (service, id) = service_with_version(vec![report("A", Some(0.9), None)]);
        let err = service.get_results(&id, Some("999")).unwrap_err();
        assert_eq!(err.error_code(), "NOT_FOUND");
    }

    #[test]
    fn test_named_version_selected() {
        let state = Arc::new(AppState::new());
        let make_version = |key: &str, ts: i64, model: &str| ResultVersion {
            version: key.to_string(),
            created_at: ts,
            outcome: SearchOutcome {
                classes: vec![],
                effective_cv: 5,
                reports: vec![report(model, Some(0.5), None)],
            },
            models_trained: vec![],
            cv_folds: 5,
        };
        state.jobs.write().insert(
            "s1".to_string(),
            TrainingJob {
                status: JobStatus::Done,
                versions: vec![make_version("100", 100, "Old"), make_version("200", 200, "New")],
            },
        );
        let service = ResultsService::new(state, CompositeWeights::default());

        // Default: latest. Named: the requested one.
        let latest = service.get_results("s1", None).unwrap();
        assert_eq!(latest.comparison[0].model, "New");
        assert_eq!(latest.versions, vec!["200".to_string(), "100".to_string()]);

        let named = service.get_results("s1", Some("100")).unwrap();
        assert_eq!(named.comparison[0].model, "Old");
    }

    #[test]
    fn test_whitelist_excludes_confusion_matrix() {
        let (service, id) = service_with_version(vec![report("A", Some(0.9), None)]);
        let response = service.get_results(&id, None).unwrap();
        let json = serde_json::to_value(&response.comparison[0]).unwrap();
        let keys: Vec<&String> = json.as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 8); // model + the 7 whitelisted metrics
        assert!(!json.as_object().unwrap().contains_key("confusion_matrix"));
    }
}
