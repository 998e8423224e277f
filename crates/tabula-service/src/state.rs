//! Shared application state.
//!
//! Three logical maps — sessions, preprocessed artifacts, training jobs —
//! each behind its own `parking_lot` lock. There are no cross-map
//! transactions: eviction removes an id from all three, but each removal is
//! only individually atomic. The maps are crate-private; callers go through
//! the store services, never the raw maps.

use parking_lot::RwLock;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::SystemTime;
use tabula_learning::{ModelKind, SearchOutcome};
use tabula_processing::{FittedTransform, TransformSpec};

/// A stored dataset plus its access metadata.
#[derive(Debug, Clone)]
pub struct SessionEntry {
    /// The owned table.
    pub table: DataFrame,
    /// Refreshed on every read; eviction keys off this.
    pub last_access: SystemTime,
}

/// The output of preprocessing, owned by exactly one session.
///
/// Overwritten on re-preprocessing: at most one live artifact per session.
#[derive(Debug, Clone)]
pub struct PreprocessedArtifact {
    /// Transformed table with the target column reattached.
    pub table: DataFrame,
    /// Refittable spec (config + column roles).
    pub spec: TransformSpec,
    /// Transform fitted on the full feature table.
    pub transform: FittedTransform,
    /// The designated target column.
    pub target_column: String,
    /// Configured holdout fraction.
    pub test_fraction: f64,
}

/// Training job lifecycle states. Monotonic within one run: a job never
/// regresses from done/error back to running without a fresh request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    NotStarted,
    Running,
    Done,
    Error,
}

/// One immutable snapshot of a completed training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultVersion {
    /// Version key: completion timestamp in seconds, suffixed on collision.
    pub version: String,
    /// Completion time (unix seconds).
    pub created_at: i64,
    /// The full per-model results.
    pub outcome: SearchOutcome,
    /// Which models were requested for this run.
    pub models_trained: Vec<ModelKind>,
    /// Requested fold count for this run.
    pub cv_folds: usize,
}

/// A session's training job: current status plus appended result versions.
#[derive(Debug, Clone, Default)]
pub struct TrainingJob {
    pub status: JobStatus,
    /// Append-only; versions are never mutated once pushed.
    pub versions: Vec<ResultVersion>,
}

/// Global shared state, one instance per process.
///
/// All fields are wrapped in `RwLock` from `parking_lot` for safe
/// concurrent access from request handlers and background training tasks.
#[derive(Default)]
pub struct AppState {
    /// Session id -> stored dataset + access time.
    pub(crate) sessions: RwLock<HashMap<String, SessionEntry>>,

    /// Session id -> the single live preprocessed artifact.
    pub(crate) artifacts: RwLock<HashMap<String, PreprocessedArtifact>>,

    /// Session id -> training job status and result versions.
    pub(crate) jobs: RwLock<HashMap<String, TrainingJob>>,
}

impl AppState {
    /// Creates empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked sessions (for housekeeping/metrics callers).
    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_status_serialization() {
        assert_eq!(
            serde_json::to_string(&JobStatus::NotStarted).unwrap(),
            "\"not_started\""
        );
        assert_eq!(serde_json::to_string(&JobStatus::Running).unwrap(), "\"running\"");
        assert_eq!(serde_json::to_string(&JobStatus::Done).unwrap(), "\"done\"");
        assert_eq!(serde_json::to_string(&JobStatus::Error).unwrap(), "\"error\"");
    }

    #[test]
    fn test_default_job_is_not_started() {
        let job = TrainingJob::default();
        assert_eq!(job.status, JobStatus::NotStarted);
        assert!(job.versions.is_empty());
    }
}
