//! The training orchestrator.
//!
//! A state machine per session: `not_started -> running -> {done, error}`.
//! A training request flips the job to `running`, spawns the actual work on
//! a blocking background task and returns immediately; progress is observed
//! by polling the status. Failures inside the background routine transition
//! the job to `error` and never reach the triggering caller.

use crate::error::{Result, ServiceError};
use crate::state::{AppState, JobStatus, ResultVersion, TrainingJob};
use crate::types::{TrainAck, TrainRequest};
use std::sync::Arc;
use tabula_learning::run_search;
use tabula_processing::{shuffled_split, stratified_split, SplitSpec};
use tracing::{error, info, warn};

/// Seed for splits, fold assignment and stochastic models.
const TRAIN_SEED: u64 = 42;
/// Train fraction of the fallback shuffle split.
const FALLBACK_TRAIN_FRACTION: f64 = 0.8;

/// Drives background training jobs against the shared state.
#[derive(Clone)]
pub struct TrainingOrchestrator {
    state: Arc<AppState>,
}

impl TrainingOrchestrator {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Start a training run for a session.
    ///
    /// Transitions the job to `running` and returns an immediate
    /// acknowledgment; the work itself happens on a background task. A job
    /// already `running` is not interrupted and the competing request is
    /// rejected.
    pub fn start_training(&self, session_id: &str, request: TrainRequest) -> Result<TrainAck> {
        let config = request.to_config(TRAIN_SEED);
        config.validate().map_err(ServiceError::from)?;

        if !self.state.sessions.read().contains_key(session_id) {
            return Err(ServiceError::NotFound(format!(
                "Session {session_id} not found"
            )));
        }

        {
            let mut jobs = self.state.jobs.write();
            let job = jobs.entry(session_id.to_string()).or_default();
            if job.status == JobStatus::Running {
                return Err(ServiceError::Validation(
                    "Training is already in progress for this session".to_string(),
                ));
            }
            job.status = JobStatus::Running;
        }

        let state = self.state.clone();
        let id = session_id.to_string();
        tokio::task::spawn_blocking(move || run_training_job(state, id, request));

        Ok(TrainAck {
            message: "Training started".to_string(),
            status: JobStatus::Running,
        })
    }

    /// Current job status for a session; `not_started` when unknown.
    pub fn status(&self, session_id: &str) -> JobStatus {
        self.state
            .jobs
            .read()
            .get(session_id)
            .map(|job| job.status)
            .unwrap_or_default()
    }
}

/// Set a job's status, unless the job was evicted mid-run.
fn set_status(state: &AppState, session_id: &str, status: JobStatus) {
    let mut jobs = state.jobs.write();
    match jobs.get_mut(session_id) {
        Some(job) => job.status = status,
        None => warn!(session = %session_id, "job evicted mid-run, dropping status update"),
    }
}

/// The background training routine.
///
/// Every failure path lands in `error` status; nothing propagates out.
fn run_training_job(state: Arc<AppState>, session_id: String, request: TrainRequest) {
    let artifact = state.artifacts.read().get(&session_id).cloned();
    let Some(artifact) = artifact else {
        // The session may have been evicted while the request was in
        // flight; a missing artifact is a normal error transition.
        warn!(session = %session_id, "no preprocessed artifact found");
        set_status(&state, &session_id, JobStatus::Error);
        return;
    };

    // Stratified split first; fall back to a deterministic shuffle split so
    // training still proceeds on awkward class distributions.
    let split = stratified_split(
        &artifact.table,
        &artifact.target_column,
        &SplitSpec::Fraction(artifact.test_fraction),
        TRAIN_SEED,
    );
    let (train, test) = match split {
        Ok(pair) => pair,
        Err(e) => {
            warn!(session = %session_id, error = %e, "stratified split failed, falling back to random split");
            match shuffled_split(&artifact.table, FALLBACK_TRAIN_FRACTION, TRAIN_SEED) {
                Ok(pair) => pair,
                Err(e) => {
                    error!(session = %session_id, error = %e, "fallback split failed");
                    set_status(&state, &session_id, JobStatus::Error);
                    return;
                }
            }
        }
    };

    let config = request.to_config(TRAIN_SEED);
    match run_search(&train, &test, &artifact.target_column, &config, None) {
        Ok(outcome) => {
            let created_at = chrono::Utc::now().timestamp();
            let mut jobs = state.jobs.write();
            let Some(job) = jobs.get_mut(&session_id) else {
                warn!(session = %session_id, "job evicted mid-run, dropping results");
                return;
            };
            // Version keys are completion timestamps; suffix on collision
            // so no version is ever overwritten.
            let mut version = created_at.to_string();
            let mut n = 1;
            while job.versions.iter().any(|v| v.version == version) {
                version = format!("{created_at}-{n}");
                n += 1;
            }
            info!(session = %session_id, version = %version, "training finished");
            job.versions.push(ResultVersion {
                version,
                created_at,
                outcome,
                models_trained: request.models.clone(),
                cv_folds: request.cv_folds,
            });
            job.status = JobStatus::Done;
        }
        Err(e) => {
            error!(session = %session_id, error = %e, "training failed");
            set_status(&state, &session_id, JobStatus::Error);
        }
    }
}

/// Result versions of a session, newest first. Used by the aggregator.
pub(crate) fn sorted_versions(job: &TrainingJob) -> Vec<ResultVersion> {
    let mut versions = job.versions.clone();
    versions.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.version.cmp(&a.version))
    });
    versions
}
