//! Session lifecycle and asynchronous training orchestration.
//!
//! The stateful core of the AutoML service: an in-memory session store with
//! time-based eviction, a sliding-window rate limiter, the preprocessing
//! artifact store, a background training orchestrator with a per-session
//! status state machine, and the results aggregator/ranker.
//!
//! Request routing, payload validation, report rendering and presentation
//! live outside this crate; it exposes typed operations an HTTP (or any
//! other) front end can map onto.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use tabula_service::{Engine, EngineConfig, PreprocessRequest, TrainRequest};
//!
//! let engine = Engine::new(EngineConfig::default())?;
//!
//! let upload = engine.sessions.admit(&csv_bytes)?;
//! engine.preprocess.apply(&upload.session_id, &PreprocessRequest {
//!     config: Default::default(),
//!     target_column: upload.target_candidates[0].clone(),
//! })?;
//! engine.training.start_training(&upload.session_id, TrainRequest::default())?;
//!
//! // ... poll ...
//! let status = engine.training.status(&upload.session_id);
//! let results = engine.results.get_results(&upload.session_id, None)?;
//! ```

pub mod error;
pub mod preprocess;
pub mod rate_limit;
pub mod results;
pub mod session;
pub mod state;
pub mod train;
pub mod types;

pub use error::{Result as ServiceResult, ServiceError};
pub use preprocess::PreprocessService;
pub use rate_limit::{RateLimiter, DEFAULT_REQUESTS_PER_MINUTE};
pub use results::ResultsService;
pub use session::{SessionStore, SessionSummary, UploadOutcome};
pub use state::{AppState, JobStatus, PreprocessedArtifact, ResultVersion, TrainingJob};
pub use train::TrainingOrchestrator;
pub use types::{
    ComparisonRow, CompositeWeights, DetailedMetrics, PreprocessRequest, PreprocessResponse,
    RankedRow, ResultsResponse, TopModel, TrainAck, TrainRequest,
};

use std::path::PathBuf;
use std::sync::Arc;

/// Engine construction parameters.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory for best-effort raw-upload persistence.
    pub data_dir: PathBuf,
    /// Rate-limiter capacity per client per minute; must be positive.
    pub requests_per_minute: usize,
    /// Composite-score weights for the top-three selection.
    pub composite_weights: CompositeWeights,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/datasets"),
            requests_per_minute: DEFAULT_REQUESTS_PER_MINUTE,
            composite_weights: CompositeWeights::default(),
        }
    }
}

/// The assembled engine: one shared state, one service per concern.
pub struct Engine {
    pub sessions: SessionStore,
    pub preprocess: PreprocessService,
    pub training: TrainingOrchestrator,
    pub results: ResultsService,
    pub rate_limiter: RateLimiter,
    state: Arc<AppState>,
}

impl Engine {
    /// Assemble the engine around fresh shared state.
    pub fn new(config: EngineConfig) -> ServiceResult<Self> {
        let state = Arc::new(AppState::new());
        let sessions = SessionStore::new(state.clone(), config.data_dir);
        Ok(Self {
            preprocess: PreprocessService::new(state.clone(), sessions.clone()),
            training: TrainingOrchestrator::new(state.clone()),
            results: ResultsService::new(state.clone(), config.composite_weights),
            rate_limiter: RateLimiter::new(config.requests_per_minute)?,
            sessions,
            state,
        })
    }

    /// Run an eviction sweep; callable opportunistically on any request.
    pub fn evict(&self, max_age_hours: i64) -> usize {
        self.sessions.evict(max_age_hours)
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.state.session_count()
    }
}
