//! Automated classifier training for tabular data.
//!
//! A registry of compiled-in classifiers, hyperparameter search under
//! stratified cross-validation, and holdout evaluation with the standard
//! classification metrics.
//!
//! # Overview
//!
//! - [`ModelKind`]: the fixed registry of classifier kinds, each with a
//!   small hyperparameter grid and an availability tag
//! - [`TrainConfig`]: which models to train, the search strategy, fold
//!   count, scoring metric and seed
//! - [`run_search`]: trains every requested model (in parallel, failures
//!   isolated per model) and evaluates the winners on a holdout set
//! - [`SearchOutcome`] / [`ModelReport`]: per-model hyperparameters, CV
//!   mean/std, timing, holdout metrics and an optional error message
//!
//! # Example
//!
//! ```rust,ignore
//! use tabula_learning::{run_search, ModelKind, TrainConfig};
//!
//! let config = TrainConfig {
//!     models: vec![ModelKind::LogisticRegression, ModelKind::RandomForest],
//!     cv_folds: 5,
//!     ..TrainConfig::default()
//! };
//! let outcome = run_search(&train, &test, "label", &config, None)?;
//! for report in &outcome.reports {
//!     println!("{}: accuracy {:?}", report.model, report.accuracy);
//! }
//! ```

pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod registry;
pub mod search;
pub mod types;

// Re-exports for convenient access
pub use config::{ScoringMetric, SearchStrategy, TrainConfig};
pub use error::{LearningError, Result as LearningResult};
pub use metrics::{
    accuracy, confusion_matrix, precision_recall_f1, roc_auc_binary, roc_auc_weighted_ovr,
    Averaging,
};
pub use models::{build_model, Classifier, ModelOptions};
pub use registry::{ModelKind, ParamMap};
pub use search::run_search;
pub use types::{ModelReport, SearchOutcome};
