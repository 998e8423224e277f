//! Tabular data processing for ML pipelines.
//!
//! Profiling, issue detection and preprocessing built on Polars.
//!
//! # Overview
//!
//! This library provides the data-side half of an AutoML workflow:
//!
//! - **Profiling**: shape/missingness summaries, per-column schema, and a
//!   target-column suggestion heuristic for freshly uploaded tables
//! - **Issue detection**: severity-tagged findings for missing values,
//!   outliers, class imbalance, high-cardinality categoricals and constant
//!   features
//! - **Preprocessing**: outlier handling, imputation, scaling and encoding
//!   as a reusable fit/apply transform
//! - **Split validation**: stratified train/test feasibility checks and a
//!   seeded splitter
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use tabula_processing::{run_pipeline, PreprocessConfig, SplitSpec};
//!
//! let config = PreprocessConfig::builder()
//!     .outlier_action(OutlierAction::Cap)
//!     .encoding(Encoding::Auto)
//!     .build()?;
//!
//! let outcome = run_pipeline(&df, "label", &config)?;
//! let (train, test) = tabula_processing::stratified_split(
//!     &outcome.table, "label", &SplitSpec::Fraction(0.2), 42,
//! )?;
//! ```

pub mod config;
pub mod error;
pub mod issues;
pub mod pipeline;
pub mod profiler;
pub mod split;
pub mod utils;

// Re-exports for convenient access
pub use config::{
    CategoricalImpute, ConfigValidationError, Encoding, NumericImpute, OutlierAction,
    OutlierMethod, PreprocessConfig, PreprocessConfigBuilder, Scaling,
};
pub use error::{ProcessingError, Result as ProcessingResult, ResultExt};
pub use issues::{detect_issues, IssueFinding, IssueThresholds, Severity};
pub use pipeline::{
    handle_outliers, run_pipeline, DiffSummary, FittedTransform, OutlierSummary, PipelineOutcome,
    ResolvedEncoding, TransformSpec,
};
pub use profiler::{
    dataset_profile, dataset_schema, infer_target_candidates, require_valid_target,
    validate_target_column, ColumnSchema, DatasetProfile, TargetValidation,
};
pub use split::{shuffled_split, stratified_split, validate_split, SplitCounts, SplitSpec};
