//! Pipeline orchestration.
//!
//! Runs the full preprocessing contract against a table: outlier handling on
//! non-target numeric columns, then imputation, scaling and encoding through
//! the fitted transform, with the target column reattached unchanged.

use crate::config::PreprocessConfig;
use crate::error::{ProcessingError, Result};
use crate::pipeline::outliers::{handle_outliers, OutlierSummary};
use crate::pipeline::transform::{FittedTransform, TransformSpec};
use crate::profiler::missing_cell_count;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Before/after summary of a preprocessing run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffSummary {
    pub original_shape: (usize, usize),
    pub processed_shape: (usize, usize),
    pub original_missing: usize,
    pub processed_missing: usize,
    pub missing_reduction: i64,
    pub rows_removed: usize,
    pub values_capped: usize,
}

/// Everything a preprocessing run produces.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// Transformed table with the target column reattached unchanged.
    pub table: DataFrame,
    /// The unfitted spec (config + column roles), refittable per CV fold.
    pub spec: TransformSpec,
    /// The transform fitted on the full feature table.
    pub transform: FittedTransform,
    /// What outlier handling did.
    pub outliers: OutlierSummary,
    /// Shape/missingness diff for the caller.
    pub diff: DiffSummary,
}

/// Run the preprocessing pipeline.
///
/// Fails with a validation error when the dataset is empty, the target
/// column is absent (or lost to outlier row removal), or no feature columns
/// remain after removing the target.
pub fn run_pipeline(
    df: &DataFrame,
    target_column: &str,
    config: &PreprocessConfig,
) -> Result<PipelineOutcome> {
    if df.height() == 0 {
        return Err(ProcessingError::InvalidData("Dataset is empty".to_string()));
    }
    if df.column(target_column).is_err() {
        return Err(ProcessingError::ColumnNotFound(target_column.to_string()));
    }

    let original_shape = (df.height(), df.width());
    let original_missing = missing_cell_count(df);

    // Outliers first, never touching the target.
    let (cleaned, outlier_summary) = handle_outliers(df, config, &[target_column])?;
    if cleaned.column(target_column).is_err() {
        return Err(ProcessingError::InvalidData(
            "Target column removed during outlier handling".to_string(),
        ));
    }
    if cleaned.height() == 0 {
        return Err(ProcessingError::InvalidData(
            "No rows remain after outlier removal".to_string(),
        ));
    }

    let target = cleaned
        .column(target_column)?
        .as_materialized_series()
        .clone();
    let features = cleaned.drop(target_column)?;
    if features.width() == 0 {
        return Err(ProcessingError::InvalidData(
            "No feature columns remain after removing the target column".to_string(),
        ));
    }

    let spec = TransformSpec::from_features(&features, config);
    let (transform, mut table) = spec.fit_transform(&features)?;
    table.with_column(target)?;

    let diff = DiffSummary {
        original_shape,
        processed_shape: (table.height(), table.width()),
        original_missing,
        processed_missing: missing_cell_count(&table),
        missing_reduction: original_missing as i64 - missing_cell_count(&table) as i64,
        rows_removed: outlier_summary.rows_removed,
        values_capped: outlier_summary.values_capped,
    };

    info!(
        rows = table.height(),
        cols = table.width(),
        rows_removed = diff.rows_removed,
        values_capped = diff.values_capped,
        "preprocessing pipeline finished"
    );

    Ok(PipelineOutcome {
        table,
        spec,
        transform,
        outliers: outlier_summary,
        diff,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OutlierAction, PreprocessConfig};
    use pretty_assertions::assert_eq;

    fn sample_df() -> DataFrame {
        df![
            "age" => [Some(25.0), Some(30.0), None, Some(40.0), Some(35.0)],
            "city" => ["ams", "rot", "ams", "utr", "ams"],
            "label" => ["yes", "no", "yes", "no", "yes"],
        ]
        .unwrap()
    }

    #[test]
    fn test_pipeline_happy_path() {
        let outcome = run_pipeline(&sample_df(), "label", &PreprocessConfig::default()).unwrap();

        assert_eq!(outcome.table.height(), 5);
        // age + 3 one-hot city columns + label
        assert_eq!(outcome.table.width(), 5);
        assert_eq!(outcome.diff.processed_missing, 0);
        assert_eq!(outcome.diff.missing_reduction, 1);

        // Target reattached unchanged.
        let label = outcome.table.column("label").unwrap();
        assert_eq!(label.str().unwrap().get(0), Some("yes"));
    }

    #[test]
    fn test_pipeline_empty_dataset() {
        let df = DataFrame::empty();
        let err = run_pipeline(&df, "label", &PreprocessConfig::default()).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_DATA");
    }

    #[test]
    fn test_pipeline_missing_target() {
        let err = run_pipeline(&sample_df(), "nope", &PreprocessConfig::default()).unwrap_err();
        assert_eq!(err.error_code(), "COLUMN_NOT_FOUND");
    }

    #[test]
    fn test_pipeline_no_features() {
        let df = df!["label" => ["a", "b"]].unwrap();
        let err = run_pipeline(&df, "label", &PreprocessConfig::default()).unwrap_err();
        assert!(err.to_string().contains("No feature columns"));
    }

    #[test]
    fn test_pipeline_outlier_removal_flows_into_diff() {
        let df = df![
            "v" => [0.0, 0.0, 0.0, 0.0, 100.0],
            "label" => ["a", "a", "b", "b", "a"],
        ]
        .unwrap();
        let config = PreprocessConfig::builder()
            .outlier_action(OutlierAction::Remove)
            .build()
            .unwrap();
        let outcome = run_pipeline(&df, "label", &config).unwrap();
        assert_eq!(outcome.diff.rows_removed, 1);
        assert_eq!(outcome.table.height(), 4);
    }

    #[test]
    fn test_pipeline_spec_is_refittable() {
        let outcome = run_pipeline(&sample_df(), "label", &PreprocessConfig::default()).unwrap();
        let features = sample_df().drop("label").unwrap();
        let refit = outcome.spec.fit(&features).unwrap();
        assert_eq!(refit.feature_names(), outcome.transform.feature_names());
    }
}
