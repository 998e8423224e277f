//! Dataset profiling.
//!
//! Compact, serializable summaries of a loaded table: shape, missingness,
//! per-column schema, and the target-column heuristics the upload flow uses
//! to suggest what to predict.

use crate::error::{ProcessingError, Result};
use crate::utils::{class_counts, is_numeric_series, string_labels};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Column name fragments that suggest a label column.
const TARGET_NAME_HINTS: [&str; 4] = ["target", "label", "class", "y"];

/// Cardinality caps for the target-candidate heuristic.
const MAX_UNIQUE_RATIO: f64 = 0.2;
const MAX_UNIQUE_ABS: usize = 50;

/// A small, JSON-serializable dataset profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetProfile {
    pub rows: usize,
    pub cols: usize,
    pub missing_cells: usize,
    pub duplicate_rows: usize,
}

/// Schema entry for one column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub dtype: String,
    pub non_null: usize,
    pub missing_pct: f64,
    pub unique: usize,
    pub samples: Vec<String>,
}

/// Outcome of validating a column as a classification target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetValidation {
    pub ok: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub missing_target: usize,
    pub n_classes: usize,
    pub class_counts: HashMap<String, usize>,
}

/// Total number of missing cells in the dataset.
pub fn missing_cell_count(df: &DataFrame) -> usize {
    df.get_columns().iter().map(|c| c.null_count()).sum()
}

/// Number of rows that are exact duplicates of an earlier row.
pub fn duplicate_row_count(df: &DataFrame) -> Result<usize> {
    if df.height() == 0 {
        return Ok(0);
    }
    let mut seen: HashMap<String, ()> = HashMap::with_capacity(df.height());
    let mut duplicates = 0usize;
    let columns: Vec<Vec<Option<String>>> = df
        .get_columns()
        .iter()
        .map(|c| string_labels(c.as_materialized_series()))
        .collect::<PolarsResult<_>>()?;
    for row in 0..df.height() {
        let key = columns
            .iter()
            .map(|col| col[row].as_deref().unwrap_or("\u{0}"))
            .collect::<Vec<_>>()
            .join("\u{1}");
        if seen.insert(key, ()).is_some() {
            duplicates += 1;
        }
    }
    Ok(duplicates)
}

/// Columns with at most one distinct value (nulls included).
pub fn constant_columns(df: &DataFrame) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for column in df.get_columns() {
        let series = column.as_materialized_series();
        let mut unique = series.n_unique()?;
        // n_unique counts null as a distinct value only when present; fold it
        // in so an all-null column registers as constant too.
        if series.null_count() == series.len() {
            unique = 1;
        }
        if unique <= 1 {
            out.push(series.name().to_string());
        }
    }
    Ok(out)
}

/// Columns where every value is missing.
pub fn all_missing_columns(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|c| c.null_count() == c.len())
        .map(|c| c.name().to_string())
        .collect()
}

/// Return a compact schema/profile table for reporting.
pub fn dataset_schema(df: &DataFrame, sample_values: usize) -> Result<Vec<ColumnSchema>> {
    let n_rows = df.height();
    let mut out = Vec::with_capacity(df.width());
    for column in df.get_columns() {
        let series = column.as_materialized_series();
        let non_null = series.len() - series.null_count();
        let missing_pct = if n_rows == 0 {
            0.0
        } else {
            (1.0 - non_null as f64 / n_rows as f64) * 100.0
        };
        let samples = string_labels(series)?
            .into_iter()
            .flatten()
            .take(sample_values)
            .collect();
        out.push(ColumnSchema {
            name: series.name().to_string(),
            dtype: series.dtype().to_string(),
            non_null,
            missing_pct,
            unique: series.n_unique()?,
            samples,
        });
    }
    Ok(out)
}

/// Build the dataset-level profile.
pub fn dataset_profile(df: &DataFrame) -> Result<DatasetProfile> {
    Ok(DatasetProfile {
        rows: df.height(),
        cols: df.width(),
        missing_cells: missing_cell_count(df),
        duplicate_rows: duplicate_row_count(df)?,
    })
}

/// Suggest likely target columns.
///
/// Heuristics: 2 points when the column name contains a label-ish hint,
/// +1 point when cardinality is low (at most 50 distinct values, or at most
/// 20% of the row count). Only positively scored columns are returned,
/// ordered by score descending then name ascending.
pub fn infer_target_candidates(df: &DataFrame) -> Result<Vec<String>> {
    let n = df.height().max(1) as f64;
    let mut scored: Vec<(f64, String)> = Vec::new();

    for column in df.get_columns() {
        let name = column.name().to_string();
        let lower = name.to_lowercase();
        let name_score = if TARGET_NAME_HINTS.iter().any(|h| lower.contains(h)) {
            1.0
        } else {
            0.0
        };
        let unique = column.as_materialized_series().n_unique()?;
        let ratio = unique as f64 / n;
        let ratio_score = if unique <= MAX_UNIQUE_ABS || ratio <= MAX_UNIQUE_RATIO {
            1.0
        } else {
            0.0
        };
        let score = 2.0 * name_score + ratio_score;
        if score > 0.0 {
            scored.push((score, name));
        }
    }

    scored.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.1.cmp(&b.1))
    });
    Ok(scored.into_iter().map(|(_, name)| name).collect())
}

/// Validate a target column for classification.
///
/// Errors make the target unusable; warnings flag conditions (rare classes,
/// missing labels, very many classes) that degrade training quality but do
/// not block it.
pub fn validate_target_column(df: &DataFrame, target_column: &str) -> Result<TargetValidation> {
    let Ok(column) = df.column(target_column) else {
        return Ok(TargetValidation {
            ok: false,
            errors: vec![format!("Target column '{target_column}' not found.")],
            warnings: Vec::new(),
            missing_target: 0,
            n_classes: 0,
            class_counts: HashMap::new(),
        });
    };

    let series = column.as_materialized_series();
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let missing_target = series.null_count();
    if missing_target > 0 {
        warnings.push(format!(
            "Target has {missing_target} missing values; those rows may be dropped during training."
        ));
    }

    let counts = class_counts(series)?;
    let n_classes = counts.len();
    if n_classes < 2 {
        errors.push("Target must contain at least 2 classes for classification.".to_string());
    }

    let rare: Vec<String> = counts
        .iter()
        .filter(|(_, n)| *n < 2)
        .map(|(label, n)| format!("{label}({n})"))
        .collect();
    if !rare.is_empty() {
        warnings.push(format!(
            "Some classes have fewer than 2 samples: {}",
            rare.join(", ")
        ));
    }

    if n_classes > MAX_UNIQUE_ABS {
        warnings.push(format!(
            "Target has {n_classes} classes; this may be hard to model."
        ));
    }

    let ok = errors.is_empty();
    Ok(TargetValidation {
        ok,
        errors,
        warnings,
        missing_target,
        n_classes,
        class_counts: counts.into_iter().collect(),
    })
}

/// Validate the target or fail with [`ProcessingError::InvalidTarget`].
pub fn require_valid_target(df: &DataFrame, target_column: &str) -> Result<TargetValidation> {
    let validation = validate_target_column(df, target_column)?;
    if !validation.ok {
        return Err(ProcessingError::InvalidTarget {
            column: target_column.to_string(),
            reason: validation.errors.join("; "),
        });
    }
    Ok(validation)
}

/// True when the series is numeric, exposed for callers building column roles.
pub fn is_numeric_column(df: &DataFrame, name: &str) -> Result<bool> {
    let column = df
        .column(name)
        .map_err(|_| ProcessingError::ColumnNotFound(name.to_string()))?;
    Ok(is_numeric_series(column.as_materialized_series()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_df() -> DataFrame {
        df![
            "age" => [Some(25i64), Some(30), None, Some(40)],
            "income" => [50_000.0, 60_000.0, 55_000.0, 70_000.0],
            "label" => ["yes", "no", "yes", "yes"],
        ]
        .unwrap()
    }

    #[test]
    fn test_dataset_profile_counts() {
        let profile = dataset_profile(&sample_df()).unwrap();
        assert_eq!(profile.rows, 4);
        assert_eq!(profile.cols, 3);
        assert_eq!(profile.missing_cells, 1);
        assert_eq!(profile.duplicate_rows, 0);
    }

    #[test]
    fn test_duplicate_row_count() {
        let df = df![
            "a" => [1i64, 1, 2, 1],
            "b" => ["x", "x", "y", "x"],
        ]
        .unwrap();
        assert_eq!(duplicate_row_count(&df).unwrap(), 2);
    }

    #[test]
    fn test_constant_and_all_missing_columns() {
        let df = df![
            "const" => [1i64, 1, 1],
            "gone" => [Option::<&str>::None, None, None],
            "ok" => [1i64, 2, 3],
        ]
        .unwrap();
        let constant = constant_columns(&df).unwrap();
        assert!(constant.contains(&"const".to_string()));
        assert!(constant.contains(&"gone".to_string()));
        assert!(!constant.contains(&"ok".to_string()));
        assert_eq!(all_missing_columns(&df), vec!["gone".to_string()]);
    }

    #[test]
    fn test_infer_target_candidates_name_beats_cardinality() {
        let candidates = infer_target_candidates(&sample_df()).unwrap();
        // "label" scores 3 (name hint + low cardinality); the others score 1.
        assert_eq!(candidates[0], "label");
        // Ties sort by name ascending.
        assert_eq!(candidates[1], "age");
        assert_eq!(candidates[2], "income");
    }

    #[test]
    fn test_validate_target_column_happy_path() {
        let validation = validate_target_column(&sample_df(), "label").unwrap();
        assert!(validation.ok);
        assert_eq!(validation.n_classes, 2);
        assert_eq!(validation.class_counts["yes"], 3);
    }

    #[test]
    fn test_validate_target_column_missing() {
        let validation = validate_target_column(&sample_df(), "nope").unwrap();
        assert!(!validation.ok);
        assert!(validation.errors[0].contains("not found"));
    }

    #[test]
    fn test_validate_target_single_class_fails() {
        let df = df!["y" => ["a", "a", "a"]].unwrap();
        let validation = validate_target_column(&df, "y").unwrap();
        assert!(!validation.ok);
        assert!(require_valid_target(&df, "y").is_err());
    }

    #[test]
    fn test_rare_class_warning() {
        let df = df!["y" => ["a", "a", "b"]].unwrap();
        let validation = validate_target_column(&df, "y").unwrap();
        assert!(validation.ok);
        assert!(validation.warnings.iter().any(|w| w.contains("fewer than 2")));
    }

    #[test]
    fn test_dataset_schema() {
        let schema = dataset_schema(&sample_df(), 2).unwrap();
        assert_eq!(schema.len(), 3);
        let age = &schema[0];
        assert_eq!(age.name, "age");
        assert_eq!(age.non_null, 3);
        assert_eq!(age.samples.len(), 2);
        assert!((age.missing_pct - 25.0).abs() < 1e-9);
    }
}
