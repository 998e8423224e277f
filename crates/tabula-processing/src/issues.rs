//! Data-quality issue detection.
//!
//! Scans a table for the problems that most often derail classification
//! runs: missing values, outliers, class imbalance, high-cardinality
//! categoricals, and constant features. Each finding carries a severity and
//! suggested fixes so callers can surface them for user approval before
//! preprocessing.

use crate::error::Result;
use crate::utils::{as_f64, class_counts, is_numeric_series, iqr_bounds, mean_std, string_labels};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;

/// Severity of a detected issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// One detected data-quality issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueFinding {
    pub key: String,
    pub title: String,
    pub severity: Severity,
    pub description: String,
    pub affected_columns: Vec<String>,
    pub metrics: HashMap<String, serde_json::Value>,
    pub suggested_fixes: Vec<String>,
}

/// Thresholds controlling issue severity classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueThresholds {
    pub missing_pct_warning: f64,
    pub missing_pct_critical: f64,
    pub outlier_pct_warning: f64,
    pub outlier_pct_critical: f64,
    pub class_imbalance_ratio: f64,
    pub high_cardinality_ratio: f64,
    pub constant_top_frequency: f64,
    pub zscore_threshold: f64,
}

impl Default for IssueThresholds {
    fn default() -> Self {
        Self {
            missing_pct_warning: 5.0,
            missing_pct_critical: 30.0,
            outlier_pct_warning: 1.0,
            outlier_pct_critical: 10.0,
            class_imbalance_ratio: 0.7,
            high_cardinality_ratio: 0.1,
            constant_top_frequency: 0.95,
            zscore_threshold: 3.0,
        }
    }
}

fn severity_for_pct(worst_pct: f64, warning: f64, critical: f64) -> Severity {
    if worst_pct >= critical {
        Severity::Critical
    } else if worst_pct >= warning {
        Severity::Warning
    } else {
        Severity::Info
    }
}

/// Missing counts per column, only columns that have any.
pub fn detect_missing_values(df: &DataFrame) -> HashMap<String, usize> {
    df.get_columns()
        .iter()
        .filter(|c| c.null_count() > 0)
        .map(|c| (c.name().to_string(), c.null_count()))
        .collect()
}

/// Outlier counts per numeric column under the IQR rule.
///
/// Columns with a zero or non-finite IQR are skipped; with no spread the
/// rule would flag everything off the single common value.
pub fn detect_outliers_iqr(df: &DataFrame) -> Result<HashMap<String, usize>> {
    let mut out = HashMap::new();
    for column in df.get_columns() {
        let series = column.as_materialized_series();
        if !is_numeric_series(series) {
            continue;
        }
        let Some((lb, ub)) = iqr_bounds(series, 1.5)? else {
            continue;
        };
        if lb == ub {
            continue;
        }
        let count = as_f64(series)?
            .into_iter()
            .flatten()
            .filter(|v| *v < lb || *v > ub)
            .count();
        if count > 0 {
            out.insert(series.name().to_string(), count);
        }
    }
    Ok(out)
}

/// Outlier counts per numeric column under z-score thresholding.
pub fn detect_outliers_zscore(df: &DataFrame, threshold: f64) -> Result<HashMap<String, usize>> {
    let mut out = HashMap::new();
    for column in df.get_columns() {
        let series = column.as_materialized_series();
        if !is_numeric_series(series) {
            continue;
        }
        let Some((mean, std)) = mean_std(series)? else {
            continue;
        };
        if std == 0.0 || !std.is_finite() {
            continue;
        }
        let count = as_f64(series)?
            .into_iter()
            .flatten()
            .filter(|v| ((v - mean) / std).abs() > threshold)
            .count();
        if count > 0 {
            out.insert(series.name().to_string(), count);
        }
    }
    Ok(out)
}

/// Classes whose frequency exceeds the imbalance ratio.
pub fn detect_class_imbalance(
    df: &DataFrame,
    target_column: &str,
    ratio: f64,
) -> Result<HashMap<String, f64>> {
    let Ok(column) = df.column(target_column) else {
        return Ok(HashMap::new());
    };
    if df.height() == 0 {
        return Ok(HashMap::new());
    }
    let counts = class_counts(column.as_materialized_series())?;
    let total: usize = counts.iter().map(|(_, n)| n).sum();
    if total == 0 {
        return Ok(HashMap::new());
    }
    Ok(counts
        .into_iter()
        .map(|(label, n)| (label, n as f64 / total as f64))
        .filter(|(_, freq)| *freq > ratio)
        .collect())
}

/// Non-numeric columns whose unique ratio exceeds the threshold.
pub fn detect_high_cardinality(df: &DataFrame, ratio: f64) -> Result<Vec<String>> {
    let n = df.height().max(1) as f64;
    let mut out = Vec::new();
    for column in df.get_columns() {
        let series = column.as_materialized_series();
        if is_numeric_series(series) {
            continue;
        }
        let unique = series.drop_nulls().n_unique()?;
        if unique as f64 / n > ratio {
            out.push(series.name().to_string());
        }
    }
    Ok(out)
}

/// Columns where a single value covers more than the threshold fraction.
pub fn detect_constant_features(df: &DataFrame, top_frequency: f64) -> Result<Vec<String>> {
    let n = df.height();
    if n == 0 {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    for column in df.get_columns() {
        let series = column.as_materialized_series();
        let mut counts: HashMap<String, usize> = HashMap::new();
        for label in string_labels(series)? {
            *counts.entry(label.unwrap_or_default()).or_insert(0) += 1;
        }
        let top = counts.values().copied().max().unwrap_or(0);
        if top as f64 / n as f64 > top_frequency {
            out.push(series.name().to_string());
        }
    }
    Ok(out)
}

/// Detect issues and return a structured list of findings.
pub fn detect_issues(
    df: &DataFrame,
    target_column: &str,
    thresholds: &IssueThresholds,
) -> Result<Vec<IssueFinding>> {
    let mut findings = Vec::new();
    let n_rows = df.height().max(1) as f64;

    let missing = detect_missing_values(df);
    if !missing.is_empty() {
        let worst_pct = missing
            .values()
            .map(|c| *c as f64 / n_rows * 100.0)
            .fold(0.0, f64::max);
        let mut affected: Vec<String> = missing.keys().cloned().collect();
        affected.sort();
        findings.push(IssueFinding {
            key: "missing_values".to_string(),
            title: "Missing values".to_string(),
            severity: severity_for_pct(
                worst_pct,
                thresholds.missing_pct_warning,
                thresholds.missing_pct_critical,
            ),
            description: "Some columns contain missing values.".to_string(),
            affected_columns: affected,
            metrics: HashMap::from([
                ("worst_missing_pct".to_string(), json!(worst_pct)),
                (
                    "total_missing_cells".to_string(),
                    json!(missing.values().sum::<usize>()),
                ),
            ]),
            suggested_fixes: vec![
                "Impute numeric features using median/mean; categorical using most frequent."
                    .to_string(),
                "If a column is mostly missing, consider dropping it.".to_string(),
            ],
        });
    }

    for (key, title, outliers) in [
        (
            "outliers_iqr",
            "Outliers (IQR)",
            detect_outliers_iqr(df)?,
        ),
        (
            "outliers_zscore",
            "Outliers (Z-score)",
            detect_outliers_zscore(df, thresholds.zscore_threshold)?,
        ),
    ] {
        if outliers.is_empty() {
            continue;
        }
        let worst_pct = outliers
            .values()
            .map(|c| *c as f64 / n_rows * 100.0)
            .fold(0.0, f64::max);
        let mut affected: Vec<String> = outliers.keys().cloned().collect();
        affected.sort();
        findings.push(IssueFinding {
            key: key.to_string(),
            title: title.to_string(),
            severity: severity_for_pct(
                worst_pct,
                thresholds.outlier_pct_warning,
                thresholds.outlier_pct_critical,
            ),
            description: "Numeric columns contain outliers.".to_string(),
            affected_columns: affected,
            metrics: HashMap::from([("worst_outlier_pct".to_string(), json!(worst_pct))]),
            suggested_fixes: vec![
                "Cap outliers using IQR bounds.".to_string(),
                "Alternatively remove outlier rows with domain justification.".to_string(),
            ],
        });
    }

    let dominant = detect_class_imbalance(df, target_column, thresholds.class_imbalance_ratio)?;
    if !dominant.is_empty() {
        let max_ratio = dominant.values().copied().fold(0.0, f64::max);
        findings.push(IssueFinding {
            key: "class_imbalance".to_string(),
            title: "Class imbalance".to_string(),
            severity: if max_ratio < 0.9 {
                Severity::Warning
            } else {
                Severity::Critical
            },
            description: "The target distribution is imbalanced; accuracy can be misleading."
                .to_string(),
            affected_columns: vec![target_column.to_string()],
            metrics: HashMap::from([
                ("max_class_ratio".to_string(), json!(max_ratio)),
                ("dominant_classes".to_string(), json!(dominant)),
            ]),
            suggested_fixes: vec![
                "Use weighted F1-score as the primary metric.".to_string(),
                "Enable automatic class weighting for models that support it.".to_string(),
            ],
        });
    }

    let high_card = detect_high_cardinality(df, thresholds.high_cardinality_ratio)?;
    if !high_card.is_empty() {
        let mut affected = high_card;
        affected.sort();
        findings.push(IssueFinding {
            key: "high_cardinality".to_string(),
            title: "High-cardinality categoricals".to_string(),
            severity: Severity::Warning,
            description:
                "Some categorical features have many unique values (can explode one-hot features)."
                    .to_string(),
            affected_columns: affected,
            metrics: HashMap::from([(
                "threshold_ratio".to_string(),
                json!(thresholds.high_cardinality_ratio),
            )]),
            suggested_fixes: vec![
                "Prefer auto encoding, which avoids huge one-hot expansions.".to_string(),
                "Consider dropping ID-like columns or grouping rare categories.".to_string(),
            ],
        });
    }

    let constant = detect_constant_features(df, thresholds.constant_top_frequency)?;
    if !constant.is_empty() {
        let mut affected = constant;
        affected.sort();
        findings.push(IssueFinding {
            key: "constant_features".to_string(),
            title: "Constant / near-constant features".to_string(),
            severity: Severity::Info,
            description: "Some features are almost always the same value and add little signal."
                .to_string(),
            affected_columns: affected,
            metrics: HashMap::from([(
                "threshold".to_string(),
                json!(thresholds.constant_top_frequency),
            )]),
            suggested_fixes: vec!["Drop these features before training.".to_string()],
        });
    }

    Ok(findings)
}
