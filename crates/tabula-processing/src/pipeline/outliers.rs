//! Outlier handling.
//!
//! Cap clips numeric columns to their IQR-derived bounds; remove drops any
//! row flagged by the configured detection rule. The target column is always
//! excluded so label distributions survive cleaning.

use crate::config::{OutlierAction, OutlierMethod, PreprocessConfig};
use crate::error::Result;
use crate::utils::{as_f64, iqr_bounds, is_numeric_series, mean_std};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Summary of what outlier handling did to a table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlierSummary {
    pub action: OutlierAction,
    pub method: OutlierMethod,
    pub numeric_columns: Vec<String>,
    pub rows_before: usize,
    pub rows_after: usize,
    pub rows_removed: usize,
    pub values_capped: usize,
}

/// Numeric column names, minus the excluded ones.
fn numeric_feature_columns(df: &DataFrame, exclude: &[&str]) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|c| is_numeric_series(c.as_materialized_series()))
        .map(|c| c.name().to_string())
        .filter(|name| !exclude.contains(&name.as_str()))
        .collect()
}

/// Apply the configured outlier handling, returning the new table and a
/// summary of the changes.
pub fn handle_outliers(
    df: &DataFrame,
    config: &PreprocessConfig,
    exclude: &[&str],
) -> Result<(DataFrame, OutlierSummary)> {
    let numeric_columns = numeric_feature_columns(df, exclude);
    let rows_before = df.height();
    let mut summary = OutlierSummary {
        action: config.outlier_action,
        method: config.outlier_method,
        numeric_columns: numeric_columns.clone(),
        rows_before,
        rows_after: rows_before,
        rows_removed: 0,
        values_capped: 0,
    };

    if config.outlier_action == OutlierAction::None || rows_before == 0 || numeric_columns.is_empty()
    {
        return Ok((df.clone(), summary));
    }

    match config.outlier_action {
        OutlierAction::Cap => {
            let mut capped = df.clone();
            let mut values_capped = 0usize;
            for name in &numeric_columns {
                let series = capped.column(name)?.as_materialized_series().clone();
                let Some((lb, ub)) = iqr_bounds(&series, config.iqr_multiplier)? else {
                    continue;
                };
                let chunked = as_f64(&series)?;
                values_capped += (&chunked)
                    .into_iter()
                    .flatten()
                    .filter(|v| *v < lb || *v > ub)
                    .count();
                let clipped = chunked.apply(|v| v.map(|val| val.clamp(lb, ub)));
                capped.replace(name, clipped.into_series())?;
            }
            summary.values_capped = values_capped;
            debug!(values_capped, "capped outliers at IQR bounds");
            Ok((capped, summary))
        }
        OutlierAction::Remove => {
            let mask = match config.outlier_method {
                OutlierMethod::Iqr => {
                    row_outlier_mask_iqr(df, &numeric_columns, config.iqr_multiplier)?
                }
                OutlierMethod::ZScore => {
                    row_outlier_mask_zscore(df, &numeric_columns, config.zscore_threshold)?
                }
            };
            let keep: BooleanChunked = mask.iter().map(|flagged| !flagged).collect();
            let kept = df.filter(&keep)?;
            summary.rows_after = kept.height();
            summary.rows_removed = rows_before - kept.height();
            debug!(rows_removed = summary.rows_removed, "removed outlier rows");
            Ok((kept, summary))
        }
        OutlierAction::None => unreachable!("handled above"),
    }
}

/// Per-row flag: true when any numeric column violates its IQR bounds.
/// Null values are never flagged.
fn row_outlier_mask_iqr(
    df: &DataFrame,
    numeric_columns: &[String],
    multiplier: f64,
) -> Result<Vec<bool>> {
    let mut mask = vec![false; df.height()];
    for name in numeric_columns {
        let series = df.column(name)?.as_materialized_series().clone();
        let Some((lb, ub)) = iqr_bounds(&series, multiplier)? else {
            continue;
        };
        for (i, value) in as_f64(&series)?.into_iter().enumerate() {
            if let Some(v) = value {
                if v < lb || v > ub {
                    mask[i] = true;
                }
            }
        }
    }
    Ok(mask)
}

/// Per-row flag: true when any numeric column has |z| above the threshold.
/// Columns with zero spread are skipped.
fn row_outlier_mask_zscore(
    df: &DataFrame,
    numeric_columns: &[String],
    threshold: f64,
) -> Result<Vec<bool>> {
    let mut mask = vec![false; df.height()];
    for name in numeric_columns {
        let series = df.column(name)?.as_materialized_series().clone();
        let Some((mean, std)) = mean_std(&series)? else {
            continue;
        };
        if std == 0.0 {
            continue;
        }
        for (i, value) in as_f64(&series)?.into_iter().enumerate() {
            if let Some(v) = value {
                if ((v - mean) / std).abs() > threshold {
                    mask[i] = true;
                }
            }
        }
    }
    Ok(mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PreprocessConfig;

    fn config(action: OutlierAction, method: OutlierMethod) -> PreprocessConfig {
        PreprocessConfig::builder()
            .outlier_action(action)
            .outlier_method(method)
            .build()
            .unwrap()
    }

    #[test]
    fn test_no_action_returns_clone() {
        let df = df!["v" => [1.0, 2.0, 100.0]].unwrap();
        let (out, summary) =
            handle_outliers(&df, &config(OutlierAction::None, OutlierMethod::Iqr), &[]).unwrap();
        assert_eq!(out.height(), 3);
        assert_eq!(summary.rows_removed, 0);
        assert_eq!(summary.values_capped, 0);
    }

    #[test]
    fn test_cap_single_extreme_value() {
        // Zero IQR: bounds collapse to [0, 0] and the 100 gets clipped.
        let df = df!["v" => [0.0, 0.0, 0.0, 0.0, 100.0]].unwrap();
        let (out, summary) =
            handle_outliers(&df, &config(OutlierAction::Cap, OutlierMethod::Iqr), &[]).unwrap();
        assert_eq!(summary.values_capped, 1);
        assert_eq!(out.height(), 5);
        let max = out.column("v").unwrap().f64().unwrap().max().unwrap();
        assert_eq!(max, 0.0);
    }

    #[test]
    fn test_remove_single_extreme_row() {
        let df = df!["v" => [0.0, 0.0, 0.0, 0.0, 100.0]].unwrap();
        let (out, summary) =
            handle_outliers(&df, &config(OutlierAction::Remove, OutlierMethod::Iqr), &[]).unwrap();
        assert_eq!(summary.rows_removed, 1);
        assert_eq!(out.height(), 4);
    }

    #[test]
    fn test_remove_zscore_needs_spread() {
        // Constant column: zero std, nothing flagged.
        let df = df!["v" => [5.0, 5.0, 5.0, 5.0]].unwrap();
        let (out, summary) = handle_outliers(
            &df,
            &config(OutlierAction::Remove, OutlierMethod::ZScore),
            &[],
        )
        .unwrap();
        assert_eq!(summary.rows_removed, 0);
        assert_eq!(out.height(), 4);
    }

    #[test]
    fn test_target_column_excluded() {
        let df = df![
            "v" => [1.0, 2.0, 3.0],
            "target" => [0.0, 0.0, 1000.0],
        ]
        .unwrap();
        let (_, summary) = handle_outliers(
            &df,
            &config(OutlierAction::Cap, OutlierMethod::Iqr),
            &["target"],
        )
        .unwrap();
        assert_eq!(summary.numeric_columns, vec!["v".to_string()]);
    }

    #[test]
    fn test_remove_preserves_null_rows() {
        let df = df!["v" => [Some(1.0), Some(2.0), None, Some(3.0)]].unwrap();
        let (out, _) =
            handle_outliers(&df, &config(OutlierAction::Remove, OutlierMethod::Iqr), &[]).unwrap();
        assert_eq!(out.height(), 4);
    }
}
