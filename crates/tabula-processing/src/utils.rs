//! Shared utilities for the processing crate.
//!
//! Small helpers used across the profiler, issue detection and the
//! preprocessing pipeline.

use polars::prelude::*;

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Check if a Series holds numeric data.
#[inline]
pub fn is_numeric_series(series: &Series) -> bool {
    is_numeric_dtype(series.dtype())
}

/// Cast a Series to a Float64 chunked array.
pub fn as_f64(series: &Series) -> PolarsResult<Float64Chunked> {
    Ok(series.cast(&DataType::Float64)?.f64()?.clone())
}

/// Collect the non-null values of a numeric Series, sorted ascending.
pub fn sorted_non_null(series: &Series) -> PolarsResult<Vec<f64>> {
    let mut values: Vec<f64> = as_f64(series)?.into_iter().flatten().collect();
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    Ok(values)
}

/// Linear-interpolation quantile over a sorted slice.
///
/// Matches the convention the rest of the pipeline assumes (index
/// `q * (n - 1)` interpolated between neighbours). Returns `None` on empty
/// input.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    if lower == upper {
        return Some(sorted[lower]);
    }
    let weight = pos - lower as f64;
    Some(sorted[lower] * (1.0 - weight) + sorted[upper] * weight)
}

/// IQR bounds `(Q1 - m*IQR, Q3 + m*IQR)` of a numeric Series.
///
/// Returns `None` when the Series has no non-null values. A zero IQR is not
/// special-cased: the bounds collapse to `[Q1, Q3]` and anything outside
/// still counts as an outlier.
pub fn iqr_bounds(series: &Series, multiplier: f64) -> PolarsResult<Option<(f64, f64)>> {
    let sorted = sorted_non_null(series)?;
    let (Some(q1), Some(q3)) = (quantile_sorted(&sorted, 0.25), quantile_sorted(&sorted, 0.75))
    else {
        return Ok(None);
    };
    let iqr = q3 - q1;
    Ok(Some((q1 - multiplier * iqr, q3 + multiplier * iqr)))
}

/// Mean and population standard deviation (ddof = 0) of a numeric Series.
///
/// Returns `None` when the Series has no non-null values.
pub fn mean_std(series: &Series) -> PolarsResult<Option<(f64, f64)>> {
    let values: Vec<f64> = as_f64(series)?.into_iter().flatten().collect();
    if values.is_empty() {
        return Ok(None);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Ok(Some((mean, variance.sqrt())))
}

/// Calculate the mode (most frequent value) of a Series, as a string.
///
/// Ties break toward the value first encountered.
pub fn string_mode(series: &Series) -> Option<String> {
    let non_null = series.drop_nulls();
    if non_null.is_empty() {
        return None;
    }

    let str_series = non_null.cast(&DataType::String).ok()?;
    let str_chunked = str_series.str().ok()?;

    let mut counts: Vec<(String, usize)> = Vec::new();
    for val in str_chunked.into_iter().flatten() {
        match counts.iter_mut().find(|(v, _)| v == val) {
            Some((_, count)) => *count += 1,
            None => counts.push((val.to_string(), 1)),
        }
    }
    counts
        .into_iter()
        .max_by_key(|(_, count)| *count)
        .map(|(val, _)| val)
}

/// Fill nulls in a string-like Series with a constant, preserving the name.
pub fn fill_string_nulls(series: &Series, fill: &str) -> PolarsResult<Series> {
    let str_series = series.cast(&DataType::String)?;
    let filled: Vec<String> = str_series
        .str()?
        .into_iter()
        .map(|v| v.unwrap_or(fill).to_string())
        .collect();
    Ok(Series::new(series.name().clone(), filled))
}

/// The values of a Series as optional string labels.
///
/// Used wherever class labels are compared; numeric targets stringify so the
/// same code path handles `"yes"/"no"` and `0/1` targets.
pub fn string_labels(series: &Series) -> PolarsResult<Vec<Option<String>>> {
    let str_series = series.cast(&DataType::String)?;
    Ok(str_series
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.to_string()))
        .collect())
}

/// Per-class counts of the non-null labels in a Series, insertion-ordered.
pub fn class_counts(series: &Series) -> PolarsResult<Vec<(String, usize)>> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for label in string_labels(series)?.into_iter().flatten() {
        match counts.iter_mut().find(|(l, _)| *l == label) {
            Some((_, count)) => *count += 1,
            None => counts.push((label, 1)),
        }
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantile_sorted_linear_interpolation() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile_sorted(&sorted, 0.0), Some(1.0));
        assert_eq!(quantile_sorted(&sorted, 1.0), Some(4.0));
        assert_eq!(quantile_sorted(&sorted, 0.5), Some(2.5));
        assert_eq!(quantile_sorted(&[], 0.5), None);
    }

    #[test]
    fn test_iqr_bounds_zero_iqr() {
        // [0,0,0,0,100]: Q1 = 0, Q3 = 0, so the bounds collapse to [0, 0].
        let series = Series::new("v".into(), [0.0, 0.0, 0.0, 0.0, 100.0]);
        let (lb, ub) = iqr_bounds(&series, 1.5).unwrap().unwrap();
        assert_eq!(lb, 0.0);
        assert_eq!(ub, 0.0);
    }

    #[test]
    fn test_mean_std_population() {
        let series = Series::new("v".into(), [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        let (mean, std) = mean_std(&series).unwrap().unwrap();
        assert!((mean - 5.0).abs() < 1e-12);
        assert!((std - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_string_mode() {
        let series = Series::new("c".into(), [Some("a"), Some("b"), Some("a"), None]);
        assert_eq!(string_mode(&series), Some("a".to_string()));

        let empty = Series::new("c".into(), [Option::<&str>::None, None]);
        assert_eq!(string_mode(&empty), None);
    }

    #[test]
    fn test_class_counts_numeric_target() {
        let series = Series::new("y".into(), [1i64, 0, 1, 1]);
        let counts = class_counts(&series).unwrap();
        assert_eq!(counts, vec![("1".to_string(), 3), ("0".to_string(), 1)]);
    }
}
