//! Stratified split validation and splitting.
//!
//! Validation front-loads the feasibility checks whose absence causes
//! otherwise-opaque downstream failures: every class must be able to land at
//! least one sample in each partition. The splitter itself assigns each
//! class proportionally across train and test with a deterministic seed.

use crate::error::{ProcessingError, Result};
use crate::utils::string_labels;
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Requested size of the test partition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitSpec {
    /// Fraction of (non-null-target) samples; test count is the ceiling.
    Fraction(f64),
    /// Absolute number of test samples.
    Count(usize),
}

/// Resolved partition sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitCounts {
    pub n_samples: usize,
    pub n_classes: usize,
    pub test_n: usize,
    pub train_n: usize,
}

/// Class labels and their row indices, in first-seen order. Rows with a
/// null target are excluded.
fn class_index_map(df: &DataFrame, target_column: &str) -> Result<Vec<(String, Vec<usize>)>> {
    let column = df
        .column(target_column)
        .map_err(|_| ProcessingError::ColumnNotFound(target_column.to_string()))?;
    let labels = string_labels(column.as_materialized_series())?;
    let mut classes: Vec<(String, Vec<usize>)> = Vec::new();
    for (i, label) in labels.into_iter().enumerate() {
        let Some(label) = label else { continue };
        match classes.iter_mut().find(|(l, _)| *l == label) {
            Some((_, indices)) => indices.push(i),
            None => classes.push((label, vec![i])),
        }
    }
    Ok(classes)
}

/// Validate that a stratified split is feasible and resolve the partition
/// sizes.
///
/// Requires at least 2 distinct non-null classes, at least 2 samples per
/// class, and both partitions large enough to hold one sample of every
/// class.
pub fn validate_split(df: &DataFrame, target_column: &str, spec: &SplitSpec) -> Result<SplitCounts> {
    if df.height() == 0 {
        return Err(ProcessingError::InvalidData("Dataset is empty".to_string()));
    }
    if df.width() <= 1 {
        return Err(ProcessingError::InvalidData(
            "No feature columns remain after removing the target column".to_string(),
        ));
    }

    let classes = class_index_map(df, target_column)?;
    let n_classes = classes.len();
    if n_classes < 2 {
        return Err(ProcessingError::InvalidTarget {
            column: target_column.to_string(),
            reason: "Target must have at least 2 classes for classification".to_string(),
        });
    }
    let min_class = classes.iter().map(|(_, idx)| idx.len()).min().unwrap_or(0);
    if min_class < 2 {
        return Err(ProcessingError::InfeasibleSplit(
            "Each class must have at least 2 samples for a stratified split".to_string(),
        ));
    }

    let n_samples: usize = classes.iter().map(|(_, idx)| idx.len()).sum();
    let test_n = match *spec {
        SplitSpec::Fraction(fraction) => {
            if !(0.0..1.0).contains(&fraction) || fraction <= 0.0 {
                return Err(ProcessingError::InvalidConfig(
                    "test fraction must be between 0 and 1".to_string(),
                ));
            }
            (fraction * n_samples as f64).ceil() as usize
        }
        SplitSpec::Count(count) => count,
    };
    if test_n >= n_samples {
        return Err(ProcessingError::InfeasibleSplit(format!(
            "Test partition of {test_n} leaves no training samples out of {n_samples}"
        )));
    }
    let train_n = n_samples - test_n;
    if test_n < n_classes || train_n < n_classes {
        return Err(ProcessingError::InfeasibleSplit(
            "Test/train split is too small for stratification: each split must contain at \
             least one sample per class. Increase dataset size or adjust the test ratio."
                .to_string(),
        ));
    }

    Ok(SplitCounts {
        n_samples,
        n_classes,
        test_n,
        train_n,
    })
}

/// Per-class test-sample allocation by largest remainder, with each class
/// keeping at least one sample on both sides.
fn allocate_test_counts(class_sizes: &[usize], test_n: usize, n_samples: usize) -> Vec<usize> {
    let mut base: Vec<usize> = Vec::with_capacity(class_sizes.len());
    let mut fractions: Vec<f64> = Vec::with_capacity(class_sizes.len());
    for &size in class_sizes {
        let quota = size as f64 * test_n as f64 / n_samples as f64;
        let floor = quota.floor() as usize;
        let clamped = floor.clamp(1, size - 1);
        fractions.push(quota - floor as f64);
        base.push(clamped);
    }

    let mut total: usize = base.iter().sum();
    // Grow toward test_n, preferring the largest remainders.
    while total < test_n {
        let candidate = (0..base.len())
            .filter(|&i| base[i] < class_sizes[i] - 1)
            .max_by(|&a, &b| {
                fractions[a]
                    .partial_cmp(&fractions[b])
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        match candidate {
            Some(i) => {
                base[i] += 1;
                fractions[i] = -1.0;
                total += 1;
            }
            None => break,
        }
    }
    // Shrink toward test_n, dropping the smallest remainders first.
    while total > test_n {
        let candidate = (0..base.len()).filter(|&i| base[i] > 1).min_by(|&a, &b| {
            fractions[a]
                .partial_cmp(&fractions[b])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        match candidate {
            Some(i) => {
                base[i] -= 1;
                fractions[i] = 2.0;
                total -= 1;
            }
            None => break,
        }
    }
    base
}

fn take_rows(df: &DataFrame, indices: &[usize]) -> Result<DataFrame> {
    let idx: Vec<IdxSize> = indices.iter().map(|&i| i as IdxSize).collect();
    Ok(df.take(&IdxCa::from_vec("idx".into(), idx))?)
}

/// Class-stratified train/test split with a deterministic seed.
///
/// Rows whose target is null are dropped. Returns `(train, test)`, both
/// still carrying the target column.
pub fn stratified_split(
    df: &DataFrame,
    target_column: &str,
    spec: &SplitSpec,
    seed: u64,
) -> Result<(DataFrame, DataFrame)> {
    let counts = validate_split(df, target_column, spec)?;
    let classes = class_index_map(df, target_column)?;
    let class_sizes: Vec<usize> = classes.iter().map(|(_, idx)| idx.len()).collect();
    let test_counts = allocate_test_counts(&class_sizes, counts.test_n, counts.n_samples);

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train_indices: Vec<usize> = Vec::with_capacity(counts.train_n);
    let mut test_indices: Vec<usize> = Vec::with_capacity(counts.test_n);
    for ((_, indices), &take) in classes.iter().zip(test_counts.iter()) {
        let mut shuffled = indices.clone();
        shuffled.shuffle(&mut rng);
        test_indices.extend_from_slice(&shuffled[..take]);
        train_indices.extend_from_slice(&shuffled[take..]);
    }
    // Keep original row order inside each partition.
    train_indices.sort_unstable();
    test_indices.sort_unstable();

    Ok((take_rows(df, &train_indices)?, take_rows(df, &test_indices)?))
}

/// Deterministic shuffled split without stratification.
///
/// The fallback used when the stratified split is infeasible: shuffle all
/// rows with the seed and cut at `floor(n * train_fraction)`.
pub fn shuffled_split(
    df: &DataFrame,
    train_fraction: f64,
    seed: u64,
) -> Result<(DataFrame, DataFrame)> {
    if df.height() == 0 {
        return Err(ProcessingError::InvalidData("Dataset is empty".to_string()));
    }
    let mut indices: Vec<usize> = (0..df.height()).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);
    let split_at = ((df.height() as f64) * train_fraction) as usize;
    let (train, test) = indices.split_at(split_at.min(df.height()));
    Ok((take_rows(df, train)?, take_rows(df, test)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::class_counts;
    use pretty_assertions::assert_eq;

    fn balanced_df() -> DataFrame {
        df![
            "x" => [1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            "y" => ["a", "b", "a", "b", "a", "b"],
        ]
        .unwrap()
    }

    #[test]
    fn test_validate_split_three_classes_small_test_fails() {
        // 3 classes, 6 rows, fraction 0.2 -> test = ceil(1.2) = 2 < 3 classes.
        let df = df![
            "x" => [1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            "y" => ["a", "a", "b", "b", "c", "c"],
        ]
        .unwrap();
        let err = validate_split(&df, "y", &SplitSpec::Fraction(0.2)).unwrap_err();
        assert_eq!(err.error_code(), "INFEASIBLE_SPLIT");
    }

    #[test]
    fn test_validate_split_two_balanced_classes_succeeds() {
        let counts = validate_split(&balanced_df(), "y", &SplitSpec::Fraction(0.33)).unwrap();
        assert_eq!(counts.test_n, 2);
        assert_eq!(counts.train_n, 4);
        assert_eq!(counts.n_classes, 2);
    }

    #[test]
    fn test_validate_split_single_sample_class() {
        let df = df![
            "x" => [1.0, 2.0, 3.0],
            "y" => ["a", "a", "b"],
        ]
        .unwrap();
        let err = validate_split(&df, "y", &SplitSpec::Fraction(0.33)).unwrap_err();
        assert!(err.to_string().contains("at least 2 samples"));
    }

    #[test]
    fn test_validate_split_one_class() {
        let df = df![
            "x" => [1.0, 2.0],
            "y" => ["a", "a"],
        ]
        .unwrap();
        let err = validate_split(&df, "y", &SplitSpec::Fraction(0.5)).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_TARGET");
    }

    #[test]
    fn test_validate_split_absolute_count() {
        let counts = validate_split(&balanced_df(), "y", &SplitSpec::Count(2)).unwrap();
        assert_eq!(counts.test_n, 2);
        assert_eq!(counts.train_n, 4);
    }

    #[test]
    fn test_stratified_split_preserves_class_presence() {
        let (train, test) = stratified_split(&balanced_df(), "y", &SplitSpec::Fraction(0.33), 42)
            .unwrap();
        assert_eq!(train.height(), 4);
        assert_eq!(test.height(), 2);

        let train_counts = class_counts(train.column("y").unwrap().as_materialized_series())
            .unwrap();
        let test_counts = class_counts(test.column("y").unwrap().as_materialized_series()).unwrap();
        assert_eq!(train_counts.len(), 2);
        assert_eq!(test_counts.len(), 2);
    }

    #[test]
    fn test_stratified_split_is_deterministic() {
        let (train_a, test_a) =
            stratified_split(&balanced_df(), "y", &SplitSpec::Fraction(0.33), 7).unwrap();
        let (train_b, test_b) =
            stratified_split(&balanced_df(), "y", &SplitSpec::Fraction(0.33), 7).unwrap();
        assert!(train_a.equals(&train_b));
        assert!(test_a.equals(&test_b));
    }

    #[test]
    fn test_stratified_split_drops_null_targets() {
        let df = df![
            "x" => [1.0, 2.0, 3.0, 4.0, 5.0],
            "y" => [Some("a"), Some("b"), None, Some("a"), Some("b")],
        ]
        .unwrap();
        let (train, test) = stratified_split(&df, "y", &SplitSpec::Fraction(0.5), 1).unwrap();
        assert_eq!(train.height() + test.height(), 4);
    }

    #[test]
    fn test_shuffled_split_80_20() {
        let (train, test) = shuffled_split(&balanced_df(), 0.8, 42).unwrap();
        assert_eq!(train.height(), 4);
        assert_eq!(test.height(), 2);
    }

    #[test]
    fn test_allocate_test_counts_totals() {
        // 8 + 4 samples, test_n = 3: allocation must total exactly 3 with
        // at least one per class.
        let counts = allocate_test_counts(&[8, 4], 3, 12);
        assert_eq!(counts.iter().sum::<usize>(), 3);
        assert!(counts.iter().all(|&c| c >= 1));
    }
}
