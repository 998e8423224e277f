//! The reusable feature transform: imputation, scaling, encoding.
//!
//! A [`TransformSpec`] captures the configuration plus column roles and can
//! be fit on any compatible table; the resulting [`FittedTransform`] holds
//! the learned fill values, scaling parameters and encoder vocabularies and
//! can be re-applied. The split keeps fold-internal refitting possible in
//! cross-validation, which is what prevents train/test leakage.

use crate::config::{CategoricalImpute, Encoding, NumericImpute, PreprocessConfig, Scaling};
use crate::error::{ProcessingError, Result};
use crate::utils::{as_f64, is_numeric_series, quantile_sorted, string_labels, string_mode};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Encoding after the `Auto` heuristic has been resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedEncoding {
    OneHot,
    Ordinal,
}

/// Unfitted transform: configuration plus column roles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformSpec {
    config: PreprocessConfig,
    numeric: Vec<String>,
    categorical: Vec<String>,
}

/// Fitted per-column state for a numeric feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct NumericColumnFit {
    name: String,
    fill: f64,
    offset: f64,
    scale: f64,
}

/// Fitted per-column state for a categorical feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CategoricalColumnFit {
    name: String,
    fill: String,
    vocabulary: Vec<String>,
}

/// A fitted transform, reusable on any table with the same feature columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedTransform {
    numeric: Vec<NumericColumnFit>,
    categorical: Vec<CategoricalColumnFit>,
    encoding: ResolvedEncoding,
}

impl TransformSpec {
    /// Derive column roles from a feature table (target already removed).
    pub fn from_features(df: &DataFrame, config: &PreprocessConfig) -> Self {
        let mut numeric = Vec::new();
        let mut categorical = Vec::new();
        for column in df.get_columns() {
            let name = column.name().to_string();
            if is_numeric_series(column.as_materialized_series()) {
                numeric.push(name);
            } else {
                categorical.push(name);
            }
        }
        Self {
            config: config.clone(),
            numeric,
            categorical,
        }
    }

    /// The configured encoding, with `Auto` resolved against the given table.
    ///
    /// `Auto` estimates the one-hot expansion as the sum of per-column unique
    /// counts and falls back to ordinal when the estimate exceeds the budget.
    fn resolve_encoding(&self, df: &DataFrame) -> Result<ResolvedEncoding> {
        Ok(match self.config.encoding {
            Encoding::OneHot => ResolvedEncoding::OneHot,
            Encoding::Ordinal => ResolvedEncoding::Ordinal,
            Encoding::Auto => {
                let mut estimated_dims = 0usize;
                for name in &self.categorical {
                    let series = df.column(name)?.as_materialized_series().clone();
                    estimated_dims += series.drop_nulls().n_unique()?;
                }
                if estimated_dims > self.config.auto_encoding_budget {
                    debug!(
                        estimated_dims,
                        budget = self.config.auto_encoding_budget,
                        "auto encoding fell back to ordinal"
                    );
                    ResolvedEncoding::Ordinal
                } else {
                    ResolvedEncoding::OneHot
                }
            }
        })
    }

    /// Fit the transform on a feature table.
    pub fn fit(&self, df: &DataFrame) -> Result<FittedTransform> {
        let mut numeric = Vec::with_capacity(self.numeric.len());
        for name in &self.numeric {
            let series = df
                .column(name)
                .map_err(|_| ProcessingError::ColumnNotFound(name.clone()))?
                .as_materialized_series()
                .clone();
            let mut values: Vec<f64> = as_f64(&series)?.into_iter().flatten().collect();
            values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

            let fill = match self.config.numeric_impute {
                NumericImpute::Median => {
                    quantile_sorted(&values, 0.5).unwrap_or_else(|| self.config.numeric_fill())
                }
                NumericImpute::Mean => {
                    if values.is_empty() {
                        self.config.numeric_fill()
                    } else {
                        values.iter().sum::<f64>() / values.len() as f64
                    }
                }
                NumericImpute::Constant => self.config.numeric_fill(),
            };

            // Scaling statistics are computed over the imputed column, the
            // same data the scaler will actually see.
            let imputed: Vec<f64> = as_f64(&series)?
                .into_iter()
                .map(|v| v.unwrap_or(fill))
                .collect();
            let (offset, scale) = match self.config.scaling {
                Scaling::Standard => {
                    let n = imputed.len().max(1) as f64;
                    let mean = imputed.iter().sum::<f64>() / n;
                    let variance = imputed.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
                    let std = variance.sqrt();
                    (mean, if std > 0.0 { std } else { 1.0 })
                }
                Scaling::Minmax => {
                    let min = imputed.iter().copied().fold(f64::INFINITY, f64::min);
                    let max = imputed.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                    if min.is_finite() && max > min {
                        (min, max - min)
                    } else if min.is_finite() {
                        // Constant column: map to 0 instead of passing through.
                        (min, 1.0)
                    } else {
                        (0.0, 1.0)
                    }
                }
                Scaling::None => (0.0, 1.0),
            };

            numeric.push(NumericColumnFit {
                name: name.clone(),
                fill,
                offset,
                scale,
            });
        }

        let encoding = self.resolve_encoding(df)?;
        let mut categorical = Vec::with_capacity(self.categorical.len());
        for name in &self.categorical {
            let series = df
                .column(name)
                .map_err(|_| ProcessingError::ColumnNotFound(name.clone()))?
                .as_materialized_series()
                .clone();
            let fill = match self.config.categorical_impute {
                CategoricalImpute::MostFrequent => string_mode(&series)
                    .unwrap_or_else(|| self.config.categorical_fill()),
                CategoricalImpute::Constant => self.config.categorical_fill(),
            };
            let mut vocabulary: Vec<String> = string_labels(&series)?
                .into_iter()
                .map(|v| v.unwrap_or_else(|| fill.clone()))
                .collect();
            vocabulary.sort();
            vocabulary.dedup();
            categorical.push(CategoricalColumnFit {
                name: name.clone(),
                fill,
                vocabulary,
            });
        }

        Ok(FittedTransform {
            numeric,
            categorical,
            encoding,
        })
    }

    /// Fit on a table, then transform it.
    pub fn fit_transform(&self, df: &DataFrame) -> Result<(FittedTransform, DataFrame)> {
        let fitted = self.fit(df)?;
        let transformed = fitted.apply(df)?;
        Ok((fitted, transformed))
    }

    /// Names of the numeric feature columns.
    pub fn numeric_columns(&self) -> &[String] {
        &self.numeric
    }

    /// Names of the categorical feature columns.
    pub fn categorical_columns(&self) -> &[String] {
        &self.categorical
    }
}

impl FittedTransform {
    /// The encoding this transform resolved to.
    pub fn encoding(&self) -> ResolvedEncoding {
        self.encoding
    }

    /// Output feature names, numeric columns first then encoded categoricals.
    pub fn feature_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.numeric.iter().map(|c| c.name.clone()).collect();
        for cat in &self.categorical {
            match self.encoding {
                ResolvedEncoding::Ordinal => names.push(cat.name.clone()),
                ResolvedEncoding::OneHot => {
                    for value in &cat.vocabulary {
                        names.push(format!("{}_{}", cat.name, value));
                    }
                }
            }
        }
        names
    }

    /// Transform a feature table using the fitted state.
    ///
    /// Unseen category values map to -1 under ordinal encoding and to an
    /// all-zero row under one-hot.
    pub fn apply(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut columns: Vec<Column> = Vec::new();

        for fit in &self.numeric {
            let series = df
                .column(&fit.name)
                .map_err(|_| ProcessingError::ColumnNotFound(fit.name.clone()))?
                .as_materialized_series()
                .clone();
            let transformed: Vec<f64> = as_f64(&series)?
                .into_iter()
                .map(|v| (v.unwrap_or(fit.fill) - fit.offset) / fit.scale)
                .collect();
            columns.push(Series::new(fit.name.as_str().into(), transformed).into_column());
        }

        for fit in &self.categorical {
            let series = df
                .column(&fit.name)
                .map_err(|_| ProcessingError::ColumnNotFound(fit.name.clone()))?
                .as_materialized_series()
                .clone();
            let labels: Vec<String> = string_labels(&series)?
                .into_iter()
                .map(|v| v.unwrap_or_else(|| fit.fill.clone()))
                .collect();
            match self.encoding {
                ResolvedEncoding::Ordinal => {
                    let codes: Vec<f64> = labels
                        .iter()
                        .map(|label| match fit.vocabulary.binary_search(label) {
                            Ok(idx) => idx as f64,
                            Err(_) => -1.0,
                        })
                        .collect();
                    columns.push(Series::new(fit.name.as_str().into(), codes).into_column());
                }
                ResolvedEncoding::OneHot => {
                    for value in &fit.vocabulary {
                        let indicator: Vec<f64> = labels
                            .iter()
                            .map(|label| if label == value { 1.0 } else { 0.0 })
                            .collect();
                        let name = format!("{}_{}", fit.name, value);
                        columns.push(Series::new(name.as_str().into(), indicator).into_column());
                    }
                }
            }
        }

        Ok(DataFrame::new(columns)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PreprocessConfig;
    use pretty_assertions::assert_eq;

    fn features() -> DataFrame {
        df![
            "age" => [Some(20.0), Some(30.0), None, Some(40.0)],
            "city" => [Some("ams"), None, Some("rot"), Some("ams")],
        ]
        .unwrap()
    }

    #[test]
    fn test_median_imputation_and_standard_scaling() {
        let config = PreprocessConfig::default();
        let spec = TransformSpec::from_features(&features(), &config);
        let (fitted, out) = spec.fit_transform(&features()).unwrap();

        // Median of [20, 30, 40] is 30; the imputed column is [20, 30, 30, 40]
        // and standardized values must have zero mean.
        let age = out.column("age").unwrap().f64().unwrap();
        let mean: f64 = age.into_iter().flatten().sum::<f64>() / 4.0;
        assert!(mean.abs() < 1e-9);
        assert_eq!(age.null_count(), 0);

        // Mode imputation fills the null city with "ams".
        assert_eq!(
            fitted.feature_names(),
            vec!["age".to_string(), "city_ams".to_string(), "city_rot".to_string()]
        );
        let ams = out.column("city_ams").unwrap().f64().unwrap();
        assert_eq!(ams.get(1), Some(1.0));
    }

    #[test]
    fn test_constant_imputation() {
        let config = PreprocessConfig::builder()
            .numeric_impute(NumericImpute::Constant)
            .numeric_fill_value(-7.0)
            .categorical_impute(CategoricalImpute::Constant)
            .categorical_fill_value("missing")
            .scaling(Scaling::None)
            .encoding(Encoding::Ordinal)
            .build()
            .unwrap();
        let spec = TransformSpec::from_features(&features(), &config);
        let (fitted, out) = spec.fit_transform(&features()).unwrap();

        let age = out.column("age").unwrap().f64().unwrap();
        assert_eq!(age.get(2), Some(-7.0));

        // Vocabulary is ["ams", "missing", "rot"], so the filled row codes to 1.
        let city = out.column("city").unwrap().f64().unwrap();
        assert_eq!(city.get(1), Some(1.0));
        assert_eq!(fitted.encoding(), ResolvedEncoding::Ordinal);
    }

    #[test]
    fn test_minmax_scaling() {
        let config = PreprocessConfig::builder()
            .scaling(Scaling::Minmax)
            .build()
            .unwrap();
        let df = df!["v" => [0.0, 5.0, 10.0]].unwrap();
        let spec = TransformSpec::from_features(&df, &config);
        let (_, out) = spec.fit_transform(&df).unwrap();
        let v = out.column("v").unwrap().f64().unwrap();
        assert_eq!(v.get(0), Some(0.0));
        assert_eq!(v.get(1), Some(0.5));
        assert_eq!(v.get(2), Some(1.0));
    }

    #[test]
    fn test_auto_encoding_respects_budget() {
        let many: Vec<String> = (0..30).map(|i| format!("v{i}")).collect();
        let df = df!["cat" => many].unwrap();

        let config = PreprocessConfig::builder()
            .encoding(Encoding::Auto)
            .auto_encoding_budget(10)
            .build()
            .unwrap();
        let spec = TransformSpec::from_features(&df, &config);
        assert_eq!(spec.fit(&df).unwrap().encoding(), ResolvedEncoding::Ordinal);

        let config = PreprocessConfig::builder()
            .encoding(Encoding::Auto)
            .auto_encoding_budget(100)
            .build()
            .unwrap();
        let spec = TransformSpec::from_features(&df, &config);
        assert_eq!(spec.fit(&df).unwrap().encoding(), ResolvedEncoding::OneHot);
    }

    #[test]
    fn test_apply_to_unseen_values() {
        let config = PreprocessConfig::builder()
            .encoding(Encoding::Ordinal)
            .scaling(Scaling::None)
            .build()
            .unwrap();
        let train = df!["cat" => ["a", "b", "a"]].unwrap();
        let spec = TransformSpec::from_features(&train, &config);
        let fitted = spec.fit(&train).unwrap();

        let test = df!["cat" => ["b", "zzz"]].unwrap();
        let out = fitted.apply(&test).unwrap();
        let cat = out.column("cat").unwrap().f64().unwrap();
        assert_eq!(cat.get(0), Some(1.0));
        assert_eq!(cat.get(1), Some(-1.0));
    }

    #[test]
    fn test_one_hot_unseen_value_is_all_zero() {
        let config = PreprocessConfig::builder().scaling(Scaling::None).build().unwrap();
        let train = df!["cat" => ["a", "b"]].unwrap();
        let spec = TransformSpec::from_features(&train, &config);
        let fitted = spec.fit(&train).unwrap();

        let test = df!["cat" => ["zzz"]].unwrap();
        let out = fitted.apply(&test).unwrap();
        assert_eq!(out.column("cat_a").unwrap().f64().unwrap().get(0), Some(0.0));
        assert_eq!(out.column("cat_b").unwrap().f64().unwrap().get(0), Some(0.0));
    }

    #[test]
    fn test_refit_on_subset_differs() {
        // Refitting on a fold's training slice must learn that slice's
        // statistics, not the full table's.
        let config = PreprocessConfig::builder().scaling(Scaling::None).build().unwrap();
        let full = df!["v" => [Some(1.0), Some(100.0), None]].unwrap();
        let subset = df!["v" => [Some(1.0), None]].unwrap();
        let spec = TransformSpec::from_features(&full, &config);

        let on_full = spec.fit(&full).unwrap().apply(&full).unwrap();
        let on_subset = spec.fit(&subset).unwrap().apply(&subset).unwrap();

        // Median of full = 50.5, of subset = 1.0.
        assert_eq!(on_full.column("v").unwrap().f64().unwrap().get(2), Some(50.5));
        assert_eq!(on_subset.column("v").unwrap().f64().unwrap().get(1), Some(1.0));
    }
}
