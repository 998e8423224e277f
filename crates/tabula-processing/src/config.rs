//! Configuration types for the preprocessing pipeline.
//!
//! This module provides configuration options using the builder pattern
//! for flexible and ergonomic pipeline setup.

use serde::{Deserialize, Serialize};

/// Strategy for imputing missing numeric values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NumericImpute {
    /// Use the median of non-null values
    #[default]
    Median,
    /// Use the mean of non-null values
    Mean,
    /// Use a constant fill value (see [`PreprocessConfig::numeric_fill_value`])
    Constant,
}

/// Strategy for imputing missing categorical values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CategoricalImpute {
    /// Use the most frequent value (mode)
    #[default]
    MostFrequent,
    /// Use a constant fill value (see [`PreprocessConfig::categorical_fill_value`])
    Constant,
}

/// Scaling applied to numeric feature columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Scaling {
    /// Zero mean, unit variance
    #[default]
    Standard,
    /// Rescale to [0, 1]
    Minmax,
    /// Leave numeric columns untouched
    None,
}

/// Encoding applied to categorical feature columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    /// One binary column per category value
    #[default]
    OneHot,
    /// Map category values to integer codes; unseen values become -1
    Ordinal,
    /// One-hot unless the estimated expansion exceeds the budget, then ordinal
    Auto,
}

/// What to do about outliers in numeric feature columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutlierAction {
    /// Keep outliers as-is
    #[default]
    None,
    /// Clip each numeric column to its IQR bounds (Q1 - 1.5*IQR, Q3 + 1.5*IQR)
    Cap,
    /// Drop any row flagged as an outlier by the chosen method
    Remove,
}

/// Detection rule used when [`OutlierAction::Remove`] is selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutlierMethod {
    /// IQR bound violation
    #[default]
    Iqr,
    /// |z| above the configured threshold
    ZScore,
}

/// Configuration for the preprocessing pipeline.
///
/// Use [`PreprocessConfig::builder()`] for fluent construction. The defaults
/// mirror what a caller gets when they submit an empty preprocessing request:
/// median/mode imputation, standard scaling, one-hot encoding, no outlier
/// handling, a 20% test fraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessConfig {
    /// Strategy for missing numeric values.
    pub numeric_impute: NumericImpute,

    /// Strategy for missing categorical values.
    pub categorical_impute: CategoricalImpute,

    /// Fill value used when `numeric_impute` is `Constant`. Default: 0.0
    pub numeric_fill_value: Option<f64>,

    /// Fill value used when `categorical_impute` is `Constant`. Default: ""
    pub categorical_fill_value: Option<String>,

    /// Scaling mode for numeric columns.
    pub scaling: Scaling,

    /// Encoding mode for categorical columns.
    pub encoding: Encoding,

    /// Outlier action applied before imputation.
    pub outlier_action: OutlierAction,

    /// Outlier detection method (only used by `Remove`).
    pub outlier_method: OutlierMethod,

    /// |z| threshold for z-score outlier detection. Default: 3.0
    pub zscore_threshold: f64,

    /// IQR multiplier for bound derivation. Default: 1.5
    pub iqr_multiplier: f64,

    /// Estimated one-hot dimensionality above which `Auto` encoding switches
    /// to ordinal. Default: 200
    pub auto_encoding_budget: usize,

    /// Fraction of rows reserved for the holdout set. Default: 0.2
    pub test_fraction: f64,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            numeric_impute: NumericImpute::default(),
            categorical_impute: CategoricalImpute::default(),
            numeric_fill_value: None,
            categorical_fill_value: None,
            scaling: Scaling::default(),
            encoding: Encoding::default(),
            outlier_action: OutlierAction::default(),
            outlier_method: OutlierMethod::default(),
            zscore_threshold: 3.0,
            iqr_multiplier: 1.5,
            auto_encoding_budget: 200,
            test_fraction: 0.2,
        }
    }
}

impl PreprocessConfig {
    /// Create a new configuration builder.
    pub fn builder() -> PreprocessConfigBuilder {
        PreprocessConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if !(0.0..1.0).contains(&self.test_fraction) || self.test_fraction <= 0.0 {
            return Err(ConfigValidationError::InvalidFraction {
                field: "test_fraction".to_string(),
                value: self.test_fraction,
            });
        }
        if self.zscore_threshold <= 0.0 {
            return Err(ConfigValidationError::InvalidThreshold {
                field: "zscore_threshold".to_string(),
                value: self.zscore_threshold,
            });
        }
        if self.iqr_multiplier <= 0.0 {
            return Err(ConfigValidationError::InvalidThreshold {
                field: "iqr_multiplier".to_string(),
                value: self.iqr_multiplier,
            });
        }
        if self.auto_encoding_budget == 0 {
            return Err(ConfigValidationError::InvalidBudget(self.auto_encoding_budget));
        }
        Ok(())
    }

    /// Numeric fill value with the constant-strategy default applied.
    pub fn numeric_fill(&self) -> f64 {
        self.numeric_fill_value.unwrap_or(0.0)
    }

    /// Categorical fill value with the constant-strategy default applied.
    pub fn categorical_fill(&self) -> String {
        self.categorical_fill_value.clone().unwrap_or_default()
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid fraction for '{field}': {value} (must be in (0.0, 1.0))")]
    InvalidFraction { field: String, value: f64 },

    #[error("Invalid threshold for '{field}': {value} (must be positive)")]
    InvalidThreshold { field: String, value: f64 },

    #[error("Invalid auto-encoding budget: {0} (must be at least 1)")]
    InvalidBudget(usize),
}

/// Builder for [`PreprocessConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct PreprocessConfigBuilder {
    numeric_impute: Option<NumericImpute>,
    categorical_impute: Option<CategoricalImpute>,
    numeric_fill_value: Option<f64>,
    categorical_fill_value: Option<String>,
    scaling: Option<Scaling>,
    encoding: Option<Encoding>,
    outlier_action: Option<OutlierAction>,
    outlier_method: Option<OutlierMethod>,
    zscore_threshold: Option<f64>,
    iqr_multiplier: Option<f64>,
    auto_encoding_budget: Option<usize>,
    test_fraction: Option<f64>,
}

impl PreprocessConfigBuilder {
    /// Set the numeric imputation strategy.
    pub fn numeric_impute(mut self, strategy: NumericImpute) -> Self {
        self.numeric_impute = Some(strategy);
        self
    }

    /// Set the categorical imputation strategy.
    pub fn categorical_impute(mut self, strategy: CategoricalImpute) -> Self {
        self.categorical_impute = Some(strategy);
        self
    }

    /// Set the fill value for constant numeric imputation.
    pub fn numeric_fill_value(mut self, value: f64) -> Self {
        self.numeric_fill_value = Some(value);
        self
    }

    /// Set the fill value for constant categorical imputation.
    pub fn categorical_fill_value(mut self, value: impl Into<String>) -> Self {
        self.categorical_fill_value = Some(value.into());
        self
    }

    /// Set the scaling mode.
    pub fn scaling(mut self, scaling: Scaling) -> Self {
        self.scaling = Some(scaling);
        self
    }

    /// Set the encoding mode.
    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    /// Set the outlier action.
    pub fn outlier_action(mut self, action: OutlierAction) -> Self {
        self.outlier_action = Some(action);
        self
    }

    /// Set the outlier detection method used for row removal.
    pub fn outlier_method(mut self, method: OutlierMethod) -> Self {
        self.outlier_method = Some(method);
        self
    }

    /// Set the |z| threshold for z-score outlier detection.
    pub fn zscore_threshold(mut self, threshold: f64) -> Self {
        self.zscore_threshold = Some(threshold);
        self
    }

    /// Set the IQR multiplier.
    pub fn iqr_multiplier(mut self, multiplier: f64) -> Self {
        self.iqr_multiplier = Some(multiplier);
        self
    }

    /// Set the dimensionality budget for auto encoding.
    pub fn auto_encoding_budget(mut self, budget: usize) -> Self {
        self.auto_encoding_budget = Some(budget);
        self
    }

    /// Set the holdout test fraction.
    pub fn test_fraction(mut self, fraction: f64) -> Self {
        self.test_fraction = Some(fraction);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `PreprocessConfig` or an error if validation fails.
    pub fn build(self) -> Result<PreprocessConfig, ConfigValidationError> {
        let config = PreprocessConfig {
            numeric_impute: self.numeric_impute.unwrap_or_default(),
            categorical_impute: self.categorical_impute.unwrap_or_default(),
            numeric_fill_value: self.numeric_fill_value,
            categorical_fill_value: self.categorical_fill_value,
            scaling: self.scaling.unwrap_or_default(),
            encoding: self.encoding.unwrap_or_default(),
            outlier_action: self.outlier_action.unwrap_or_default(),
            outlier_method: self.outlier_method.unwrap_or_default(),
            zscore_threshold: self.zscore_threshold.unwrap_or(3.0),
            iqr_multiplier: self.iqr_multiplier.unwrap_or(1.5),
            auto_encoding_budget: self.auto_encoding_budget.unwrap_or(200),
            test_fraction: self.test_fraction.unwrap_or(0.2),
        };

        config.validate()?;
        Ok(config)
    }
}
