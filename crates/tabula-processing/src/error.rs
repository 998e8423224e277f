//! Custom error types for the data preprocessing crate.
//!
//! This module provides the error hierarchy used throughout profiling,
//! issue detection, preprocessing and split validation, built on `thiserror`.
//!
//! Errors are serializable so a service layer can forward them to callers
//! as a structured `{code, message}` payload.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for processing operations.
#[derive(Error, Debug)]
pub enum ProcessingError {
    /// Column was not found in the dataset.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The dataset (or a required part of it) failed validation.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// The target column is unusable for classification.
    #[error("Invalid target column '{column}': {reason}")]
    InvalidTarget { column: String, reason: String },

    /// The requested train/test split is infeasible.
    #[error("Infeasible split: {0}")]
    InfeasibleSplit(String),

    /// Imputation failed for a column.
    #[error("Failed to impute missing values in column '{column}': {reason}")]
    ImputationFailed { column: String, reason: String },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<ProcessingError>,
    },
}

impl ProcessingError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ProcessingError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Get a stable code for this error, usable by callers for dispatch.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::InvalidData(_) => "INVALID_DATA",
            Self::InvalidTarget { .. } => "INVALID_TARGET",
            Self::InfeasibleSplit(_) => "INFEASIBLE_SPLIT",
            Self::ImputationFailed { .. } => "IMPUTATION_FAILED",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Whether this error is a caller mistake rather than an internal fault.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::ColumnNotFound(_)
                | Self::InvalidConfig(_)
                | Self::InvalidData(_)
                | Self::InvalidTarget { .. }
                | Self::InfeasibleSplit(_)
        ) || matches!(self, Self::WithContext { source, .. } if source.is_validation())
    }
}

/// Serialize errors as `{code, message}` for transport.
impl Serialize for ProcessingError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("ProcessingError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for processing operations.
pub type Result<T> = std::result::Result<T, ProcessingError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| ProcessingError::Polars(e).with_context(context))
    }
}
