//! Error types for the tabula-learning crate.
//!
//! [`LearningError`] covers configuration, data and training failures. Note
//! that a single model failing to fit is *not* an error at this level: the
//! search engine records it in that model's report and moves on. Errors here
//! mean the whole batch cannot proceed.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for learning operations.
#[derive(Error, Debug)]
pub enum LearningError {
    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid data provided for training or evaluation.
    ///
    /// Common causes: empty feature matrix, missing values that should have
    /// been imputed upstream, or a target with fewer than 2 classes.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Not enough samples per class to run cross-validation.
    #[error("Not enough samples per class for cross-validation (need at least 2 per class)")]
    InsufficientSamples,

    /// A single model failed to fit or evaluate.
    ///
    /// Raised inside model implementations; the search engine converts it to
    /// a per-model error record instead of propagating.
    #[error("Model '{model}' failed: {reason}")]
    ModelFailed { model: String, reason: String },

    /// Preprocessing error bubbling up from fold-internal transform refits.
    #[error(transparent)]
    Processing(#[from] tabula_processing::ProcessingError),
}

impl LearningError {
    /// Get a stable code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::InvalidData(_) => "INVALID_DATA",
            Self::InsufficientSamples => "INSUFFICIENT_SAMPLES",
            Self::ModelFailed { .. } => "MODEL_FAILED",
            Self::Processing(e) => e.error_code(),
        }
    }

    /// Whether this error is a caller mistake rather than an internal fault.
    pub fn is_validation(&self) -> bool {
        match self {
            Self::InvalidConfig(_) | Self::InvalidData(_) | Self::InsufficientSamples => true,
            Self::ModelFailed { .. } => false,
            Self::Processing(e) => e.is_validation(),
        }
    }
}

/// Serialize errors as `{code, message}` for transport.
impl Serialize for LearningError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("LearningError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for learning operations.
pub type Result<T> = std::result::Result<T, LearningError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(
            LearningError::InsufficientSamples.error_code(),
            "INSUFFICIENT_SAMPLES"
        );
        assert_eq!(
            LearningError::ModelFailed {
                model: "SVM".to_string(),
                reason: "did not converge".to_string()
            }
            .error_code(),
            "MODEL_FAILED"
        );
    }

    #[test]
    fn test_is_validation() {
        assert!(LearningError::InsufficientSamples.is_validation());
        assert!(!LearningError::ModelFailed {
            model: "SVM".to_string(),
            reason: "boom".to_string()
        }
        .is_validation());
    }
}
