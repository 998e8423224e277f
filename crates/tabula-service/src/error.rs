//! The service-level error taxonomy.
//!
//! Four caller-visible kinds: validation mistakes (never retried), missing
//! resources, per-session corruption, and internal faults. Per-model
//! computation failures are *not* represented here; they live as data in
//! the model's report. Background-job failures never surface through this
//! type either, only via status polling.

use serde::Serialize;
use serde::ser::SerializeStruct;
use tabula_learning::LearningError;
use tabula_processing::ProcessingError;
use thiserror::Error;

/// The main error type for service operations.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The request is malformed or infeasible; surfaced to the caller.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A referenced session or result version does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A stored session turned out to be unusable and was purged.
    #[error("Corrupted session: {0}")]
    Corrupted(String),

    /// A computation failed in a way that is not the caller's fault.
    #[error("Computation error: {0}")]
    Computation(String),

    /// Unexpected internal fault.
    #[error("System error: {0}")]
    System(String),
}

impl ServiceError {
    /// Get a stable code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Corrupted(_) => "CORRUPTED",
            Self::Computation(_) => "COMPUTATION_ERROR",
            Self::System(_) => "SYSTEM_ERROR",
        }
    }
}

impl From<ProcessingError> for ServiceError {
    fn from(err: ProcessingError) -> Self {
        if err.is_validation() {
            ServiceError::Validation(err.to_string())
        } else {
            ServiceError::System(err.to_string())
        }
    }
}

impl From<LearningError> for ServiceError {
    fn from(err: LearningError) -> Self {
        if err.is_validation() {
            ServiceError::Validation(err.to_string())
        } else {
            ServiceError::Computation(err.to_string())
        }
    }
}

/// Serialize errors as `{code, message}` for transport.
impl Serialize for ServiceError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("ServiceError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            ServiceError::Validation("bad".to_string()).error_code(),
            "VALIDATION_ERROR"
        );
        assert_eq!(
            ServiceError::NotFound("gone".to_string()).error_code(),
            "NOT_FOUND"
        );
    }

    #[test]
    fn test_processing_error_mapping() {
        let err: ServiceError = ProcessingError::InvalidData("empty".to_string()).into();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");

        let err: ServiceError =
            ProcessingError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk")).into();
        assert_eq!(err.error_code(), "SYSTEM_ERROR");
    }

    #[test]
    fn test_learning_error_mapping() {
        let err: ServiceError = LearningError::InsufficientSamples.into();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");

        let err: ServiceError = LearningError::ModelFailed {
            model: "SVM".to_string(),
            reason: "boom".to_string(),
        }
        .into();
        assert_eq!(err.error_code(), "COMPUTATION_ERROR");
    }

    #[test]
    fn test_serialization() {
        let json = serde_json::to_string(&ServiceError::NotFound("session x".to_string())).unwrap();
        assert!(json.contains("NOT_FOUND"));
        assert!(json.contains("session x"));
    }
}
