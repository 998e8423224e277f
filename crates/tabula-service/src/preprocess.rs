//! Preprocessing service.
//!
//! Runs the processing pipeline against a session's table and stores the
//! result as the session's single preprocessed artifact, replacing any
//! prior one.

use crate::error::{Result, ServiceError};
use crate::session::SessionStore;
use crate::state::{AppState, PreprocessedArtifact};
use crate::types::{PreprocessRequest, PreprocessResponse};
use polars::prelude::*;
use serde_json::{Map, Value};
use std::sync::Arc;
use tabula_processing::utils::{as_f64, is_numeric_series, string_labels};
use tabula_processing::run_pipeline;
use tracing::info;

/// Number of rows included in the response preview.
const PREVIEW_ROWS: usize = 10;

/// Builds and stores preprocessed artifacts.
#[derive(Clone)]
pub struct PreprocessService {
    state: Arc<AppState>,
    sessions: SessionStore,
}

impl PreprocessService {
    pub fn new(state: Arc<AppState>, sessions: SessionStore) -> Self {
        Self { state, sessions }
    }

    /// Apply the configured pipeline to a session's table.
    pub fn apply(&self, session_id: &str, request: &PreprocessRequest) -> Result<PreprocessResponse> {
        request
            .config
            .validate()
            .map_err(|e| ServiceError::Validation(e.to_string()))?;
        if request.target_column.is_empty() {
            return Err(ServiceError::Validation(
                "target_column must not be empty".to_string(),
            ));
        }

        let table = self.sessions.get(session_id)?;
        let outcome = run_pipeline(&table, &request.target_column, &request.config)?;

        let preview = preview_rows(&outcome.table, PREVIEW_ROWS)?;
        let diff = outcome.diff.clone();

        // At most one live artifact per session: this replaces any prior one.
        self.state.artifacts.write().insert(
            session_id.to_string(),
            PreprocessedArtifact {
                table: outcome.table,
                spec: outcome.spec,
                transform: outcome.transform,
                target_column: request.target_column.clone(),
                test_fraction: request.config.test_fraction,
            },
        );
        info!(session = %session_id, "stored preprocessed artifact");

        Ok(PreprocessResponse {
            message: "Preprocessing completed successfully".to_string(),
            preview,
            diff,
        })
    }

    /// Whether a session currently has a live artifact.
    pub fn has_artifact(&self, session_id: &str) -> bool {
        self.state.artifacts.read().contains_key(session_id)
    }
}

/// The first `limit` rows as JSON objects (column name -> value).
fn preview_rows(df: &DataFrame, limit: usize) -> Result<Vec<Map<String, Value>>> {
    let n = df.height().min(limit);
    let mut rows: Vec<Map<String, Value>> = vec![Map::new(); n];
    for column in df.get_columns() {
        let series = column.as_materialized_series();
        let name = series.name().to_string();
        if is_numeric_series(series) {
            let values = as_f64(series).map_err(|e| ServiceError::System(e.to_string()))?;
            for (i, value) in values.into_iter().take(n).enumerate() {
                rows[i].insert(
                    name.clone(),
                    value.and_then(|v| serde_json::Number::from_f64(v).map(Value::Number))
                        .unwrap_or(Value::Null),
                );
            }
        } else {
            let values = string_labels(series).map_err(|e| ServiceError::System(e.to_string()))?;
            for (i, value) in values.into_iter().take(n).enumerate() {
                rows[i].insert(name.clone(), value.map(Value::String).unwrap_or(Value::Null));
            }
        }
    }
    Ok(rows)
}
