//! The session store.
//!
//! Owns dataset admission, access-time refresh, and time-based eviction.
//! Raw upload bytes are persisted to a data directory best-effort so a
//! restart can recover sessions; persistence failures are logged, never
//! fatal.

use crate::error::{Result, ServiceError};
use crate::state::{AppState, SessionEntry};
use polars::prelude::*;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tabula_processing::issues::{detect_issues, IssueFinding, IssueThresholds};
use tabula_processing::profiler::{
    dataset_profile, dataset_schema, infer_target_candidates, missing_cell_count, ColumnSchema,
    DatasetProfile,
};
use tracing::{info, warn};
use uuid::Uuid;

/// Admission caps.
const MAX_ROWS: usize = 100_000;
const MAX_COLS: usize = 100;
/// Minimum fraction of non-null cells.
const MIN_NON_NULL_RATIO: f64 = 0.1;
/// Default eviction age when the caller passes a non-positive value.
const DEFAULT_MAX_AGE_HOURS: i64 = 24;

/// Outcome of a successful upload.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct UploadOutcome {
    pub session_id: String,
    pub target_candidates: Vec<String>,
}

/// Summary statistics for a stored session.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SessionSummary {
    pub shape: (usize, usize),
    pub profile: DatasetProfile,
    pub schema: Vec<ColumnSchema>,
}

/// Session admission, retrieval and eviction.
#[derive(Clone)]
pub struct SessionStore {
    state: Arc<AppState>,
    data_dir: PathBuf,
}

impl SessionStore {
    /// Create a store backed by the shared state and a data directory for
    /// best-effort raw-byte persistence.
    pub fn new(state: Arc<AppState>, data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        if let Err(e) = std::fs::create_dir_all(&data_dir) {
            warn!(dir = %data_dir.display(), error = %e, "failed to create data directory");
        }
        Self { state, data_dir }
    }

    fn parse_csv(bytes: &[u8]) -> Result<DataFrame> {
        CsvReadOptions::default()
            .with_has_header(true)
            .into_reader_with_file_handle(Cursor::new(bytes))
            .finish()
            .map_err(|e| ServiceError::Validation(format!("Failed to parse CSV: {e}")))
    }

    /// Duplicate names in the raw header line. Polars deduplicates them on
    /// read, so the check has to happen on the bytes.
    fn duplicate_header_names(bytes: &[u8]) -> bool {
        let text = String::from_utf8_lossy(bytes);
        let Some(header) = text.lines().next() else {
            return false;
        };
        let names: Vec<String> = header
            .split(',')
            .map(|name| name.trim().trim_matches('"').to_string())
            .collect();
        let mut seen = std::collections::HashSet::new();
        names.iter().any(|name| !seen.insert(name.clone()))
    }

    /// Validate, store and profile an uploaded dataset.
    ///
    /// Returns a fresh session id and the target-column candidates. All
    /// rejections happen before an id is issued.
    pub fn admit(&self, bytes: &[u8]) -> Result<UploadOutcome> {
        if bytes.is_empty() {
            return Err(ServiceError::Validation("Empty file provided".to_string()));
        }
        if Self::duplicate_header_names(bytes) {
            return Err(ServiceError::Validation(
                "Dataset contains duplicate column names".to_string(),
            ));
        }

        let df = Self::parse_csv(bytes)?;
        if df.height() == 0 {
            return Err(ServiceError::Validation(
                "Dataset is empty (no rows)".to_string(),
            ));
        }
        if df.width() == 0 {
            return Err(ServiceError::Validation(
                "Dataset has no columns".to_string(),
            ));
        }
        if df.height() > MAX_ROWS {
            return Err(ServiceError::Validation(format!(
                "Dataset too large: {} rows (max: {MAX_ROWS})",
                df.height()
            )));
        }
        if df.width() > MAX_COLS {
            return Err(ServiceError::Validation(format!(
                "Dataset too wide: {} columns (max: {MAX_COLS})",
                df.width()
            )));
        }

        let cells = df.height() * df.width();
        let missing = missing_cell_count(&df);
        if missing == cells {
            return Err(ServiceError::Validation(
                "Dataset contains only null values".to_string(),
            ));
        }
        let non_null_ratio = (cells - missing) as f64 / cells as f64;
        if non_null_ratio < MIN_NON_NULL_RATIO {
            return Err(ServiceError::Validation(format!(
                "Insufficient non-null data: {non_null_ratio:.2}"
            )));
        }

        let session_id = Uuid::new_v4().to_string();

        let target_candidates = match infer_target_candidates(&df) {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(session = %session_id, error = %e, "target candidate inference failed");
                df.get_column_names()
                    .iter()
                    .take(5)
                    .map(|name| name.to_string())
                    .collect()
            }
        };

        let shape = (df.height(), df.width());
        self.state.sessions.write().insert(
            session_id.clone(),
            SessionEntry {
                table: df,
                last_access: SystemTime::now(),
            },
        );

        // Best-effort durable copy of the raw upload.
        let path = self.data_dir.join(format!("{session_id}.csv"));
        if let Err(e) = std::fs::write(&path, bytes) {
            warn!(session = %session_id, error = %e, "failed to persist dataset to disk");
        }

        info!(session = %session_id, rows = shape.0, cols = shape.1, "dataset admitted");
        Ok(UploadOutcome {
            session_id,
            target_candidates,
        })
    }

    fn load_from_disk(&self, session_id: &str) -> Option<DataFrame> {
        let path = self.data_dir.join(format!("{session_id}.csv"));
        let bytes = std::fs::read(&path).ok()?;
        match Self::parse_csv(&bytes) {
            Ok(df) => Some(df),
            Err(e) => {
                warn!(session = %session_id, error = %e, "failed to load dataset from disk");
                None
            }
        }
    }

    /// Fetch a session's table, refreshing its access time.
    ///
    /// Falls back to the durable copy when the session is not in memory. An
    /// empty stored table is a corruption error and purges the entry.
    pub fn get(&self, session_id: &str) -> Result<DataFrame> {
        if session_id.is_empty() {
            return Err(ServiceError::Validation("Invalid session id".to_string()));
        }

        let in_memory = self.state.sessions.read().contains_key(session_id);
        if !in_memory {
            let Some(df) = self.load_from_disk(session_id) else {
                return Err(ServiceError::NotFound(format!(
                    "Session {session_id} not found"
                )));
            };
            self.state.sessions.write().insert(
                session_id.to_string(),
                SessionEntry {
                    table: df,
                    last_access: SystemTime::now(),
                },
            );
        }

        let mut sessions = self.state.sessions.write();
        let Some(entry) = sessions.get_mut(session_id) else {
            // Raced with eviction between the two lock scopes.
            return Err(ServiceError::NotFound(format!(
                "Session {session_id} not found"
            )));
        };
        if entry.table.height() == 0 || entry.table.width() == 0 {
            sessions.remove(session_id);
            warn!(session = %session_id, "purged corrupted session");
            return Err(ServiceError::Corrupted(format!(
                "Session {session_id} is corrupted or empty"
            )));
        }
        entry.last_access = SystemTime::now();
        Ok(entry.table.clone())
    }

    /// Whether a session currently exists in memory.
    pub fn exists(&self, session_id: &str) -> bool {
        self.state.sessions.read().contains_key(session_id)
    }

    /// Summary statistics for a session's table.
    pub fn summary(&self, session_id: &str) -> Result<SessionSummary> {
        let df = self.get(session_id)?;
        Ok(SessionSummary {
            shape: (df.height(), df.width()),
            profile: dataset_profile(&df).map_err(ServiceError::from)?,
            schema: dataset_schema(&df, 3).map_err(ServiceError::from)?,
        })
    }

    /// Detect data-quality issues in a session's table.
    pub fn issues(&self, session_id: &str, target_column: &str) -> Result<Vec<IssueFinding>> {
        let df = self.get(session_id)?;
        detect_issues(&df, target_column, &IssueThresholds::default())
            .map_err(ServiceError::from)
    }

    /// Remove every session not accessed for `max_age_hours`, together with
    /// its artifact and training job. Returns the number removed.
    ///
    /// Non-positive ages fall back to the default. Faults are swallowed so
    /// housekeeping never takes down a request path.
    pub fn evict(&self, max_age_hours: i64) -> usize {
        let max_age_hours = if max_age_hours <= 0 {
            warn!(
                max_age_hours,
                "invalid eviction age, using default of {DEFAULT_MAX_AGE_HOURS}"
            );
            DEFAULT_MAX_AGE_HOURS
        } else {
            max_age_hours
        };
        let max_age = Duration::from_secs(max_age_hours as u64 * 3600);
        let now = SystemTime::now();

        // Snapshot the ids and timestamps so concurrent insertions and
        // removals during the sweep are tolerated.
        let snapshot: Vec<(String, SystemTime)> = self
            .state
            .sessions
            .read()
            .iter()
            .map(|(id, entry)| (id.clone(), entry.last_access))
            .collect();

        let mut removed = 0usize;
        for (session_id, last_access) in snapshot {
            let stale = match now.duration_since(last_access) {
                Ok(age) => age >= max_age,
                // A timestamp in the future is invalid; remove it.
                Err(_) => true,
            };
            if !stale {
                continue;
            }
            self.state.sessions.write().remove(&session_id);
            self.state.artifacts.write().remove(&session_id);
            self.state.jobs.write().remove(&session_id);
            removed += 1;
            info!(session = %session_id, "removed inactive session");
        }
        if removed > 0 {
            info!(removed, "eviction sweep finished");
        }
        removed
    }

    /// Backdate a session's access time (test hook for eviction).
    #[doc(hidden)]
    pub fn set_last_access(&self, session_id: &str, last_access: SystemTime) {
        if let Some(entry) = self.state.sessions.write().get_mut(session_id) {
            entry.last_access = last_access;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::TrainingJob;
    use pretty_assertions::assert_eq;

    fn store() -> (SessionStore, Arc<AppState>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let state = Arc::new(AppState::new());
        (SessionStore::new(state.clone(), dir.path()), state, dir)
    }

    const CSV: &[u8] = b"age,city,label\n25,ams,yes\n31,rot,no\n29,ams,yes\n";

    #[test]
    fn test_admit_and_get() {
        let (store, _, _dir) = store();
        let outcome = store.admit(CSV).unwrap();
        assert!(!outcome.session_id.is_empty());
        assert!(outcome.target_candidates.contains(&"label".to_string()));

        let df = store.get(&outcome.session_id).unwrap();
        assert_eq!(df.height(), 3);
        assert_eq!(df.width(), 3);
    }

    #[test]
    fn test_admit_rejects_empty_bytes() {
        let (store, _, _dir) = store();
        let err = store.admit(b"").unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_admit_rejects_zero_rows() {
        let (store, _, _dir) = store();
        let err = store.admit(b"a,b,c\n").unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
        assert!(err.to_string().contains("no rows"));
    }

    #[test]
    fn test_admit_rejects_duplicate_columns() {
        let (store, _, _dir) = store();
        let err = store.admit(b"a,a\n1,2\n").unwrap_err();
        assert!(err.to_string().contains("duplicate column names"));
    }

    #[test]
    fn test_admit_rejects_all_null() {
        let (store, _, _dir) = store();
        let err = store.admit(b"a,b\n,\n,\n").unwrap_err();
        assert!(err.to_string().contains("only null values"));
    }

    #[test]
    fn test_admit_rejects_too_wide() {
        let (store, _, _dir) = store();
        let header: Vec<String> = (0..101).map(|i| format!("c{i}")).collect();
        let row: Vec<String> = (0..101).map(|i| i.to_string()).collect();
        let csv = format!("{}\n{}\n", header.join(","), row.join(","));
        let err = store.admit(csv.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("too wide"));
    }

    #[test]
    fn test_summary_and_issues() {
        let (store, _, _dir) = store();
        let id = store
            .admit(b"age,label\n25,yes\n31,no\n,yes\n40,yes\n")
            .unwrap()
            .session_id;

        let summary = store.summary(&id).unwrap();
        assert_eq!(summary.shape, (4, 2));
        assert_eq!(summary.profile.missing_cells, 1);
        assert_eq!(summary.schema.len(), 2);

        let findings = store.issues(&id, "label").unwrap();
        assert!(findings.iter().any(|f| f.key == "missing_values"));
        assert!(findings.iter().any(|f| f.key == "class_imbalance"));
    }

    #[test]
    fn test_get_unknown_session() {
        let (store, _, _dir) = store();
        let err = store.get("nope").unwrap_err();
        assert_eq!(err.error_code(), "NOT_FOUND");
    }

    #[test]
    fn test_get_recovers_from_disk() {
        let (store, state, _dir) = store();
        let outcome = store.admit(CSV).unwrap();

        // Simulate a restart losing the in-memory entry.
        state.sessions.write().clear();
        let df = store.get(&outcome.session_id).unwrap();
        assert_eq!(df.height(), 3);
        assert!(store.exists(&outcome.session_id));
    }

    #[test]
    fn test_evict_removes_stale_from_all_maps() {
        let (store, state, _dir) = store();
        let old = store.admit(CSV).unwrap().session_id;
        let fresh = store.admit(CSV).unwrap().session_id;

        state.jobs.write().insert(old.clone(), TrainingJob::default());
        store.set_last_access(&old, SystemTime::now() - Duration::from_secs(2 * 3600));

        let removed = store.evict(1);
        assert_eq!(removed, 1);
        assert!(!state.sessions.read().contains_key(&old));
        assert!(!state.jobs.read().contains_key(&old));
        assert!(state.sessions.read().contains_key(&fresh));
    }

    #[test]
    fn test_evict_non_positive_age_uses_default() {
        let (store, _, _dir) = store();
        let id = store.admit(CSV).unwrap().session_id;
        // Default is 24h, so a fresh session survives a bogus parameter.
        assert_eq!(store.evict(0), 0);
        assert!(store.exists(&id));
    }

    #[test]
    fn test_evict_removes_future_timestamps() {
        let (store, _, _dir) = store();
        let id = store.admit(CSV).unwrap().session_id;
        store.set_last_access(&id, SystemTime::now() + Duration::from_secs(7200));
        assert_eq!(store.evict(24), 1);
        assert!(!store.exists(&id));
    }
}
