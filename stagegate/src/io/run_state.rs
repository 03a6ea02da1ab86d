//! Run state storage: the only channel between invocations.
//!
//! Loads are validated end to end (JSON, schema, typed shape, invariants) and
//! every failure maps to a [`StateError`]. Nothing here falls back to a default
//! value: a document that cannot be trusted is reported, never repaired.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use jsonschema::validator_for;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::core::invariants::validate_invariants;
use crate::core::types::RunState;

const RUN_STATE_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../schemas/run_state/v1.schema.json"
));

/// Failures at the run state boundary.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("read run state {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse run state {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("run state {path} failed schema validation: {}", .messages.join("; "))]
    Schema { path: PathBuf, messages: Vec<String> },

    #[error("run state {path} violates invariants: {}", .messages.join("; "))]
    Invariants { path: PathBuf, messages: Vec<String> },

    #[error("write run state {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialize run state: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("embedded run state schema is unusable: {0}")]
    EmbeddedSchema(String),
}

impl StateError {
    /// True when the document exists but cannot be trusted.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::Parse { .. } | Self::Schema { .. } | Self::Invariants { .. }
        )
    }

    /// Message with the underlying cause appended, for single-line diagnostics.
    pub fn detail(&self) -> String {
        match std::error::Error::source(self) {
            Some(source) => format!("{self}: {source}"),
            None => self.to_string(),
        }
    }
}

/// Load and validate run state from disk.
pub fn load_run_state(path: &Path) -> Result<RunState, StateError> {
    debug!(path = %path.display(), "loading run state");
    let contents = fs::read(path).map_err(|source| StateError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let state = parse_run_state(path, &contents)?;
    debug!(
        active_stage = %state.active_stage,
        stages = state.stages.len(),
        "run state loaded"
    );
    Ok(state)
}

/// Load run state, treating a missing document as "no run".
pub fn load_run_state_if_present(path: &Path) -> Result<Option<RunState>, StateError> {
    match load_run_state(path) {
        Ok(state) => Ok(Some(state)),
        Err(StateError::Read { source, .. }) if source.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "no run state");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

/// Atomically write run state to disk (temp file + rename).
///
/// The whole document is rewritten on every call so a reader sees either the
/// previous or the new state, never a mix.
pub fn write_run_state(path: &Path, state: &RunState) -> Result<(), StateError> {
    debug!(
        path = %path.display(),
        active_stage = %state.active_stage,
        "writing run state"
    );
    let mut buf = serde_json::to_string_pretty(state).map_err(StateError::Serialize)?;
    buf.push('\n');
    write_atomic(path, &buf).map_err(|source| StateError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Remove the run state document. Returns false when there was none.
pub fn remove_run_state(path: &Path) -> Result<bool, StateError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(source) => Err(StateError::Write {
            path: path.to_path_buf(),
            source,
        }),
    }
}

// Bytes, not text: invalid UTF-8 is a parse failure like any other.
fn parse_run_state(path: &Path, contents: &[u8]) -> Result<RunState, StateError> {
    let value: Value = serde_json::from_slice(contents).map_err(|source| StateError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    validate_schema(path, &value)?;
    let state: RunState = serde_json::from_value(value).map_err(|source| StateError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let errors = validate_invariants(&state);
    if !errors.is_empty() {
        return Err(StateError::Invariants {
            path: path.to_path_buf(),
            messages: errors,
        });
    }
    Ok(state)
}

fn validate_schema(path: &Path, value: &Value) -> Result<(), StateError> {
    let schema: Value = serde_json::from_str(RUN_STATE_SCHEMA)
        .map_err(|err| StateError::EmbeddedSchema(err.to_string()))?;
    let compiled =
        validator_for(&schema).map_err(|err| StateError::EmbeddedSchema(err.to_string()))?;
    if compiled.is_valid(value) {
        return Ok(());
    }
    let messages = compiled
        .iter_errors(value)
        .map(|err| err.to_string())
        .collect::<Vec<_>>();
    Err(StateError::Schema {
        path: path.to_path_buf(),
        messages,
    })
}

fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)?;
    fs::rename(&tmp_path, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_state;

    /// Verifies write → read preserves all fields, including unknown gate keys.
    #[test]
    fn run_state_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("state").join("run_state.json");

        let mut state = sample_state();
        state.iterations.insert("architect".to_string(), 2);
        state.stages[1]
            .exit_when
            .unrecognized
            .insert("future_gate".to_string(), Value::Bool(true));

        write_run_state(&path, &state).expect("write");
        let loaded = load_run_state(&path).expect("load");
        assert_eq!(loaded, state);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn written_document_is_pretty_with_trailing_newline() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("run_state.json");
        write_run_state(&path, &sample_state()).expect("write");
        let contents = fs::read_to_string(&path).expect("read");
        assert!(contents.starts_with("{\n  \"active_stage\": \"architect\""));
        assert!(contents.ends_with("}\n"));
    }

    #[test]
    fn missing_document_is_none() {
        let temp = tempfile::tempdir().expect("tempdir");
        let loaded = load_run_state_if_present(&temp.path().join("run_state.json"))
            .expect("load");
        assert!(loaded.is_none());
    }

    #[test]
    fn garbage_is_corruption() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("run_state.json");
        fs::write(&path, "{ not json").expect("write");
        let err = load_run_state_if_present(&path).expect_err("corrupt");
        assert!(err.is_corruption());
        assert!(matches!(err, StateError::Parse { .. }));
    }

    #[test]
    fn invalid_utf8_is_corruption() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("run_state.json");
        fs::write(&path, [0xff, 0xfe, 0x00, 0x7b]).expect("write");
        let err = load_run_state_if_present(&path).expect_err("corrupt");
        assert!(err.is_corruption());
        assert!(matches!(err, StateError::Parse { .. }));
    }

    #[test]
    fn error_message_names_the_cause_once() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("run_state.json");
        fs::write(&path, "{ not json").expect("write");
        let err = anyhow::Error::from(load_run_state(&path).expect_err("corrupt"));
        let cause = err.root_cause().to_string();
        assert_eq!(format!("{err:#}").matches(&cause).count(), 1);
    }

    #[test]
    fn wrong_shape_is_schema_corruption() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("run_state.json");
        fs::write(&path, r#"{"active_stage": 7, "stages": []}"#).expect("write");
        let err = load_run_state(&path).expect_err("schema");
        assert!(err.is_corruption());
        match err {
            StateError::Schema { messages, .. } => assert!(!messages.is_empty()),
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn invariant_violation_is_corruption() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("run_state.json");
        let mut state = sample_state();
        state.iterations.insert("ghost".to_string(), 1);
        write_run_state(&path, &state).expect("write");

        let err = load_run_state(&path).expect_err("invariants");
        assert!(err.is_corruption());
        assert!(err.to_string().contains("unknown stage 'ghost'"));
    }

    #[test]
    fn remove_reports_whether_a_document_existed() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("run_state.json");
        assert!(!remove_run_state(&path).expect("remove missing"));
        write_run_state(&path, &sample_state()).expect("write");
        assert!(remove_run_state(&path).expect("remove"));
        assert!(!path.exists());
    }
}
