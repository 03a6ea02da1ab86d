//! Exit conditions and the helpers used to judge them.
//!
//! The persisted form is a flat object so that documents written by a newer
//! plan (with keys this build does not know) still load and round-trip
//! unchanged. [`ExitCondition::gate`] gives the tagged view used for evaluation.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opening delimiter around a completion marker in the execution log.
pub const MARKER_OPEN: &str = "<promise>";
/// Closing delimiter around a completion marker in the execution log.
pub const MARKER_CLOSE: &str = "</promise>";

/// Persisted exit condition (`exit_when`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExitCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_exists: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_lines: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory_exists: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_files: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_marker: Option<String>,
    /// Keys this build does not understand, kept verbatim.
    #[serde(flatten)]
    pub unrecognized: BTreeMap<String, Value>,
}

/// Tagged view of an [`ExitCondition`]; exactly one case applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate<'a> {
    FileExists {
        path: &'a str,
        min_lines: Option<u64>,
    },
    DirectoryExists {
        path: &'a str,
        min_files: Option<u64>,
    },
    LogContainsMarker {
        marker: &'a str,
    },
    /// Empty or unrecognized condition. Always passes.
    Open,
}

impl ExitCondition {
    pub fn file_exists(path: impl Into<String>, min_lines: Option<u64>) -> Self {
        Self {
            file_exists: Some(path.into()),
            min_lines,
            ..Self::default()
        }
    }

    pub fn directory_exists(path: impl Into<String>, min_files: Option<u64>) -> Self {
        Self {
            directory_exists: Some(path.into()),
            min_files,
            ..Self::default()
        }
    }

    pub fn log_marker(marker: impl Into<String>) -> Self {
        Self {
            log_marker: Some(marker.into()),
            ..Self::default()
        }
    }

    /// Resolve the populated case. Precedence: file, directory, log marker.
    ///
    /// A zero threshold is treated as no threshold.
    pub fn gate(&self) -> Gate<'_> {
        if let Some(path) = self.file_exists.as_deref() {
            return Gate::FileExists {
                path,
                min_lines: self.min_lines.filter(|n| *n > 0),
            };
        }
        if let Some(path) = self.directory_exists.as_deref() {
            return Gate::DirectoryExists {
                path,
                min_files: self.min_files.filter(|n| *n > 0),
            };
        }
        if let Some(marker) = self.log_marker.as_deref() {
            return Gate::LogContainsMarker { marker };
        }
        Gate::Open
    }
}

impl fmt::Display for Gate<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gate::FileExists {
                path,
                min_lines: Some(n),
            } => write!(f, "file `{path}` with at least {n} lines"),
            Gate::FileExists {
                path,
                min_lines: None,
            } => write!(f, "file `{path}` exists"),
            Gate::DirectoryExists {
                path,
                min_files: Some(n),
            } => write!(f, "directory `{path}` with at least {n} files"),
            Gate::DirectoryExists {
                path,
                min_files: None,
            } => write!(f, "directory `{path}` exists"),
            Gate::LogContainsMarker { marker } => {
                write!(f, "output contains {}", wrap_marker(marker))
            }
            Gate::Open => write!(f, "no condition"),
        }
    }
}

/// Literal text the execution log must contain for `marker` to count.
pub fn wrap_marker(marker: &str) -> String {
    format!("{MARKER_OPEN}{marker}{MARKER_CLOSE}")
}

/// Number of `\n`-separated segments in `content`.
///
/// An empty file is one segment, and so is a single line without a trailing
/// newline; `"a\n"` is two. Thresholds in the default plan assume this count.
pub fn count_lines(content: &[u8]) -> u64 {
    content.iter().filter(|b| **b == b'\n').count() as u64 + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_prefers_file_then_directory_then_marker() {
        let mut cond = ExitCondition::log_marker("DONE");
        cond.directory_exists = Some("src".to_string());
        assert_eq!(
            cond.gate(),
            Gate::DirectoryExists {
                path: "src",
                min_files: None
            }
        );
        cond.file_exists = Some("a.md".to_string());
        assert!(matches!(cond.gate(), Gate::FileExists { path: "a.md", .. }));
    }

    #[test]
    fn zero_threshold_means_no_threshold() {
        let cond = ExitCondition::file_exists("a.md", Some(0));
        assert_eq!(
            cond.gate(),
            Gate::FileExists {
                path: "a.md",
                min_lines: None
            }
        );
    }

    #[test]
    fn unknown_keys_are_open_and_round_trip() {
        let raw = r#"{"url_responds":"http://localhost:8080","timeout":5}"#;
        let cond: ExitCondition = serde_json::from_str(raw).expect("parse");
        assert_eq!(cond.gate(), Gate::Open);
        assert_eq!(cond.unrecognized.len(), 2);

        let back = serde_json::to_value(&cond).expect("serialize");
        let expected: Value = serde_json::from_str(raw).expect("parse value");
        assert_eq!(back, expected);
    }

    #[test]
    fn empty_condition_is_open() {
        let cond: ExitCondition = serde_json::from_str("{}").expect("parse");
        assert_eq!(cond.gate(), Gate::Open);
        assert_eq!(serde_json::to_string(&cond).expect("serialize"), "{}");
    }

    #[test]
    fn line_count_treats_empty_content_as_one_line() {
        assert_eq!(count_lines(b""), 1);
        assert_eq!(count_lines(b"one"), 1);
        assert_eq!(count_lines(b"one\n"), 2);
        assert_eq!(count_lines(b"one\ntwo\nthree"), 3);
    }

    #[test]
    fn marker_is_wrapped_in_promise_tags() {
        assert_eq!(wrap_marker("DONE"), "<promise>DONE</promise>");
    }

    #[test]
    fn gate_display_names_thresholds() {
        let cond = ExitCondition::file_exists("architecture.md", Some(50));
        assert_eq!(
            cond.gate().to_string(),
            "file `architecture.md` with at least 50 lines"
        );
        let cond = ExitCondition::directory_exists("src", Some(3));
        assert_eq!(
            cond.gate().to_string(),
            "directory `src` with at least 3 files"
        );
    }
}
