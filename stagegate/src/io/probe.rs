//! Exit-condition evaluation against the workspace and execution log.
//!
//! Every probe is a single bounded filesystem call. Failures of any kind
//! (missing path, permission denied, unreadable content) count as "not met";
//! nothing here returns an error or writes to disk.

use std::fs;
use std::path::Path;

use tracing::{debug, trace};

use crate::core::gate::{ExitCondition, Gate, count_lines, wrap_marker};

/// Decide whether `condition` holds for the workspace at `root`.
///
/// `log_path` is the execution log supplied by the host, if any. Empty and
/// unrecognized conditions pass.
pub fn evaluate(condition: &ExitCondition, root: &Path, log_path: Option<&Path>) -> bool {
    let gate = condition.gate();
    let met = match gate {
        Gate::FileExists { path, min_lines } => file_gate(&root.join(path), min_lines),
        Gate::DirectoryExists { path, min_files } => dir_gate(&root.join(path), min_files),
        Gate::LogContainsMarker { marker } => log_path.is_some_and(|log| log_contains(log, marker)),
        Gate::Open => true,
    };
    debug!(%gate, met, "exit condition evaluated");
    met
}

/// Line count of a regular file, or `None` if it cannot be read.
pub fn line_count(path: &Path) -> Option<u64> {
    match fs::read(path) {
        Ok(bytes) => Some(count_lines(&bytes)),
        Err(err) => {
            trace!(path = %path.display(), %err, "line count unavailable");
            None
        }
    }
}

/// Number of direct children of `dir` that resolve to regular files.
///
/// Subdirectories (including symlinks to directories) are not counted and
/// not descended into.
pub fn file_count(dir: &Path) -> Option<u64> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            trace!(path = %dir.display(), %err, "file count unavailable");
            return None;
        }
    };
    let count = entries
        .filter_map(Result::ok)
        .filter(|entry| fs::metadata(entry.path()).is_ok_and(|meta| meta.is_file()))
        .count();
    Some(count as u64)
}

fn file_gate(path: &Path, min_lines: Option<u64>) -> bool {
    if !fs::metadata(path).is_ok_and(|meta| meta.is_file()) {
        return false;
    }
    match min_lines {
        None => true,
        Some(min) => line_count(path).is_some_and(|lines| lines >= min),
    }
}

fn dir_gate(path: &Path, min_files: Option<u64>) -> bool {
    if !fs::metadata(path).is_ok_and(|meta| meta.is_dir()) {
        return false;
    }
    match min_files {
        None => true,
        Some(min) => file_count(path).is_some_and(|files| files >= min),
    }
}

fn log_contains(log: &Path, marker: &str) -> bool {
    match fs::read(log) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).contains(&wrap_marker(marker)),
        Err(err) => {
            trace!(path = %log.display(), %err, "execution log unavailable");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{write_files, write_lines};

    #[test]
    fn file_gate_threshold_is_inclusive() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        let cond = ExitCondition::file_exists("a.md", Some(50));

        // 48 newlines → 49 segments.
        write_lines(&root.join("a.md"), 49);
        assert!(!evaluate(&cond, root, None));

        write_lines(&root.join("a.md"), 50);
        assert!(evaluate(&cond, root, None));
    }

    #[test]
    fn empty_file_counts_as_one_line() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        fs::write(root.join("empty.md"), "").expect("write");

        assert!(evaluate(&ExitCondition::file_exists("empty.md", Some(1)), root, None));
        assert!(!evaluate(&ExitCondition::file_exists("empty.md", Some(2)), root, None));
        assert_eq!(line_count(&root.join("empty.md")), Some(1));
    }

    #[test]
    fn file_gate_without_threshold_needs_only_existence() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        let cond = ExitCondition::file_exists("notes.md", None);
        assert!(!evaluate(&cond, root, None));
        fs::write(root.join("notes.md"), "x").expect("write");
        assert!(evaluate(&cond, root, None));
    }

    #[test]
    fn file_gate_rejects_directories() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        fs::create_dir(root.join("a.md")).expect("mkdir");
        assert!(!evaluate(&ExitCondition::file_exists("a.md", None), root, None));
    }

    #[test]
    fn directory_gate_counts_only_regular_files() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        let src = root.join("src");
        write_files(&src, &["a.rs", "b.rs"]);
        for sub in ["one", "two", "three", "four", "five"] {
            fs::create_dir_all(src.join(sub)).expect("mkdir");
            fs::write(src.join(sub).join("nested.rs"), "").expect("write nested");
        }
        let cond = ExitCondition::directory_exists("src", Some(3));
        assert!(!evaluate(&cond, root, None));
        assert_eq!(file_count(&src), Some(2));

        write_files(&src, &["c.rs"]);
        assert!(evaluate(&cond, root, None));
    }

    #[cfg(unix)]
    #[test]
    fn directory_gate_skips_symlinks_to_directories() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        let src = root.join("src");
        write_files(&src, &["a.rs"]);
        fs::create_dir_all(root.join("elsewhere")).expect("mkdir");
        std::os::unix::fs::symlink(root.join("elsewhere"), src.join("link")).expect("symlink");
        assert_eq!(file_count(&src), Some(1));
    }

    #[test]
    fn directory_gate_requires_a_directory() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        fs::write(root.join("src"), "not a dir").expect("write");
        assert!(!evaluate(&ExitCondition::directory_exists("src", None), root, None));
        assert!(!evaluate(&ExitCondition::directory_exists("missing", None), root, None));
    }

    #[test]
    fn marker_must_be_wrapped() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        let log = root.join("transcript.jsonl");
        let cond = ExitCondition::log_marker("DONE");

        fs::write(&log, "all DONE here\n").expect("write");
        assert!(!evaluate(&cond, root, Some(&log)));

        fs::write(&log, "{\"text\":\"<promise>DONE</promise>\"}\n").expect("write");
        assert!(evaluate(&cond, root, Some(&log)));
    }

    #[test]
    fn marker_without_log_is_not_met() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        let cond = ExitCondition::log_marker("DONE");
        assert!(!evaluate(&cond, root, None));
        assert!(!evaluate(&cond, root, Some(&root.join("missing.log"))));
    }

    #[test]
    fn open_condition_passes() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert!(evaluate(&ExitCondition::default(), temp.path(), None));
    }
}
