//! Best-effort scan of milestone artifacts for human-facing summaries.

use std::fs;
use std::path::Path;

use super::config::{Milestone, MilestoneKind};
use super::probe::{file_count, line_count};

/// Rendered when no milestone exists yet.
pub const NO_OUTPUTS: &str = "(no outputs yet)";

/// A milestone found in the workspace, with its size proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MilestoneReport {
    pub key: String,
    pub label: String,
    pub kind: MilestoneKind,
    /// Line count for files, direct file count for directories.
    pub size: u64,
}

/// Report every milestone that currently exists, in configuration order.
///
/// Absent artifacts are skipped silently.
pub fn scan_milestones(root: &Path, milestones: &[Milestone]) -> Vec<MilestoneReport> {
    milestones
        .iter()
        .filter_map(|milestone| {
            let path = root.join(&milestone.path);
            let meta = fs::metadata(&path).ok()?;
            let size = match milestone.kind {
                MilestoneKind::File if meta.is_file() => line_count(&path).unwrap_or(0),
                MilestoneKind::Directory if meta.is_dir() => file_count(&path).unwrap_or(0),
                _ => return None,
            };
            Some(MilestoneReport {
                key: milestone.key.clone(),
                label: milestone.label(),
                kind: milestone.kind,
                size,
            })
        })
        .collect()
}

/// One-line progress summary, e.g. `architecture.md ✓, src/ ✓`.
pub fn progress_summary(root: &Path, milestones: &[Milestone]) -> String {
    let found = scan_milestones(root, milestones);
    if found.is_empty() {
        return NO_OUTPUTS.to_string();
    }
    found
        .iter()
        .map(|report| format!("{} ✓", report.label))
        .collect::<Vec<_>>()
        .join(", ")
}
