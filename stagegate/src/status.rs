//! Read-only `stagegate status` report.

use std::path::Path;

use anyhow::Result;

use crate::core::types::{RunPhase, RunState};
use crate::io::config::{MilestoneKind, load_config};
use crate::io::init::GatePaths;
use crate::io::progress::{MilestoneReport, scan_milestones};
use crate::io::run_state::load_run_state_if_present;

/// Snapshot of a run as shown by `stagegate status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusReport {
    /// No state document exists.
    Inactive,
    Active(RunSummary),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub stage: String,
    pub started: Option<String>,
    pub input: String,
    pub workflow: String,
    pub completed: usize,
    pub total: usize,
    pub iterations: u64,
    pub outputs: Vec<MilestoneReport>,
}

/// Build the status report for `root`.
///
/// State errors propagate; milestone scanning never fails.
pub fn read_status(root: &Path) -> Result<StatusReport> {
    let paths = GatePaths::new(root);
    let Some(state) = load_run_state_if_present(&paths.run_state_path)? else {
        return Ok(StatusReport::Inactive);
    };
    let milestones = load_config(&paths.config_path)?.milestones;
    Ok(StatusReport::Active(RunSummary {
        stage: state.active_stage.clone(),
        started: state.started_at.map(|at| at.to_rfc3339()),
        input: state.input_document_path.clone(),
        workflow: state.workflow.clone(),
        completed: completed_stages(&state),
        total: state.stages.len(),
        iterations: state.total_iterations(),
        outputs: scan_milestones(root, &milestones),
    }))
}

/// Stages already behind the run.
pub fn completed_stages(state: &RunState) -> usize {
    let total = state.stages.len();
    match state.phase() {
        RunPhase::Complete => total,
        RunPhase::StoppedAtMax => (state.max_stages as usize).min(total),
        RunPhase::Stage(_) => state.active_index().unwrap_or(0),
        RunPhase::Idle => 0,
    }
}

impl StatusReport {
    /// `KEY=value` lines, in display order.
    pub fn lines(&self) -> Vec<String> {
        let summary = match self {
            Self::Inactive => return vec!["ACTIVE=false".to_string()],
            Self::Active(summary) => summary,
        };
        let mut lines = vec![
            "ACTIVE=true".to_string(),
            format!("STAGE={}", summary.stage),
            format!("STARTED={}", summary.started.as_deref().unwrap_or("")),
            format!("INPUT={}", summary.input),
            format!("WORKFLOW={}", summary.workflow),
            format!("COMPLETED={}", summary.completed),
            format!("TOTAL={}", summary.total),
            format!("ITERATIONS={}", summary.iterations),
        ];
        for output in &summary.outputs {
            let value = match output.kind {
                MilestoneKind::File => output.size.to_string(),
                MilestoneKind::Directory => format!("{} files", output.size),
            };
            lines.push(format!("OUTPUT_{}={value}", output.key));
        }
        lines
    }
}
