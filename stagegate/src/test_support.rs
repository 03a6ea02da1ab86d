//! Test-only helpers for building run states and scratch workspaces.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

use crate::core::gate::ExitCondition;
use crate::core::types::{RunState, StageDefinition};
use crate::io::hook::StepTrigger;
use crate::io::init::GatePaths;
use crate::io::run_state::{load_run_state, write_run_state};
use crate::plan::{DEFAULT_WORKFLOW, default_stages};
use crate::start::{StartOptions, StartOutcome, start_run};
use crate::step::{StepOutcome, run_step};

/// Deterministic timestamp for assertions.
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5)
        .single()
        .expect("valid timestamp")
}

/// A run on the default plan, sitting at its first stage with no attempts.
pub fn sample_state() -> RunState {
    RunState {
        active_stage: "architect".to_string(),
        max_stages: 0,
        workflow: DEFAULT_WORKFLOW.to_string(),
        input_document: "prd.md".to_string(),
        input_document_path: "/work/prd.md".to_string(),
        started_at: Some(fixed_now()),
        completed_at: None,
        iterations: Default::default(),
        stages: default_stages(),
    }
}

/// A stage with an open gate and a conventional instruction path.
pub fn stage(name: &str) -> StageDefinition {
    StageDefinition {
        name: name.to_string(),
        instruction_ref: GatePaths::instruction_ref(name),
        exit_when: ExitCondition::default(),
    }
}

/// Write a file with exactly `lines` newline-separated segments.
pub fn write_lines(path: &Path, lines: u64) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent");
    }
    let body = (1..=lines)
        .map(|i| format!("line {i}"))
        .collect::<Vec<_>>()
        .join("\n");
    fs::write(path, body).expect("write lines");
}

/// Create empty regular files named `names` inside `dir`.
pub fn write_files(dir: &Path, names: &[&str]) {
    fs::create_dir_all(dir).expect("create dir");
    for name in names {
        fs::write(dir.join(name), "").expect("write file");
    }
}

/// Scratch workspace with an input document, driven through the library API.
pub struct TestWorkspace {
    temp: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir()?;
        fs::write(temp.path().join("prd.md"), "# Product\n\nBuild a thing.\n")?;
        Ok(Self { temp })
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn paths(&self) -> GatePaths {
        GatePaths::new(self.root())
    }

    /// Initialize a run on `prd.md` with the default plan.
    pub fn start(&self, max_stages: u32) -> Result<StartOutcome> {
        start_run(
            self.root(),
            &StartOptions {
                input_document: "prd.md".to_string(),
                workflow: DEFAULT_WORKFLOW.to_string(),
                max_stages,
            },
        )
    }

    pub fn step(&self) -> Result<StepOutcome> {
        run_step(self.root(), &StepTrigger::default())
    }

    pub fn step_with_log(&self, log: &Path) -> Result<StepOutcome> {
        run_step(self.root(), &StepTrigger::with_log(log))
    }

    pub fn read_state(&self) -> Result<RunState> {
        Ok(load_run_state(&self.paths().run_state_path)?)
    }

    pub fn write_state(&self, state: &RunState) -> Result<()> {
        Ok(write_run_state(&self.paths().run_state_path, state)?)
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root().join(relative)
    }

    /// Satisfy the gate of the default plan's stage `name`.
    pub fn satisfy(&self, name: &str) -> Result<()> {
        match name {
            "architect" => write_lines(&self.path("architecture.md"), 50),
            "qa" => write_lines(&self.path("test-plan.md"), 30),
            "security" => write_lines(&self.path("security-assessment.md"), 20),
            "implementer" => write_files(&self.path("src"), &["main.rs", "lib.rs", "api.rs"]),
            "verifier" => fs::write(self.path("session.log"), "ok <promise>DONE</promise>\n")?,
            other => anyhow::bail!("no default gate for stage '{other}'"),
        }
        Ok(())
    }
}
