//! Orchestration for starting a new run.
//!
//! Starting a run freezes the default plan into a fresh run state document,
//! writes one instruction template per stage, and seeds the config file. All
//! validation happens before anything is written.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{SubsecRound, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::template::render_instruction;
use crate::core::types::RunState;
use crate::io::init::{GatePaths, ensure_config, write_templates};
use crate::io::run_state::{load_run_state_if_present, write_run_state};
use crate::plan::{DEFAULT_PLAN, default_stages};

/// Options accepted by `stagegate init`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartOptions {
    /// Input document as given; a leading `@` is ignored.
    pub input_document: String,
    pub workflow: String,
    /// 0 means unlimited.
    pub max_stages: u32,
}

/// Validation failures reported before any file is touched.
#[derive(Debug, Error)]
pub enum StartError {
    #[error("no input document given")]
    MissingInput,

    #[error("cannot read input document {}", .path.display())]
    UnreadableInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("input document {} is not a file", .path.display())]
    NotAFile { path: PathBuf },

    #[error(
        "a run is already active at stage '{stage}'; run `stagegate cancel` to discard it first"
    )]
    ActiveRun { stage: String },
}

/// Outcome of `stagegate init`.
#[derive(Debug, Clone, PartialEq)]
pub struct StartOutcome {
    pub state: RunState,
    /// Rendered instruction for the first stage.
    pub first_instruction: String,
}

/// Start a run in `root` on the default plan.
///
/// Fails with [`StartError`] if the input document is unusable or a
/// non-terminal run already exists. A corrupted state document does not block
/// a new run; reinitializing is how it gets fixed.
pub fn start_run(root: &Path, options: &StartOptions) -> Result<StartOutcome> {
    debug!(root = %root.display(), "starting run");
    let paths = GatePaths::new(root);

    let input_document = options.input_document.trim();
    let input_document = input_document.strip_prefix('@').unwrap_or(input_document);
    if input_document.is_empty() {
        return Err(StartError::MissingInput.into());
    }
    let input_path = resolve_input(root, input_document)?;

    ensure_no_active_run(&paths)?;

    let templates: Vec<(String, &str)> = DEFAULT_PLAN
        .iter()
        .map(|stage| (GatePaths::instruction_ref(stage.name), stage.template))
        .collect();
    write_templates(
        &paths,
        templates
            .iter()
            .map(|(reference, body)| (reference.as_str(), *body)),
    )?;
    ensure_config(&paths)?;

    let stages = default_stages();
    let input_document_path = input_path.to_string_lossy().into_owned();
    let state = RunState {
        active_stage: stages[0].name.clone(),
        max_stages: options.max_stages,
        workflow: options.workflow.clone(),
        input_document: input_document.to_string(),
        input_document_path,
        started_at: Some(Utc::now().trunc_subsecs(0)),
        completed_at: None,
        iterations: Default::default(),
        stages,
    };
    write_run_state(&paths.run_state_path, &state)?;

    let first_instruction = render_instruction(DEFAULT_PLAN[0].template, &state.input_document_path);
    info!(
        input = %state.input_document_path,
        workflow = %state.workflow,
        max_stages = state.max_stages,
        "run started"
    );
    Ok(StartOutcome {
        state,
        first_instruction,
    })
}

fn resolve_input(root: &Path, input_document: &str) -> Result<PathBuf> {
    let path = root.join(input_document);
    let meta = fs::metadata(&path).map_err(|source| StartError::UnreadableInput {
        path: path.clone(),
        source,
    })?;
    if !meta.is_file() {
        return Err(StartError::NotAFile { path }.into());
    }
    fs::File::open(&path).map_err(|source| StartError::UnreadableInput {
        path: path.clone(),
        source,
    })?;
    fs::canonicalize(&path).with_context(|| format!("canonicalize {}", path.display()))
}

fn ensure_no_active_run(paths: &GatePaths) -> Result<()> {
    match load_run_state_if_present(&paths.run_state_path) {
        Ok(Some(state)) if state.is_active() => Err(StartError::ActiveRun {
            stage: state.active_stage,
        }
        .into()),
        Ok(_) => Ok(()),
        Err(err) if err.is_corruption() => {
            warn!(err = %err.detail(), "replacing corrupted run state");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}
