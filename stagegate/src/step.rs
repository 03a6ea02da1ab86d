//! Orchestration for a single `stagegate step`.
//!
//! Every invocation is a fresh process: the run state document is the only
//! memory. The attempt counter is persisted before the gate is probed, so a
//! crash mid-step still counts the evaluation.

use std::path::Path;

use anyhow::Result;
use chrono::{SubsecRound, Utc};
use tracing::{debug, info, warn};

use crate::core::transition::{Entry, Transition, entry, record_attempt, resolve, stop_at_max};
use crate::core::types::{Directive, RunState};
use crate::io::config::{GateConfig, Milestone, load_config};
use crate::io::hook::StepTrigger;
use crate::io::init::GatePaths;
use crate::io::probe::evaluate;
use crate::io::progress::progress_summary;
use crate::io::prompt::load_instruction;
use crate::io::run_state::{load_run_state_if_present, write_run_state};

/// What happened during a step, for banners and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepEvent {
    /// No run state exists.
    NoRun,
    /// The state exists but no stage is active.
    Idle,
    /// The stage cap was hit; the run is now `stopped_at_max`.
    StoppedAtMax { max_stages: u32 },
    /// `active_stage` is a sentinel or unknown.
    Untracked { active_stage: String },
    /// The gate was not met.
    Looped { stage: String, iteration: u32 },
    /// The gate was met and the next stage is active.
    Advanced {
        from: String,
        to: String,
        iterations: u32,
    },
    /// The last gate was met.
    Completed { stages: usize },
    /// The state document could not be trusted.
    Corrupt { error: String },
}

/// Result of a single step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub directive: Directive,
    pub event: StepEvent,
}

impl StepOutcome {
    fn allow(event: StepEvent) -> Self {
        Self {
            directive: Directive::Allow,
            event,
        }
    }
}

/// Run one deterministic step of the stage loop in `root`.
///
/// Read or write failures of the state document propagate as errors; a
/// document that exists but cannot be trusted yields [`Directive::Halt`].
pub fn run_step(root: &Path, trigger: &StepTrigger) -> Result<StepOutcome> {
    let paths = GatePaths::new(root);

    let mut state = match load_run_state_if_present(&paths.run_state_path) {
        Ok(Some(state)) => state,
        Ok(None) => {
            debug!("no run state; nothing to orchestrate");
            return Ok(StepOutcome::allow(StepEvent::NoRun));
        }
        Err(err) if err.is_corruption() => {
            let error = err.detail();
            warn!(%error, "run state is corrupted");
            return Ok(StepOutcome {
                directive: Directive::Halt {
                    reason: format!("corrupted state: {error}"),
                },
                event: StepEvent::Corrupt { error },
            });
        }
        Err(err) => return Err(err.into()),
    };

    match entry(&state) {
        Entry::Idle => Ok(StepOutcome::allow(StepEvent::Idle)),
        Entry::CapReached { max_stages } => {
            stop_at_max(&mut state);
            write_run_state(&paths.run_state_path, &state)?;
            info!(max_stages, "stage cap reached");
            Ok(StepOutcome::allow(StepEvent::StoppedAtMax { max_stages }))
        }
        Entry::Untracked => {
            debug!(active_stage = %state.active_stage, "active stage is not gated");
            Ok(StepOutcome::allow(StepEvent::Untracked {
                active_stage: state.active_stage,
            }))
        }
        Entry::Gated { index } => gate_stage(&paths, trigger, state, index),
    }
}

fn gate_stage(
    paths: &GatePaths,
    trigger: &StepTrigger,
    mut state: RunState,
    index: usize,
) -> Result<StepOutcome> {
    let attempts = record_attempt(&mut state, index);
    write_run_state(&paths.run_state_path, &state)?;

    let met = evaluate(
        &state.stages[index].exit_when,
        &paths.root,
        trigger.log_path.as_deref(),
    );
    debug!(stage = %state.stages[index].name, attempts, met, "gate evaluated");

    let now = Utc::now().trunc_subsecs(0);
    let transition = resolve(&mut state, index, attempts, met, now);
    write_run_state(&paths.run_state_path, &state)?;

    let milestones = milestones(paths);
    let outcome = match transition {
        Transition::Stay { index, attempts } => {
            let stage = &state.stages[index];
            let instruction = load_instruction(paths, stage, &state.input_document_path);
            let context = format!(
                "🔄 Stage: {} (iteration {attempts})\n\
                 Stage not complete yet. Continue working.\n\
                 Progress: {}\n\
                 Focus on the exit condition: {}",
                stage.name,
                progress_summary(&paths.root, &milestones),
                stage.exit_when.gate(),
            );
            StepOutcome {
                directive: Directive::block(instruction, context),
                event: StepEvent::Looped {
                    stage: stage.name.clone(),
                    iteration: attempts,
                },
            }
        }
        Transition::Advance { from, to, attempts } => {
            let (from, to) = (&state.stages[from], &state.stages[to]);
            info!(from = %from.name, to = %to.name, attempts, "stage advanced");
            let instruction = load_instruction(paths, to, &state.input_document_path);
            let context = format!(
                "🔄 Stage: {}\n\
                 Previous stage '{}' completed after {attempts} iteration(s).\n\
                 Working with: {}",
                to.name,
                from.name,
                progress_summary(&paths.root, &milestones),
            );
            StepOutcome {
                directive: Directive::block(instruction, context),
                event: StepEvent::Advanced {
                    from: from.name.clone(),
                    to: to.name.clone(),
                    iterations: attempts,
                },
            }
        }
        Transition::Finish { index, attempts } => {
            let stages = state.stages.len();
            info!(stage = %state.stages[index].name, attempts, stages, "run complete");
            StepOutcome {
                directive: Directive::block(completion_message(stages), ""),
                event: StepEvent::Completed { stages },
            }
        }
    };
    Ok(outcome)
}

/// Fixed message carried by the final block.
pub fn completion_message(stages: usize) -> String {
    format!("Pipeline complete! All {stages} stages finished successfully.")
}

// Progress is advisory: a broken config degrades to the defaults.
fn milestones(paths: &GatePaths) -> Vec<Milestone> {
    match load_config(&paths.config_path) {
        Ok(config) => config.milestones,
        Err(err) => {
            warn!(err = %format!("{err:#}"), "config unusable; using default milestones");
            GateConfig::default().milestones
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{STAGE_COMPLETE, STAGE_STOPPED_AT_MAX};
    use crate::io::progress::NO_OUTPUTS;
    use crate::test_support::TestWorkspace;
    use std::fs;

    #[test]
    fn missing_state_allows() {
        let ws = TestWorkspace::new().expect("workspace");
        let outcome = ws.step().expect("step");
        assert_eq!(outcome.directive, Directive::Allow);
        assert_eq!(outcome.event, StepEvent::NoRun);
        assert!(!ws.paths().run_state_path.exists());
    }

    #[test]
    fn unmet_gate_blocks_with_loop_context() {
        let ws = TestWorkspace::new().expect("workspace");
        ws.start(0).expect("start");

        let outcome = ws.step().expect("step");
        let Directive::Block { message, context } = outcome.directive else {
            panic!("expected block, got {:?}", outcome.directive);
        };
        assert!(!message.contains("INPUT_DOCUMENT_PATH"));
        assert!(context.contains("iteration 1"));
        assert!(context.contains("Continue working"));
        assert!(context.contains(NO_OUTPUTS));
        assert!(context.contains("architecture.md"));
        assert_eq!(
            outcome.event,
            StepEvent::Looped {
                stage: "architect".to_string(),
                iteration: 1
            }
        );
    }

    #[test]
    fn corrupted_state_halts_without_repair() {
        let ws = TestWorkspace::new().expect("workspace");
        let path = ws.paths().run_state_path;
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(&path, "{ not json").expect("write");

        let outcome = ws.step().expect("step");
        match outcome.directive {
            Directive::Halt { reason } => assert!(reason.starts_with("corrupted state")),
            other => panic!("expected halt, got {other:?}"),
        }
        assert_eq!(fs::read_to_string(&path).expect("read"), "{ not json");
    }

    #[test]
    fn empty_active_stage_is_idle() {
        let ws = TestWorkspace::new().expect("workspace");
        let mut state = ws.start(0).expect("start").state;
        state.active_stage.clear();
        ws.write_state(&state).expect("write");

        let outcome = ws.step().expect("step");
        assert_eq!(outcome.event, StepEvent::Idle);
        assert_eq!(ws.read_state().expect("read"), state);
    }

    #[test]
    fn unknown_stage_allows_without_mutation() {
        let ws = TestWorkspace::new().expect("workspace");
        let mut state = ws.start(0).expect("start").state;
        state.active_stage = "retired".to_string();
        ws.write_state(&state).expect("write");

        let outcome = ws.step().expect("step");
        assert!(outcome.directive.is_allow());
        assert_eq!(ws.read_state().expect("read"), state);
    }

    #[test]
    fn stage_cap_stops_the_run() {
        let ws = TestWorkspace::new().expect("workspace");
        let mut state = ws.start(1).expect("start").state;
        state.active_stage = "qa".to_string();
        ws.write_state(&state).expect("write");

        let outcome = ws.step().expect("step");
        assert_eq!(outcome.event, StepEvent::StoppedAtMax { max_stages: 1 });
        let after = ws.read_state().expect("read");
        assert_eq!(after.active_stage, STAGE_STOPPED_AT_MAX);
        assert!(after.iterations.is_empty());
    }

    #[test]
    fn advance_names_previous_stage_and_progress() {
        let ws = TestWorkspace::new().expect("workspace");
        ws.start(0).expect("start");
        ws.step().expect("first");
        ws.satisfy("architect").expect("satisfy");

        let outcome = ws.step().expect("second");
        let Directive::Block { context, .. } = &outcome.directive else {
            panic!("expected block");
        };
        assert!(context.contains("Stage: qa"));
        assert!(context.contains("'architect' completed after 2 iteration(s)"));
        assert!(context.contains("architecture.md ✓"));
        assert_eq!(
            outcome.event,
            StepEvent::Advanced {
                from: "architect".to_string(),
                to: "qa".to_string(),
                iterations: 2
            }
        );
    }

    #[test]
    fn last_gate_finishes_with_completion_message() {
        let ws = TestWorkspace::new().expect("workspace");
        let mut state = ws.start(0).expect("start").state;
        state.active_stage = "verifier".to_string();
        ws.write_state(&state).expect("write");
        ws.satisfy("verifier").expect("satisfy");

        let outcome = ws.step_with_log(&ws.path("session.log")).expect("step");
        assert_eq!(outcome.directive, Directive::block(completion_message(5), ""));
        assert_eq!(outcome.event, StepEvent::Completed { stages: 5 });

        let after = ws.read_state().expect("read");
        assert_eq!(after.active_stage, STAGE_COMPLETE);
        assert!(after.completed_at.is_some());
        assert_eq!(after.iterations.get("verifier"), Some(&1));
    }

    #[test]
    fn broken_config_falls_back_to_default_milestones() {
        let ws = TestWorkspace::new().expect("workspace");
        ws.start(0).expect("start");
        fs::write(ws.paths().config_path, "milestones = 7\n").expect("break config");
        ws.satisfy("architect").expect("satisfy");

        let outcome = ws.step().expect("step");
        let Directive::Block { context, .. } = outcome.directive else {
            panic!("expected block");
        };
        assert!(context.contains("architecture.md ✓"));
    }
}
