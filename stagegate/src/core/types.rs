//! Shared deterministic types for stagegate core logic.
//!
//! These types define the persisted contract between invocations. They must
//! not depend on external state so that a reloaded document behaves exactly
//! like the one that was written.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::gate::ExitCondition;

/// `active_stage` value once the last stage's gate has passed.
pub const STAGE_COMPLETE: &str = "complete";
/// `active_stage` value once the stage cap was hit.
pub const STAGE_STOPPED_AT_MAX: &str = "stopped_at_max";

/// Stage names that may never be used for a real stage.
pub const RESERVED_STAGE_NAMES: [&str; 2] = [STAGE_COMPLETE, STAGE_STOPPED_AT_MAX];

/// One phase of the frozen plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageDefinition {
    /// Unique within a run.
    pub name: String,
    /// Workspace-relative path to the instruction template.
    pub instruction_ref: String,
    /// Gate that must pass before the stage may be left.
    pub exit_when: ExitCondition,
}

/// Persisted record for the current run (`.stagegate/state/run_state.json`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunState {
    /// Currently gated stage, a terminal sentinel, or empty when no run is active.
    pub active_stage: String,
    /// Hard cap on the stage index that may be entered (0 means unlimited).
    pub max_stages: u32,
    /// Free-form workflow label chosen at initialization.
    #[serde(default)]
    pub workflow: String,
    /// Input document argument as given by the user.
    #[serde(default)]
    pub input_document: String,
    /// Absolute path substituted into every instruction.
    pub input_document_path: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Gate evaluations per stage, including the one that passed.
    pub iterations: BTreeMap<String, u32>,
    pub stages: Vec<StageDefinition>,
}

/// Interpretation of `active_stage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase<'a> {
    /// No active run.
    Idle,
    Complete,
    StoppedAtMax,
    /// Any other value, which may or may not name a stage in the plan.
    Stage(&'a str),
}

impl RunState {
    pub fn phase(&self) -> RunPhase<'_> {
        match self.active_stage.as_str() {
            "" => RunPhase::Idle,
            STAGE_COMPLETE => RunPhase::Complete,
            STAGE_STOPPED_AT_MAX => RunPhase::StoppedAtMax,
            name => RunPhase::Stage(name),
        }
    }

    /// True when a run exists and has not reached a terminal sentinel.
    pub fn is_active(&self) -> bool {
        matches!(self.phase(), RunPhase::Stage(_))
    }

    /// Position of `name` in the plan.
    pub fn stage_index(&self, name: &str) -> Option<usize> {
        self.stages.iter().position(|stage| stage.name == name)
    }

    /// Position of the active stage in the plan.
    pub fn active_index(&self) -> Option<usize> {
        self.stage_index(&self.active_stage)
    }

    pub fn iterations_for(&self, name: &str) -> u32 {
        self.iterations.get(name).copied().unwrap_or(0)
    }

    pub fn total_iterations(&self) -> u64 {
        self.iterations.values().map(|n| u64::from(*n)).sum()
    }
}

/// Orchestrator verdict handed back to the host after a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// No objection: the host may end the turn.
    Allow,
    /// The turn must not end; `message` is fed back into the work session.
    Block { message: String, context: String },
    /// Unrecoverable; surfaced to the user with a non-zero exit.
    Halt { reason: String },
}

impl Directive {
    pub fn block(message: impl Into<String>, context: impl Into<String>) -> Self {
        Self::Block {
            message: message.into(),
            context: context.into(),
        }
    }

    pub fn is_allow(&self) -> bool {
        matches!(self, Self::Allow)
    }
}
