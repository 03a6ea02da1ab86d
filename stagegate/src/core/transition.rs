//! Deterministic stage transitions.
//!
//! The step function splits each invocation into two halves around the gate
//! evaluation: [`entry`] + [`record_attempt`] before it (the attempt is
//! persisted before probing the workspace), and [`resolve`] after it.

use chrono::{DateTime, Utc};

use super::types::{RunState, STAGE_COMPLETE, STAGE_STOPPED_AT_MAX};

/// What the persisted state asks of this invocation, before any mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry {
    /// `active_stage` is empty.
    Idle,
    /// The active stage index reached `max_stages`.
    CapReached { max_stages: u32 },
    /// `active_stage` is a sentinel or names no stage in the plan.
    Untracked,
    /// The stage at `index` must be gated.
    Gated { index: usize },
}

/// Outcome of a gate evaluation, already applied to the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Gate not met; the same stage runs again.
    Stay { index: usize, attempts: u32 },
    /// Gate met; `to` is now active.
    Advance { from: usize, to: usize, attempts: u32 },
    /// Gate met on the last stage; the run is complete.
    Finish { index: usize, attempts: u32 },
}

/// Classify the state. Checks run in order: idle, stage cap, lookup.
pub fn entry(state: &RunState) -> Entry {
    if state.active_stage.is_empty() {
        return Entry::Idle;
    }
    let index = state.active_index();
    if state.max_stages > 0
        && let Some(index) = index
        && index >= state.max_stages as usize
    {
        return Entry::CapReached {
            max_stages: state.max_stages,
        };
    }
    match index {
        Some(index) => Entry::Gated { index },
        None => Entry::Untracked,
    }
}

/// Move the run to the `stopped_at_max` sentinel.
pub fn stop_at_max(state: &mut RunState) {
    state.active_stage = STAGE_STOPPED_AT_MAX.to_string();
}

/// Count one more gate evaluation for the stage at `index`. Returns the new count.
pub fn record_attempt(state: &mut RunState, index: usize) -> u32 {
    let name = state.stages[index].name.clone();
    let counter = state.iterations.entry(name).or_insert(0);
    *counter = counter.saturating_add(1);
    *counter
}

/// Apply the gate result for the stage at `index`.
///
/// The next stage's counter is not seeded; it first appears when that stage
/// is evaluated.
pub fn resolve(
    state: &mut RunState,
    index: usize,
    attempts: u32,
    met: bool,
    now: DateTime<Utc>,
) -> Transition {
    if !met {
        return Transition::Stay { index, attempts };
    }
    let next = index + 1;
    match state.stages.get(next) {
        Some(stage) => {
            state.active_stage = stage.name.clone();
            Transition::Advance {
                from: index,
                to: next,
                attempts,
            }
        }
        None => {
            state.active_stage = STAGE_COMPLETE.to_string();
            state.completed_at = Some(now);
            Transition::Finish { index, attempts }
        }
    }
}
