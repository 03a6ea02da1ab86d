//! Semantic invariants not expressible via JSON Schema.

use std::collections::HashSet;

use super::types::{RESERVED_STAGE_NAMES, RunState};

/// Check semantic invariants of a loaded run state:
/// - Stage names are non-empty, unique, and not a reserved sentinel
/// - Every stage has an instruction reference
/// - Iteration counters only exist for stages in the plan
///
/// An `active_stage` naming no stage is allowed; the step function treats it
/// as stale state rather than corruption.
pub fn validate_invariants(state: &RunState) -> Vec<String> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for (index, stage) in state.stages.iter().enumerate() {
        if stage.name.trim().is_empty() {
            errors.push(format!("stages[{index}]: name must not be empty"));
            continue;
        }
        if RESERVED_STAGE_NAMES.contains(&stage.name.as_str()) {
            errors.push(format!(
                "stages[{index}]: name '{}' is reserved",
                stage.name
            ));
        }
        if !seen.insert(stage.name.as_str()) {
            errors.push(format!("duplicate stage name '{}'", stage.name));
        }
        if stage.instruction_ref.trim().is_empty() {
            errors.push(format!("{}: instruction_ref must not be empty", stage.name));
        }
    }

    for name in state.iterations.keys() {
        if !seen.contains(name.as_str()) {
            errors.push(format!("iterations: unknown stage '{name}'"));
        }
    }

    errors
}
