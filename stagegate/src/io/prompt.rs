//! Instruction loading for the active stage.

use std::fs;

use tracing::warn;

use super::init::GatePaths;
use crate::core::template::{MISSING_INSTRUCTION, render_instruction};
use crate::core::types::StageDefinition;

/// Read and render the instruction for `stage`.
///
/// A missing or unreadable template degrades to [`MISSING_INSTRUCTION`]; it
/// never fails the step.
pub fn load_instruction(paths: &GatePaths, stage: &StageDefinition, input_path: &str) -> String {
    let path = paths.resolve(&stage.instruction_ref);
    match fs::read_to_string(&path) {
        Ok(template) => render_instruction(&template, input_path),
        Err(err) => {
            warn!(
                stage = %stage.name,
                path = %path.display(),
                %err,
                "instruction template unavailable"
            );
            MISSING_INSTRUCTION.to_string()
        }
    }
}
