//! The built-in five-stage plan written by `stagegate init`.

use crate::core::gate::ExitCondition;
use crate::core::types::StageDefinition;
use crate::io::init::GatePaths;

/// Workflow label used when `--workflow` is not given.
pub const DEFAULT_WORKFLOW: &str = "prd-to-code";

/// Blueprint for one stage of the default plan.
#[derive(Debug, Clone, Copy)]
pub struct StageBlueprint {
    pub name: &'static str,
    pub template: &'static str,
    pub exit_when: fn() -> ExitCondition,
}

/// Planning, verification design, risk assessment, construction, final verification.
pub const DEFAULT_PLAN: [StageBlueprint; 5] = [
    StageBlueprint {
        name: "architect",
        template: include_str!("prompts/architect.md"),
        exit_when: || ExitCondition::file_exists("architecture.md", Some(50)),
    },
    StageBlueprint {
        name: "qa",
        template: include_str!("prompts/qa.md"),
        exit_when: || ExitCondition::file_exists("test-plan.md", Some(30)),
    },
    StageBlueprint {
        name: "security",
        template: include_str!("prompts/security.md"),
        exit_when: || ExitCondition::file_exists("security-assessment.md", Some(20)),
    },
    StageBlueprint {
        name: "implementer",
        template: include_str!("prompts/implementer.md"),
        exit_when: || ExitCondition::directory_exists("src", Some(3)),
    },
    StageBlueprint {
        name: "verifier",
        template: include_str!("prompts/verifier.md"),
        exit_when: || ExitCondition::log_marker("DONE"),
    },
];

impl StageBlueprint {
    pub fn definition(&self) -> StageDefinition {
        StageDefinition {
            name: self.name.to_string(),
            instruction_ref: GatePaths::instruction_ref(self.name),
            exit_when: (self.exit_when)(),
        }
    }
}

/// Stage definitions for the default plan, in order.
pub fn default_stages() -> Vec<StageDefinition> {
    DEFAULT_PLAN.iter().map(StageBlueprint::definition).collect()
}

/// `architect → qa → …` banner line.
pub fn plan_banner() -> String {
    DEFAULT_PLAN
        .iter()
        .enumerate()
        .map(|(i, stage)| format!("{}. {}", i + 1, stage.name))
        .collect::<Vec<_>>()
        .join(" → ")
}
