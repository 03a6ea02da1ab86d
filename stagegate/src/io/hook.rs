//! Host hook boundary: trigger on stdin, directive on stdout.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::types::Directive;

/// Input the host passes to `stagegate step`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct HookInput {
    #[serde(default, alias = "log_path")]
    pub transcript_path: Option<String>,
}

/// What a step invocation knows about the outside world.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepTrigger {
    /// Execution log to scan for completion markers.
    pub log_path: Option<PathBuf>,
}

impl StepTrigger {
    pub fn with_log(path: impl Into<PathBuf>) -> Self {
        Self {
            log_path: Some(path.into()),
        }
    }

    /// Build a trigger from hook input; relative log paths resolve against `root`.
    pub fn from_hook(input: HookInput, root: &Path) -> Self {
        let log_path = input
            .transcript_path
            .filter(|path| !path.trim().is_empty())
            .map(|path| root.join(path));
        Self { log_path }
    }
}

/// JSON emitted for a blocking directive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HookOutput {
    pub decision: String,
    pub reason: String,
    #[serde(rename = "systemMessage")]
    pub system_message: String,
}

/// Parse hook input leniently: empty or malformed input yields a trigger
/// without a log rather than an error.
pub fn parse_hook_input(raw: &str) -> HookInput {
    if raw.trim().is_empty() {
        return HookInput::default();
    }
    match serde_json::from_str(raw) {
        Ok(input) => input,
        Err(err) => {
            debug!(%err, "ignoring malformed hook input");
            HookInput::default()
        }
    }
}

/// Read the whole trigger from `reader`. Invalid UTF-8 is decoded lossily.
pub fn read_trigger(mut reader: impl Read, root: &Path) -> Result<StepTrigger> {
    let mut raw = Vec::new();
    reader.read_to_end(&mut raw).context("read hook input")?;
    let raw = String::from_utf8_lossy(&raw);
    Ok(StepTrigger::from_hook(parse_hook_input(&raw), root))
}

/// Hook output for `directive`, or `None` when nothing should be printed.
pub fn hook_output(directive: &Directive) -> Option<HookOutput> {
    match directive {
        Directive::Block { message, context } => Some(HookOutput {
            decision: "block".to_string(),
            reason: message.clone(),
            system_message: context.clone(),
        }),
        Directive::Allow | Directive::Halt { .. } => None,
    }
}

/// Write the directive as a single JSON line, if it has an output.
pub fn write_directive(mut writer: impl Write, directive: &Directive) -> Result<()> {
    if let Some(output) = hook_output(directive) {
        let line = serde_json::to_string(&output).context("serialize hook output")?;
        writeln!(writer, "{line}").context("write hook output")?;
    }
    Ok(())
}
