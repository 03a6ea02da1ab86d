//! Canonical `.stagegate/` paths and scaffolding helpers.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use super::config::{GateConfig, write_config};

/// All canonical paths within `.stagegate/` for a workspace root.
#[derive(Debug, Clone)]
pub struct GatePaths {
    pub root: PathBuf,
    pub gate_dir: PathBuf,
    pub state_dir: PathBuf,
    pub prompts_dir: PathBuf,
    pub config_path: PathBuf,
    pub run_state_path: PathBuf,
}

impl GatePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let gate_dir = root.join(".stagegate");
        let state_dir = gate_dir.join("state");
        Self {
            root: root.clone(),
            gate_dir: gate_dir.clone(),
            state_dir: state_dir.clone(),
            prompts_dir: gate_dir.join("prompts"),
            config_path: gate_dir.join("config.toml"),
            run_state_path: state_dir.join("run_state.json"),
        }
    }

    /// Workspace-relative reference for a stage's instruction template.
    pub fn instruction_ref(stage: &str) -> String {
        format!(".stagegate/prompts/{stage}.md")
    }

    /// Resolve a workspace-relative path (absolute paths pass through).
    pub fn resolve(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }
}

/// Write instruction templates, replacing any earlier copies.
pub fn write_templates<'a>(
    paths: &GatePaths,
    templates: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> Result<()> {
    create_dir(&paths.prompts_dir)?;
    for (instruction_ref, body) in templates {
        let path = paths.resolve(instruction_ref);
        write_file(&path, body)?;
        debug!(path = %path.display(), "instruction template written");
    }
    Ok(())
}

/// Write the default config unless the user already has one.
pub fn ensure_config(paths: &GatePaths) -> Result<()> {
    if paths.config_path.exists() {
        return Ok(());
    }
    write_config(&paths.config_path, &GateConfig::default())
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("create directory {}", path.display()))
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir(parent)?;
    }
    fs::write(path, contents).with_context(|| format!("write file {}", path.display()))
}
