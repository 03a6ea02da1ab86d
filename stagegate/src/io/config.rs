//! Stagegate configuration stored under `.stagegate/config.toml`.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Stagegate configuration (TOML).
///
/// Edited by humans; missing fields fall back to the defaults used by the
/// built-in five-stage plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GateConfig {
    /// Artifacts reported in progress summaries and `stagegate status`.
    pub milestones: Vec<Milestone>,
}

/// A workspace artifact worth reporting when present.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Milestone {
    /// Suffix for the `OUTPUT_<key>` status line.
    pub key: String,
    /// Workspace-relative path.
    pub path: String,
    #[serde(default)]
    pub kind: MilestoneKind,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MilestoneKind {
    #[default]
    File,
    Directory,
}

impl Milestone {
    pub fn file(key: &str, path: &str) -> Self {
        Self {
            key: key.to_string(),
            path: path.to_string(),
            kind: MilestoneKind::File,
        }
    }

    pub fn directory(key: &str, path: &str) -> Self {
        Self {
            key: key.to_string(),
            path: path.to_string(),
            kind: MilestoneKind::Directory,
        }
    }

    /// Human label used in progress summaries (`src/` for directories).
    pub fn label(&self) -> String {
        match self.kind {
            MilestoneKind::File => self.path.clone(),
            MilestoneKind::Directory => format!("{}/", self.path.trim_end_matches('/')),
        }
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            milestones: vec![
                Milestone::file("architecture", "architecture.md"),
                Milestone::file("test_plan", "test-plan.md"),
                Milestone::file("security", "security-assessment.md"),
                Milestone::directory("src", "src"),
                Milestone::file("verification", "verification-report.md"),
            ],
        }
    }
}

impl GateConfig {
    pub fn validate(&self) -> Result<()> {
        let mut keys = HashSet::new();
        for milestone in &self.milestones {
            if milestone.key.trim().is_empty() {
                return Err(anyhow!("milestones: key must not be empty"));
            }
            if milestone.path.trim().is_empty() {
                return Err(anyhow!("milestones.{}: path must not be empty", milestone.key));
            }
            if !keys.insert(milestone.key.as_str()) {
                return Err(anyhow!("milestones: duplicate key '{}'", milestone.key));
            }
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `GateConfig::default()`.
pub fn load_config(path: &Path) -> Result<GateConfig> {
    if !path.exists() {
        return Ok(GateConfig::default());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: GateConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &GateConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
