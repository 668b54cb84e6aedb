//! Runner configuration, read from `stepwalk.toml` by default.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::builder::BuildOptions;
use crate::walker::{DEFAULT_ERROR_LIMIT_BYTES, WalkOptions};

/// Runner configuration (TOML).
///
/// Intended to be edited by humans. Missing fields take their defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RunnerConfig {
    /// Reject depth jumps greater than one while assembling a scenario.
    pub strict_depth: bool,

    /// Resolve and report every step without invoking actions or hooks.
    pub dry_run: bool,

    pub report: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReportConfig {
    /// Truncate error text in node reports beyond this many bytes.
    pub error_limit_bytes: usize,

    /// Stream node and scenario events to this file as JSON lines.
    pub jsonl: Option<PathBuf>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            error_limit_bytes: DEFAULT_ERROR_LIMIT_BYTES,
            jsonl: None,
        }
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            strict_depth: false,
            dry_run: false,
            report: ReportConfig::default(),
        }
    }
}

impl RunnerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.report.error_limit_bytes == 0 {
            return Err(anyhow!("report.error_limit_bytes must be > 0"));
        }
        if let Some(path) = &self.report.jsonl
            && path.as_os_str().is_empty()
        {
            return Err(anyhow!("report.jsonl must not be empty"));
        }
        Ok(())
    }

    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            strict_depth: self.strict_depth,
        }
    }

    pub fn walk_options(&self) -> WalkOptions {
        WalkOptions {
            dry_run: self.dry_run,
            error_limit_bytes: self.report.error_limit_bytes,
        }
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `RunnerConfig::default()`.
pub fn load_config(path: &Path) -> Result<RunnerConfig> {
    if !path.exists() {
        let cfg = RunnerConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: RunnerConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &RunnerConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

/// Write `contents` to a sibling temp file, then rename it over `path`.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("path missing parent {}", path.display()))?;
    if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}
