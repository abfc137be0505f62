//! Build configuration, read from a TOML file.
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
    /// Scratch tree; wiped at the start of every run.
    pub stage_dir: PathBuf,
    /// Version-controlled tree the name server loads from.
    pub prod_dir: PathBuf,
    pub lock_file: PathBuf,
    pub stop_file: PathBuf,
    #[serde(default = "default_stop_file_notify_interval")]
    pub stop_file_notify_interval_secs: u64,
    /// Directory the name server sees `prod_dir` as, used in `file` clauses.
    pub bind_prefix: PathBuf,
    #[serde(default = "default_checkzone")]
    pub named_checkzone: String,
    #[serde(default)]
    pub named_checkzone_opts: Vec<String>,
    #[serde(default = "default_checkconf")]
    pub named_checkconf: String,
    #[serde(default)]
    pub named_checkconf_opts: Vec<String>,
    #[serde(default = "default_max_lines_changed")]
    pub max_allowed_lines_changed: usize,
    #[serde(default = "default_zone_role")]
    pub zone_role: String,
    #[serde(default = "default_commit_message")]
    pub commit_message: String,
    pub db_path: PathBuf,
    #[serde(default)]
    pub alert_webhook: Option<String>,
}

fn default_stop_file_notify_interval() -> u64 {
    30 * 60
}

fn default_checkzone() -> String {
    "named-checkzone".into()
}

fn default_checkconf() -> String {
    "named-checkconf".into()
}

fn default_max_lines_changed() -> usize {
    500
}

fn default_zone_role() -> String {
    "master".into()
}

fn default_commit_message() -> String {
    "Update config file".into()
}

impl BuildConfig {
    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        toml::from_str(raw).context("invalid build configuration")
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml_str(&raw).with_context(|| format!("in {}", path.display()))
    }

    pub fn stop_file_notify_interval(&self) -> Duration {
        Duration::from_secs(self.stop_file_notify_interval_secs)
    }

    /// Key/value pairs shown by the `status` command.
    pub fn summary(&self) -> Vec<(&'static str, String)> {
        vec![
            ("stage_dir", self.stage_dir.display().to_string()),
            ("prod_dir", self.prod_dir.display().to_string()),
            ("lock_file", self.lock_file.display().to_string()),
            ("stop_file", self.stop_file.display().to_string()),
            (
                "stop_file_notify_interval_secs",
                self.stop_file_notify_interval_secs.to_string(),
            ),
            ("bind_prefix", self.bind_prefix.display().to_string()),
            ("named_checkzone", self.named_checkzone.clone()),
            ("named_checkconf", self.named_checkconf.clone()),
            (
                "max_allowed_lines_changed",
                self.max_allowed_lines_changed.to_string(),
            ),
            ("zone_role", self.zone_role.clone()),
            ("db_path", self.db_path.display().to_string()),
        ]
    }
}
