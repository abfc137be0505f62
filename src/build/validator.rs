//! named-checkzone / named-checkconf wrappers.
use std::path::Path;

use tracing::debug;

use crate::build::process::{Invocation, format_diagnostics};
use crate::config::BuildConfig;
use crate::error::{BuildError, Result};

#[derive(Debug, Clone)]
pub struct Validator {
    checkzone: String,
    checkzone_opts: Vec<String>,
    checkconf: String,
    checkconf_opts: Vec<String>,
}

impl Validator {
    pub fn new(checkzone: impl Into<String>, checkconf: impl Into<String>) -> Self {
        Self {
            checkzone: checkzone.into(),
            checkzone_opts: Vec::new(),
            checkconf: checkconf.into(),
            checkconf_opts: Vec::new(),
        }
    }

    pub fn from_config(cfg: &BuildConfig) -> Self {
        Self {
            checkzone: cfg.named_checkzone.clone(),
            checkzone_opts: cfg.named_checkzone_opts.clone(),
            checkconf: cfg.named_checkconf.clone(),
            checkconf_opts: cfg.named_checkconf_opts.clone(),
        }
    }

    pub fn with_checkzone_opts(mut self, opts: Vec<String>) -> Self {
        self.checkzone_opts = opts;
        self
    }

    pub fn with_checkconf_opts(mut self, opts: Vec<String>) -> Self {
        self.checkconf_opts = opts;
        self
    }

    /// `named-checkzone [opts] <zone> <file>`
    pub async fn check_zone(&self, path: &Path, zone: &str, view: &str) -> Result<()> {
        debug!(%zone, %view, path = %path.display(), "checking zone file");
        Invocation::new(&self.checkzone)
            .args(&self.checkzone_opts)
            .arg(zone)
            .arg(path)
            .run()
            .await
            .map(|_| ())
            .map_err(|e| match e {
                BuildError::Command { stdout, stderr, .. } => BuildError::ZoneValidation {
                    zone: zone.to_string(),
                    view: view.to_string(),
                    detail: format_diagnostics(&stdout, &stderr),
                },
                other => other,
            })
    }

    /// `named-checkconf [opts] <file>`
    pub async fn check_config(&self, path: &Path) -> Result<()> {
        debug!(path = %path.display(), "checking config fragment");
        Invocation::new(&self.checkconf)
            .args(&self.checkconf_opts)
            .arg(path)
            .run()
            .await
            .map(|_| ())
            .map_err(|e| match e {
                BuildError::Command { stdout, stderr, .. } => BuildError::ConfigValidation {
                    path: path.to_path_buf(),
                    detail: format_diagnostics(&stdout, &stderr),
                },
                other => other,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".into(), script.into(), "checker".into()]
    }

    #[tokio::test]
    async fn passes_zone_then_file() {
        let tmp = tempfile::tempdir().unwrap();
        let log = tmp.path().join("calls");
        let validator = Validator::new("sh", "sh")
            .with_checkzone_opts(sh(&format!("echo \"$@\" >> {}", log.display())));

        validator
            .check_zone(Path::new("/stage/com/example/example.com.public"), "example.com", "public")
            .await
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(&log).unwrap(),
            "example.com /stage/com/example/example.com.public\n"
        );
    }

    #[tokio::test]
    async fn rejected_zone_carries_checker_output() {
        let validator = Validator::new("sh", "sh")
            .with_checkzone_opts(sh("echo 'zone example.com/IN: not loaded due to errors.'; exit 1"));
        let err = validator
            .check_zone(Path::new("/x"), "example.com", "public")
            .await
            .unwrap_err();
        match err {
            BuildError::ZoneValidation { zone, detail, .. } => {
                assert_eq!(zone, "example.com");
                assert!(detail.contains("not loaded due to errors"));
            }
            other => panic!("expected ZoneValidation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejected_config() {
        let validator = Validator::new("sh", "sh").with_checkconf_opts(sh("exit 1"));
        let err = validator.check_config(Path::new("/x")).await.unwrap_err();
        assert!(matches!(err, BuildError::ConfigValidation { .. }));
    }
}
