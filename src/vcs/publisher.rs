//! Copies a validated staging tree into production and commits it.
use std::path::Path;

use tracing::{error, info};

use crate::error::{BuildError, Result};
use crate::vcs::VcsBackend;

pub struct Publisher<'a> {
    backend: &'a dyn VcsBackend,
    commit_message: String,
}

impl<'a> Publisher<'a> {
    pub fn new(backend: &'a dyn VcsBackend, commit_message: impl Into<String>) -> Self {
        Self {
            backend,
            commit_message: commit_message.into(),
        }
    }

    /// Reset and pull production, lay the staging tree over it, then commit
    /// and push. Anything failing after the copy rolls production back.
    pub async fn publish(&self, stage_dir: &Path, prod_dir: &Path, sanity_check: bool) -> Result<()> {
        info!(stage = %stage_dir.display(), prod = %prod_dir.display(), "publishing");
        self.backend
            .reset_and_pull()
            .await
            .map_err(|e| into_publish_error("reset and pull", e))?;

        if let Err(e) = copy_tree(stage_dir, prod_dir) {
            self.rollback().await;
            return Err(into_publish_error("copy staging tree", e));
        }

        if let Err(e) = self
            .backend
            .commit_and_push(&self.commit_message, sanity_check)
            .await
        {
            self.rollback().await;
            return Err(into_publish_error("commit and push", e));
        }

        info!("publish complete");
        Ok(())
    }

    async fn rollback(&self) {
        if let Err(e) = self.backend.clean().await {
            error!("rollback of production working copy failed: {e}");
        }
    }
}

fn into_publish_error(step: &str, err: BuildError) -> BuildError {
    match err {
        e @ (BuildError::LineCeilingExceeded { .. } | BuildError::Publish { .. }) => e,
        other => BuildError::publish(format!("{step}: {other}")),
    }
}

/// Recursively copy `src` into `dst`, overwriting files that exist in both.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    std::fs::create_dir_all(dst).map_err(|e| BuildError::io(dst, e))?;
    for entry in std::fs::read_dir(src).map_err(|e| BuildError::io(src, e))? {
        let entry = entry.map_err(|e| BuildError::io(src, e))?;
        let from = entry.path();
        let to = dst.join(entry.file_name());
        let file_type = entry.file_type().map_err(|e| BuildError::io(&from, e))?;
        if file_type.is_dir() {
            copy_tree(&from, &to)?;
        } else {
            std::fs::copy(&from, &to).map_err(|e| BuildError::io(&from, e))?;
        }
    }
    Ok(())
}
