//! Writes generated artifacts into the staging tree.
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::build::file_meta::FileMeta;
use crate::error::{BuildError, Result};

/// Owns the staging directory for one run. Never writes outside it.
#[derive(Debug, Clone)]
pub struct StageWriter {
    stage_dir: PathBuf,
}

impl StageWriter {
    pub fn new(stage_dir: impl Into<PathBuf>) -> Self {
        Self {
            stage_dir: stage_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.stage_dir
    }

    /// Empty the staging tree, creating it if needed.
    pub fn wipe(&self) -> Result<()> {
        std::fs::create_dir_all(&self.stage_dir).map_err(|e| BuildError::io(&self.stage_dir, e))?;
        let entries =
            std::fs::read_dir(&self.stage_dir).map_err(|e| BuildError::io(&self.stage_dir, e))?;
        for entry in entries {
            let path = entry.map_err(|e| BuildError::io(&self.stage_dir, e))?.path();
            let res = if path.is_dir() && !path.is_symlink() {
                std::fs::remove_dir_all(&path)
            } else {
                std::fs::remove_file(&path)
            };
            res.map_err(|e| BuildError::io(&path, e))?;
        }
        debug!(stage_dir = %self.stage_dir.display(), "staging wiped");
        Ok(())
    }

    /// Write one view's zone file; returns the absolute path written.
    pub async fn write_zone(&self, meta: &FileMeta, body: &str) -> Result<PathBuf> {
        self.write(meta.relative(), body).await
    }

    /// Write a config fragment under `config/`.
    pub async fn write_config(&self, file_name: &str, text: &str) -> Result<PathBuf> {
        self.write(&Path::new("config").join(file_name), text).await
    }

    async fn write(&self, relative: &Path, contents: &str) -> Result<PathBuf> {
        let path = self.stage_dir.join(relative);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BuildError::io(parent, e))?;
        }
        tokio::fs::write(&path, contents)
            .await
            .map_err(|e| BuildError::io(&path, e))?;
        debug!(path = %path.display(), bytes = contents.len(), "staged file");
        Ok(path)
    }
}
