//! Cross-process build mutex backed by an exclusively-created lock file.
//!
//! The file holds the owner's pid and start time. A lock left behind by a
//! crashed process is not reclaimed automatically; the contention alert
//! tells an operator to look at it.
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, warn};

use crate::error::{BuildError, Result};

#[derive(Debug, Clone)]
pub struct BuildLock {
    path: PathBuf,
}

/// Proof of holding the lock. Call [`LockGuard::release`]; dropping an
/// unreleased guard also removes the file.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    released: bool,
}

impl BuildLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn acquire(&self) -> Result<LockGuard> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
        }

        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(BuildError::LockHeld {
                    path: self.path.clone(),
                    holder: self.holder().unwrap_or_else(|| "unknown holder".into()),
                });
            }
            Err(e) => return Err(BuildError::io(&self.path, e)),
        };

        let stamp = format!("pid {} since {}\n", std::process::id(), Utc::now().to_rfc3339());
        if let Err(e) = file.write_all(stamp.as_bytes()) {
            let _ = std::fs::remove_file(&self.path);
            return Err(BuildError::io(&self.path, e));
        }

        debug!(path = %self.path.display(), "build lock acquired");
        Ok(LockGuard {
            path: self.path.clone(),
            released: false,
        })
    }

    /// Contents of the lock file if someone holds it.
    pub fn holder(&self) -> Option<String> {
        std::fs::read_to_string(&self.path)
            .ok()
            .map(|s| s.trim().to_string())
    }

    pub fn is_locked(&self) -> bool {
        self.path.exists()
    }
}

impl LockGuard {
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        std::fs::remove_file(&self.path).map_err(|e| BuildError::io(&self.path, e))?;
        debug!(path = %self.path.display(), "build lock released");
        Ok(())
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        warn!(path = %self.path.display(), "build lock dropped without release");
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), "failed to remove lock file: {e}");
        }
    }
}
