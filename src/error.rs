// src/error.rs
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BuildError>;

/// Every way a build run can end other than success.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("build cancelled: {reason}")]
    Cancelled { reason: String },

    #[error("build lock {} is held by another process ({holder})", .path.display())]
    LockHeld { path: PathBuf, holder: String },

    #[error("named-checkzone rejected zone {zone} (view {view})\n{detail}")]
    ZoneValidation {
        zone: String,
        view: String,
        detail: String,
    },

    #[error("named-checkconf rejected config {}\n{detail}", .path.display())]
    ConfigValidation { path: PathBuf, detail: String },

    #[error("failed to render zone {zone} for view {view}")]
    Render {
        zone: String,
        view: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("publish failed: {reason}")]
    Publish { reason: String },

    #[error("{changed} lines changed, more than the allowed {max}; refusing to push")]
    LineCeilingExceeded { changed: usize, max: usize },

    #[error("`{command}` exited with {status}")]
    Command {
        command: String,
        status: String,
        stdout: String,
        stderr: String,
    },

    #[error("invalid reverse zone {zone}: expected a name ending in 'arpa' or 'ipv6'")]
    InvalidReverseZone { zone: String },

    #[error("invalid zone name {zone}: {reason}")]
    InvalidZoneName { zone: String, reason: String },

    #[error("invalid view name {view}: {reason}")]
    InvalidViewName { view: String, reason: String },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("record store error: {0:#}")]
    Store(#[from] anyhow::Error),
}

impl BuildError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BuildError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn publish(reason: impl Into<String>) -> Self {
        BuildError::Publish {
            reason: reason.into(),
        }
    }

    /// Whether an operator should be alerted about this failure.
    pub fn is_alert_worthy(&self) -> bool {
        !matches!(self, BuildError::Cancelled { .. })
    }
}
