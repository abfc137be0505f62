//! Version control of the production tree.
pub mod git;
pub mod publisher;

use async_trait::async_trait;

use crate::error::Result;

pub use git::GitRepo;
pub use publisher::Publisher;

/// Operations the publisher needs on the production working copy.
#[async_trait]
pub trait VcsBackend: Send + Sync {
    /// Fetch, then discard local changes and local commits so the working
    /// copy matches the remote.
    async fn reset_and_pull(&self) -> Result<()>;

    /// Commit everything and push. With `sanity_check`, refuse when more
    /// lines changed than the backend's ceiling.
    async fn commit_and_push(&self, message: &str, sanity_check: bool) -> Result<()>;

    /// Roll the working copy back to what the remote has, dropping files
    /// and commits the publish left behind.
    async fn clean(&self) -> Result<()>;
}
