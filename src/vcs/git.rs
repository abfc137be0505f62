use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{info, warn};

use crate::build::process::Invocation;
use crate::error::{BuildError, Result};
use crate::vcs::VcsBackend;

/// The remote-tracking branch of the checked-out branch. Production is
/// never ahead of it except between a commit and its push.
const UPSTREAM: &str = "@{u}";

/// The production tree as a git working copy, driven through the `git` CLI.
#[derive(Debug, Clone)]
pub struct GitRepo {
    dir: PathBuf,
    max_allowed_lines_changed: usize,
}

impl GitRepo {
    pub fn new(dir: impl Into<PathBuf>, max_allowed_lines_changed: usize) -> Self {
        Self {
            dir: dir.into(),
            max_allowed_lines_changed,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn git(&self) -> Invocation {
        Invocation::new("git").current_dir(&self.dir)
    }

    async fn has_staged_changes(&self) -> Result<bool> {
        let out = self
            .git()
            .args(["diff", "--cached", "--quiet"])
            .ignore_failure()
            .run()
            .await?;
        match out.status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(BuildError::Command {
                command: "git diff --cached --quiet".into(),
                status: out.status.to_string(),
                stdout: out.stdout,
                stderr: out.stderr,
            }),
        }
    }

    async fn staged_lines_changed(&self) -> Result<usize> {
        let out = self
            .git()
            .args(["diff", "--cached", "--numstat"])
            .run()
            .await?;
        Ok(count_changed_lines(&out.stdout))
    }
}

#[async_trait]
impl VcsBackend for GitRepo {
    async fn reset_and_pull(&self) -> Result<()> {
        self.git().arg("fetch").run().await?;
        self.clean().await
    }

    async fn commit_and_push(&self, message: &str, sanity_check: bool) -> Result<()> {
        self.git().args(["add", "--all", "."]).run().await?;

        if !self.has_staged_changes().await? {
            info!(repo = %self.dir.display(), "no changes to commit");
            return Ok(());
        }

        if sanity_check {
            let changed = self.staged_lines_changed().await?;
            if changed > self.max_allowed_lines_changed {
                warn!(
                    repo = %self.dir.display(),
                    changed,
                    max = self.max_allowed_lines_changed,
                    "change set too large, not pushing"
                );
                return Err(BuildError::LineCeilingExceeded {
                    changed,
                    max: self.max_allowed_lines_changed,
                });
            }
        }

        self.git().args(["commit", "-m", message]).run().await?;
        self.git().arg("push").run().await?;
        info!(repo = %self.dir.display(), "changes pushed");
        Ok(())
    }

    /// Drops local changes and any commit that never reached the remote.
    async fn clean(&self) -> Result<()> {
        self.git().args(["reset", "--hard", UPSTREAM]).run().await?;
        self.git().args(["clean", "-fd"]).run().await?;
        Ok(())
    }
}

/// Sum of added and removed lines in `git diff --numstat` output. Binary
/// files (`-\t-\tpath`) count as zero.
pub fn count_changed_lines(numstat: &str) -> usize {
    numstat
        .lines()
        .filter_map(|line| {
            let mut cols = line.split('\t');
            let added = cols.next()?.parse::<usize>().unwrap_or(0);
            let removed = cols.next()?.parse::<usize>().unwrap_or(0);
            Some(added + removed)
        })
        .sum()
}
