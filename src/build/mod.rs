//! The zone build pipeline.
pub mod assembler;
pub mod file_meta;
pub mod lock;
pub mod orchestrator;
pub mod process;
pub mod serial;
pub mod stop;
pub mod validator;
pub mod writer;

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub use orchestrator::BuildOrchestrator;

/// Caller-selected switches for one run.
#[derive(Debug, Clone, Copy)]
pub struct BuildOptions {
    /// Walk every zone even when no build task is queued.
    pub force: bool,
    /// Stop after staging and validation; publish nothing, keep the tasks.
    pub stage_only: bool,
    /// Enforce the changed-lines ceiling on push.
    pub sanity_check: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            force: false,
            stage_only: false,
            sanity_check: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Running,
    /// No tasks queued and not forced.
    NoOp,
    /// Stage-only run finished; nothing published.
    Staged,
    Published,
    Failed,
}

impl RunOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Running => "running",
            RunOutcome::NoOp => "noop",
            RunOutcome::Staged => "staged",
            RunOutcome::Published => "published",
            RunOutcome::Failed => "failed",
        }
    }
}

/// Statistics for one run.
#[derive(Debug, Clone)]
pub struct BuildRun {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub outcome: RunOutcome,
    pub zones_rebuilt: usize,
    pub zones_unchanged: usize,
    /// Zones with no data in any view.
    pub zones_without_data: usize,
    pub zones_failed: usize,
    pub files_written: usize,
    pub views_skipped: usize,
    pub tasks_drained: usize,
    pub error: Option<String>,
}

impl BuildRun {
    pub fn start() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            outcome: RunOutcome::Running,
            zones_rebuilt: 0,
            zones_unchanged: 0,
            zones_without_data: 0,
            zones_failed: 0,
            files_written: 0,
            views_skipped: 0,
            tasks_drained: 0,
            error: None,
        }
    }

    fn finish(&mut self, result: &crate::error::Result<()>) {
        self.finished_at = Some(Utc::now());
        if let Err(e) = result {
            self.outcome = RunOutcome::Failed;
            self.error = Some(e.to_string());
        }
    }
}
