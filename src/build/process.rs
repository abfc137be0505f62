//! Shelling out to external tools (checkers, git).
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use tokio::process::Command;
use tracing::{debug, error};

use crate::error::{BuildError, Result};

#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

/// One external command, run to completion with output captured.
/// No timeout is applied.
#[derive(Debug, Clone)]
pub struct Invocation {
    program: OsString,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    ignore_failure: bool,
}

impl Invocation {
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_owned(),
            args: Vec::new(),
            cwd: None,
            ignore_failure: false,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_owned());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_owned()));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Return the output instead of failing on a nonzero exit.
    pub fn ignore_failure(mut self) -> Self {
        self.ignore_failure = true;
        self
    }

    /// Shell-ish rendering for logs and error messages.
    pub fn display(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|a| a.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub async fn run(&self) -> Result<CommandOutput> {
        let command = self.display();
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }

        debug!(%command, cwd = ?self.cwd, "running command");
        let output = cmd
            .output()
            .await
            .map_err(|e| BuildError::io(PathBuf::from(&self.program), e))?;

        let out = CommandOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !out.status.success() && !self.ignore_failure {
            error!(
                %command,
                status = %out.status,
                stdout = %out.stdout.trim_end(),
                stderr = %out.stderr.trim_end(),
                "command failed"
            );
            return Err(BuildError::Command {
                command,
                status: out.status.to_string(),
                stdout: out.stdout,
                stderr: out.stderr,
            });
        }

        Ok(out)
    }
}

/// Merge captured streams into the diagnostic block attached to errors.
pub fn format_diagnostics(stdout: &str, stderr: &str) -> String {
    let mut msg = String::new();
    if !stdout.trim().is_empty() {
        msg.push_str("=== stdout ===\n");
        msg.push_str(stdout.trim_end());
        msg.push('\n');
    }
    if !stderr.trim().is_empty() {
        msg.push_str("=== stderr ===\n");
        msg.push_str(stderr.trim_end());
        msg.push('\n');
    }
    msg
}
