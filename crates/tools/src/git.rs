//! `VersionControl` backed by the `git` command line.

use async_trait::async_trait;
use forgeloop_core::error::VcsError;
use forgeloop_core::vcs::{VcsOperation, VersionControl};
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Runs `git` inside the workspace root.
#[derive(Debug, Clone)]
pub struct GitCli {
    root: PathBuf,
    timeout: Duration,
}

impl GitCli {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Command-line arguments for one operation.
pub fn git_args(operation: &VcsOperation) -> Vec<String> {
    let mut args: Vec<String> = Vec::new();
    let mut push = |s: &str| args.push(s.to_string());
    match operation {
        VcsOperation::Status => {
            push("status");
            push("--short");
            push("--branch");
        }
        VcsOperation::Stage { paths } => {
            push("add");
            push("--");
            for path in paths {
                push(path);
            }
        }
        VcsOperation::Commit { message } => {
            push("commit");
            push("-m");
            push(message);
        }
        VcsOperation::Push => push("push"),
        VcsOperation::Pull => {
            push("pull");
            push("--ff-only");
        }
        VcsOperation::Branch { name: None } => {
            push("branch");
            push("--list");
        }
        VcsOperation::Branch { name: Some(name) } => {
            push("branch");
            push(name);
        }
        VcsOperation::Checkout { branch, create } => {
            push("checkout");
            if *create {
                push("-b");
            }
            push(branch);
        }
        VcsOperation::Log { limit } => {
            push("log");
            push("--oneline");
            push("-n");
            push(&limit.to_string());
        }
        VcsOperation::Diff { path, staged } => {
            push("diff");
            if *staged {
                push("--cached");
            }
            if let Some(path) = path {
                push("--");
                push(path);
            }
        }
        VcsOperation::Discard { path } => {
            push("checkout");
            push("--");
            push(path);
        }
    }
    args
}

#[async_trait]
impl VersionControl for GitCli {
    async fn run(&self, operation: VcsOperation) -> Result<String, VcsError> {
        let args = git_args(&operation);
        debug!(op = operation.label(), ?args, "Running git");

        let output = tokio::time::timeout(
            self.timeout,
            Command::new("git")
                .args(&args)
                .current_dir(&self.root)
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| VcsError::Launch(format!("git {} timed out", operation.label())))?
        .map_err(|e| VcsError::Launch(e.to_string()))?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            warn!(op = operation.label(), exit_code = code, "git failed");
            if stderr.contains("not a git repository") {
                return Err(VcsError::NotARepository(self.root.display().to_string()));
            }
            return Err(VcsError::CommandFailed { code, stderr });
        }

        // Push, pull, and checkout report progress on stderr.
        let text = match (stdout.is_empty(), stderr.is_empty()) {
            (false, _) => stdout,
            (true, false) => stderr,
            (true, true) => format!("git {} completed", operation.label()),
        };
        Ok(text)
    }
}
