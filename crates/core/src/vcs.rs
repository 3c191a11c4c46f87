//! Version-control port.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::VcsError;

/// One version-control operation, as requested by a `git_*` tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum VcsOperation {
    Status,
    Stage { paths: Vec<String> },
    Commit { message: String },
    Push,
    Pull,
    /// List branches, or create one when `name` is set.
    Branch { name: Option<String> },
    Checkout { branch: String, create: bool },
    Log { limit: usize },
    Diff { path: Option<String>, staged: bool },
    /// Throw away working-tree changes to `path`.
    Discard { path: String },
}

impl VcsOperation {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Stage { .. } => "stage",
            Self::Commit { .. } => "commit",
            Self::Push => "push",
            Self::Pull => "pull",
            Self::Branch { .. } => "branch",
            Self::Checkout { .. } => "checkout",
            Self::Log { .. } => "log",
            Self::Diff { .. } => "diff",
            Self::Discard { .. } => "discard",
        }
    }
}

#[async_trait]
pub trait VersionControl: Send + Sync {
    /// Run an operation and return its human-readable output.
    async fn run(&self, operation: VcsOperation) -> Result<String, VcsError>;
}
