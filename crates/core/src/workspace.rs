//! Workspace port: file operations the tools act on, plus the undo-log
//! recorder that observes every mutation.
//!
//! Implementations: local filesystem (in `forgeloop-tools`), and whatever
//! project store an embedding application provides.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::WorkspaceError;

/// One entry of a directory listing, with a workspace-relative path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    pub is_dir: bool,
    #[serde(default)]
    pub size: u64,
}

/// File operations consumed by the dispatcher. Paths are workspace-relative.
#[async_trait]
pub trait Workspace: Send + Sync {
    async fn read_file(&self, path: &str) -> Result<String, WorkspaceError>;

    /// Create or overwrite a file, creating parent directories.
    async fn write_file(&self, path: &str, content: &str) -> Result<(), WorkspaceError>;

    /// Create a new file; fails with `AlreadyExists` if it exists.
    async fn create_file(&self, path: &str, content: &str) -> Result<(), WorkspaceError>;

    async fn delete_file(&self, path: &str) -> Result<(), WorkspaceError>;

    async fn rename_file(&self, from: &str, to: &str) -> Result<(), WorkspaceError>;

    async fn copy_file(&self, from: &str, to: &str) -> Result<(), WorkspaceError>;

    async fn move_file(&self, from: &str, to: &str) -> Result<(), WorkspaceError>;

    /// Recursively list files and directories under `path`.
    async fn list_tree(&self, path: &str) -> Result<Vec<TreeEntry>, WorkspaceError>;

    async fn exists(&self, path: &str) -> bool;
}

/// The kind of mutation a tool performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Created,
    Modified,
    Deleted,
    Renamed,
    Copied,
    Moved,
}

/// A file mutation, reported before the tool returns success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    pub change_type: ChangeType,
    /// Source path for renames, copies, and moves.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_content: Option<String>,
}

/// Undo-log port. Recording is best-effort: the dispatcher bounds the call
/// with a timeout and only logs failures.
#[async_trait]
pub trait ChangeRecorder: Send + Sync {
    async fn record_change(&self, change: &FileChange) -> Result<(), WorkspaceError>;
}
