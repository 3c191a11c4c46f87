//! `Workspace` over the local filesystem, confined to one root directory.

use async_trait::async_trait;
use forgeloop_core::error::WorkspaceError;
use forgeloop_core::workspace::{TreeEntry, Workspace};
use forgeloop_security::WorkspaceSandbox;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Listing stops after this many entries.
const MAX_TREE_ENTRIES: usize = 2_000;

/// Directories never descended into when listing.
const SKIPPED_DIRS: &[&str] = &[".git", "target", "node_modules"];

#[derive(Debug, Clone)]
pub struct LocalWorkspace {
    sandbox: WorkspaceSandbox,
}

impl LocalWorkspace {
    pub fn new(sandbox: WorkspaceSandbox) -> Self {
        Self { sandbox }
    }

    pub fn root(&self) -> &Path {
        self.sandbox.root()
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, WorkspaceError> {
        self.sandbox
            .resolve(path)
            .map_err(|e| WorkspaceError::AccessDenied {
                path: path.to_string(),
                reason: e.to_string(),
            })
    }

    async fn ensure_parent(&self, path: &str, target: &Path) -> Result<(), WorkspaceError> {
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(path, e))?;
        }
        Ok(())
    }

    async fn ensure_absent(&self, path: &str, target: &Path) -> Result<(), WorkspaceError> {
        if tokio::fs::try_exists(target).await.unwrap_or(false) {
            return Err(WorkspaceError::AlreadyExists(path.to_string()));
        }
        Ok(())
    }

    async fn ensure_file(&self, path: &str, target: &Path) -> Result<(), WorkspaceError> {
        let meta = tokio::fs::metadata(target)
            .await
            .map_err(|e| io_error(path, e))?;
        if meta.is_dir() {
            return Err(WorkspaceError::Io {
                path: path.to_string(),
                reason: "is a directory".into(),
            });
        }
        Ok(())
    }
}

fn io_error(path: &str, e: std::io::Error) -> WorkspaceError {
    match e.kind() {
        ErrorKind::NotFound => WorkspaceError::NotFound(path.to_string()),
        ErrorKind::AlreadyExists => WorkspaceError::AlreadyExists(path.to_string()),
        ErrorKind::PermissionDenied => WorkspaceError::AccessDenied {
            path: path.to_string(),
            reason: e.to_string(),
        },
        ErrorKind::InvalidData => WorkspaceError::Io {
            path: path.to_string(),
            reason: "not a UTF-8 text file".into(),
        },
        _ => WorkspaceError::Io {
            path: path.to_string(),
            reason: e.to_string(),
        },
    }
}

#[async_trait]
impl Workspace for LocalWorkspace {
    async fn read_file(&self, path: &str) -> Result<String, WorkspaceError> {
        let target = self.resolve(path)?;
        self.ensure_file(path, &target).await?;
        tokio::fs::read_to_string(&target)
            .await
            .map_err(|e| io_error(path, e))
    }

    async fn write_file(&self, path: &str, content: &str) -> Result<(), WorkspaceError> {
        let target = self.resolve(path)?;
        self.ensure_parent(path, &target).await?;
        tokio::fs::write(&target, content)
            .await
            .map_err(|e| io_error(path, e))?;
        debug!(path, bytes = content.len(), "Wrote file");
        Ok(())
    }

    async fn create_file(&self, path: &str, content: &str) -> Result<(), WorkspaceError> {
        let target = self.resolve(path)?;
        self.ensure_parent(path, &target).await?;
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
            .await
            .map_err(|e| io_error(path, e))?;
        file.write_all(content.as_bytes())
            .await
            .map_err(|e| io_error(path, e))?;
        file.flush().await.map_err(|e| io_error(path, e))?;
        debug!(path, bytes = content.len(), "Created file");
        Ok(())
    }

    async fn delete_file(&self, path: &str) -> Result<(), WorkspaceError> {
        let target = self.resolve(path)?;
        self.ensure_file(path, &target).await?;
        tokio::fs::remove_file(&target)
            .await
            .map_err(|e| io_error(path, e))
    }

    async fn rename_file(&self, from: &str, to: &str) -> Result<(), WorkspaceError> {
        let source = self.resolve(from)?;
        let target = self.resolve(to)?;
        self.ensure_file(from, &source).await?;
        self.ensure_absent(to, &target).await?;
        self.ensure_parent(to, &target).await?;
        tokio::fs::rename(&source, &target)
            .await
            .map_err(|e| io_error(from, e))
    }

    async fn copy_file(&self, from: &str, to: &str) -> Result<(), WorkspaceError> {
        let source = self.resolve(from)?;
        let target = self.resolve(to)?;
        self.ensure_file(from, &source).await?;
        self.ensure_absent(to, &target).await?;
        self.ensure_parent(to, &target).await?;
        tokio::fs::copy(&source, &target)
            .await
            .map_err(|e| io_error(from, e))?;
        Ok(())
    }

    async fn move_file(&self, from: &str, to: &str) -> Result<(), WorkspaceError> {
        let source = self.resolve(from)?;
        let target = self.resolve(to)?;
        self.ensure_file(from, &source).await?;
        self.ensure_absent(to, &target).await?;
        self.ensure_parent(to, &target).await?;
        if tokio::fs::rename(&source, &target).await.is_ok() {
            return Ok(());
        }
        // Cross-device: copy, then remove the source.
        tokio::fs::copy(&source, &target)
            .await
            .map_err(|e| io_error(from, e))?;
        tokio::fs::remove_file(&source)
            .await
            .map_err(|e| io_error(from, e))
    }

    async fn list_tree(&self, path: &str) -> Result<Vec<TreeEntry>, WorkspaceError> {
        let start = self.resolve(path)?;
        let meta = tokio::fs::metadata(&start)
            .await
            .map_err(|e| io_error(path, e))?;
        if !meta.is_dir() {
            return Err(WorkspaceError::Io {
                path: path.to_string(),
                reason: "not a directory".into(),
            });
        }

        let mut entries = Vec::new();
        let mut pending = vec![start];
        'walk: while let Some(dir) = pending.pop() {
            let mut reader = tokio::fs::read_dir(&dir)
                .await
                .map_err(|e| io_error(path, e))?;
            while let Some(entry) = reader.next_entry().await.map_err(|e| io_error(path, e))? {
                let entry_path = entry.path();
                let Some(relative) = self.sandbox.relative(&entry_path) else {
                    continue;
                };
                let relative = relative.trim_start_matches('/').to_string();
                if !self.sandbox.check(&relative).is_empty() {
                    continue;
                }
                let Ok(file_type) = entry.file_type().await else {
                    continue;
                };
                let is_dir = file_type.is_dir();
                if is_dir {
                    let name = entry.file_name();
                    if SKIPPED_DIRS.iter().any(|s| name == *s) {
                        continue;
                    }
                    pending.push(entry_path);
                }
                let size = if is_dir {
                    0
                } else {
                    entry.metadata().await.map(|m| m.len()).unwrap_or(0)
                };
                entries.push(TreeEntry {
                    path: relative,
                    is_dir,
                    size,
                });
                if entries.len() >= MAX_TREE_ENTRIES {
                    break 'walk;
                }
            }
        }

        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    async fn exists(&self, path: &str) -> bool {
        match self.resolve(path) {
            Ok(target) => tokio::fs::try_exists(target).await.unwrap_or(false),
            Err(_) => false,
        }
    }
}
