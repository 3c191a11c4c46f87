//! An in-process undo log.

use async_trait::async_trait;
use forgeloop_core::error::WorkspaceError;
use forgeloop_core::workspace::{ChangeRecorder, FileChange};
use tokio::sync::Mutex;

/// Keeps every recorded change, oldest first, capped at `capacity`.
#[derive(Debug)]
pub struct ChangeLog {
    changes: Mutex<Vec<FileChange>>,
    capacity: usize,
}

impl ChangeLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            changes: Mutex::new(Vec::new()),
            capacity: capacity.max(1),
        }
    }

    pub async fn changes(&self) -> Vec<FileChange> {
        self.changes.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.changes.lock().await.len()
    }

    /// Remove and return the most recent change.
    pub async fn pop(&self) -> Option<FileChange> {
        self.changes.lock().await.pop()
    }
}

impl Default for ChangeLog {
    fn default() -> Self {
        Self::new(500)
    }
}

#[async_trait]
impl ChangeRecorder for ChangeLog {
    async fn record_change(&self, change: &FileChange) -> Result<(), WorkspaceError> {
        let mut changes = self.changes.lock().await;
        if changes.len() == self.capacity {
            changes.remove(0);
        }
        changes.push(change.clone());
        Ok(())
    }
}
