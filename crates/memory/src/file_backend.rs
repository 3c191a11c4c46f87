//! File-based memory backend: persistent JSON-lines storage.
//!
//! Each line of the file is one JSON-encoded `MemoryEntry`. Entries are
//! loaded once and the whole file is rewritten on every mutation.
//!
//! Storage location: `~/.forgeloop/memory/memories.jsonl`

use async_trait::async_trait;
use forgeloop_core::error::MemoryError;
use forgeloop_core::memory::{MemoryBackend, MemoryEntry, MemoryQuery};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::keyword;

pub struct FileBackend {
    path: PathBuf,
    entries: RwLock<Vec<MemoryEntry>>,
}

impl FileBackend {
    /// Open the store at `path`, loading any existing entries.
    /// A missing file starts empty; it is created on first write.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = Self::load_from_disk(&path).await;
        debug!(path = %path.display(), count = entries.len(), "File memory backend loaded");
        Self {
            path,
            entries: RwLock::new(entries),
        }
    }

    /// Default path under a config directory: `<dir>/memory/memories.jsonl`.
    pub fn default_path(config_dir: &Path) -> PathBuf {
        config_dir.join("memory").join("memories.jsonl")
    }

    async fn load_from_disk(path: &Path) -> Vec<MemoryEntry> {
        let Ok(content) = tokio::fs::read_to_string(path).await else {
            return Vec::new();
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<MemoryEntry>(line) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "Skipping corrupted memory entry");
                    None
                }
            })
            .collect()
    }

    async fn flush(&self, entries: &[MemoryEntry]) -> Result<(), MemoryError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                MemoryError::Storage(format!("Failed to create memory directory: {e}"))
            })?;
        }

        let mut content = String::new();
        for entry in entries {
            let line = serde_json::to_string(entry).map_err(|e| {
                MemoryError::Storage(format!("Failed to serialize memory entry: {e}"))
            })?;
            content.push_str(&line);
            content.push('\n');
        }

        tokio::fs::write(&self.path, content)
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to write memory file: {e}")))
    }
}

#[async_trait]
impl MemoryBackend for FileBackend {
    fn name(&self) -> &str {
        "file"
    }

    async fn store(&self, mut entry: MemoryEntry) -> Result<String, MemoryError> {
        if entry.id.is_empty() {
            entry.id = Uuid::new_v4().to_string();
        }
        let id = entry.id.clone();
        let mut entries = self.entries.write().await;
        entries.push(entry);
        self.flush(&entries).await?;
        Ok(id)
    }

    async fn search(&self, query: MemoryQuery) -> Result<Vec<MemoryEntry>, MemoryError> {
        let entries = self.entries.read().await;
        Ok(keyword::rank(entries.iter(), &query))
    }

    async fn list(&self, limit: usize) -> Result<Vec<MemoryEntry>, MemoryError> {
        let entries = self.entries.read().await;
        Ok(entries.iter().rev().take(limit).cloned().collect())
    }

    async fn get(&self, id: &str) -> Result<Option<MemoryEntry>, MemoryError> {
        let entries = self.entries.read().await;
        Ok(entries.iter().find(|e| e.id == id).cloned())
    }

    async fn delete(&self, id: &str) -> Result<bool, MemoryError> {
        let mut entries = self.entries.write().await;
        let len_before = entries.len();
        entries.retain(|e| e.id != id);
        let deleted = entries.len() < len_before;
        if deleted {
            self.flush(&entries).await?;
        }
        Ok(deleted)
    }

    async fn count(&self) -> Result<usize, MemoryError> {
        Ok(self.entries.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_entry(content: &str) -> MemoryEntry {
        MemoryEntry::new(content, vec!["test".into()])
    }

    #[tokio::test]
    async fn store_and_retrieve_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = FileBackend::default_path(dir.path());

        let mem = FileBackend::open(&path).await;
        let id = mem.store(test_entry("Rust is great")).await.unwrap();
        assert!(!id.is_empty());

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("Rust is great"));

        let reopened = FileBackend::open(&path).await;
        let entry = reopened.get(&id).await.unwrap().unwrap();
        assert_eq!(entry.content, "Rust is great");
        assert_eq!(entry.tags, vec!["test".to_string()]);
    }

    #[tokio::test]
    async fn search_finds_by_keyword() {
        let dir = tempfile::tempdir().unwrap();
        let mem = FileBackend::open(dir.path().join("m.jsonl")).await;
        mem.store(test_entry("The user prefers Rust")).await.unwrap();
        mem.store(test_entry("Python is also good")).await.unwrap();
        mem.store(test_entry("Rust has great performance"))
            .await
            .unwrap();

        let results = mem
            .search(MemoryQuery {
                text: "rust".into(),
                limit: 10,
                tags: vec![],
            })
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        for r in &results {
            assert!(r.content.to_lowercase().contains("rust"));
        }
    }

    #[tokio::test]
    async fn delete_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.jsonl");

        let mem = FileBackend::open(&path).await;
        let id = mem.store(test_entry("To be deleted")).await.unwrap();
        assert!(mem.delete(&id).await.unwrap());

        let reopened = FileBackend::open(&path).await;
        assert!(reopened.get(&id).await.unwrap().is_none());
        assert_eq!(reopened.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn handles_missing_file_gracefully() {
        let dir = tempfile::tempdir().unwrap();
        let mem = FileBackend::open(dir.path().join("absent.jsonl")).await;
        assert_eq!(mem.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn handles_corrupted_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.jsonl");
        std::fs::write(
            &path,
            concat!(
                r#"{"id":"1","content":"valid","created_at":"2026-01-01T00:00:00Z"}"#,
                "\nthis is not json\n",
                r#"{"id":"2","content":"also valid","tags":["x"],"created_at":"2026-01-01T00:00:00Z","score":0.0}"#,
                "\n"
            ),
        )
        .unwrap();

        let mem = FileBackend::open(&path).await;
        assert_eq!(mem.count().await.unwrap(), 2);
    }
}
