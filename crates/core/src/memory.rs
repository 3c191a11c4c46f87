//! Memory port: long-term notes the agent can save and recall.
//!
//! The semantic memory subsystem itself lives outside Forgeloop; the loop
//! only needs save / recall / list / delete.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MemoryError;

/// A single memory entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Unique ID for this memory (empty = assign on store)
    pub id: String,

    /// The content of the memory
    pub content: String,

    /// Tags for categorization
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    pub created_at: DateTime<Utc>,

    /// Relevance score (set by recall)
    #[serde(default)]
    pub score: f32,
}

impl MemoryEntry {
    pub fn new(content: impl Into<String>, tags: Vec<String>) -> Self {
        Self {
            id: String::new(),
            content: content.into(),
            tags,
            created_at: Utc::now(),
            score: 0.0,
        }
    }
}

/// A recall query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryQuery {
    pub text: String,

    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Only entries carrying at least one of these tags (empty = any)
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_limit() -> usize {
    10
}

/// The memory backend port.
#[async_trait]
pub trait MemoryBackend: Send + Sync {
    fn name(&self) -> &str;

    /// SaveMemory: returns the assigned ID.
    async fn store(&self, entry: MemoryEntry) -> Result<String, MemoryError>;

    /// RecallMemory: best matches first.
    async fn search(&self, query: MemoryQuery) -> Result<Vec<MemoryEntry>, MemoryError>;

    /// ListMemories: newest first.
    async fn list(&self, limit: usize) -> Result<Vec<MemoryEntry>, MemoryError>;

    async fn get(&self, id: &str) -> Result<Option<MemoryEntry>, MemoryError>;

    /// DeleteMemory: `false` if no entry had this ID.
    async fn delete(&self, id: &str) -> Result<bool, MemoryError>;

    async fn count(&self) -> Result<usize, MemoryError>;
}
