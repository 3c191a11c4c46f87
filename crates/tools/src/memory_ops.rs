//! Memory tools over the `MemoryBackend` port.

use forgeloop_core::error::ToolError;
use forgeloop_core::memory::{MemoryBackend, MemoryEntry, MemoryQuery};

use crate::args::Args;
use crate::kind::ToolKind;

const DEFAULT_RECALL_LIMIT: usize = 10;
const DEFAULT_LIST_LIMIT: usize = 20;

fn render(entries: &[MemoryEntry]) -> String {
    entries
        .iter()
        .map(|e| {
            if e.tags.is_empty() {
                format!("[{}] {}", e.id, e.content)
            } else {
                format!("[{}] {} (tags: {})", e.id, e.content, e.tags.join(", "))
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub async fn execute(
    kind: ToolKind,
    memory: &dyn MemoryBackend,
    args: &Args,
) -> Result<String, ToolError> {
    let fail = |e: forgeloop_core::error::MemoryError| ToolError::execution(kind.name(), e);
    match kind {
        ToolKind::SaveMemory => {
            let content = args.str("content")?.trim();
            if content.is_empty() {
                return Err(ToolError::execution(kind.name(), "content is empty"));
            }
            let entry = MemoryEntry::new(content, args.str_list("tags"));
            let id = memory.store(entry).await.map_err(fail)?;
            Ok(format!("Saved memory {id}"))
        }
        ToolKind::RecallMemory => {
            let query = MemoryQuery {
                text: args.str("query")?.to_string(),
                limit: args.usize_or("limit", DEFAULT_RECALL_LIMIT),
                tags: args.str_list("tags"),
            };
            let found = memory.search(query).await.map_err(fail)?;
            if found.is_empty() {
                return Ok("No matching memories.".to_string());
            }
            Ok(format!("{} memories found\n{}", found.len(), render(&found)))
        }
        ToolKind::ListMemories => {
            let limit = args.usize_or("limit", DEFAULT_LIST_LIMIT);
            let entries = memory.list(limit).await.map_err(fail)?;
            if entries.is_empty() {
                return Ok("No memories saved yet.".to_string());
            }
            let total = memory.count().await.map_err(fail)?;
            Ok(format!(
                "Showing {} of {total} memories\n{}",
                entries.len(),
                render(&entries)
            ))
        }
        ToolKind::DeleteMemory => {
            let id = args.str("id")?;
            if memory.delete(id).await.map_err(fail)? {
                Ok(format!("Deleted memory {id}"))
            } else {
                Err(ToolError::execution(kind.name(), format!("no memory with id {id}")))
            }
        }
        other => Err(ToolError::UnknownTool(other.name().to_string())),
    }
}
