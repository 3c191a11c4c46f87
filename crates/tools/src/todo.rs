//! The session-scoped todo list behind `create_todo`, `update_todo`, and
//! `list_todos`.

use forgeloop_core::{TodoItem, TodoStatus};
use std::sync::Mutex;

#[derive(Debug, Default)]
struct Inner {
    items: Vec<TodoItem>,
    next_id: u32,
}

#[derive(Debug, Default)]
pub struct TodoList {
    inner: Mutex<Inner>,
}

impl TodoList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item; returns the new item and a snapshot of the list.
    pub fn create(&self, content: &str, status: TodoStatus) -> (TodoItem, Vec<TodoItem>) {
        let mut inner = self.lock();
        inner.next_id += 1;
        let item = TodoItem {
            id: inner.next_id,
            content: content.trim().to_string(),
            status,
        };
        inner.items.push(item.clone());
        (item, inner.items.clone())
    }

    /// Change an item's status and/or content. `None` when no such id.
    pub fn update(
        &self,
        id: u32,
        status: Option<TodoStatus>,
        content: Option<&str>,
    ) -> Option<(TodoItem, Vec<TodoItem>)> {
        let mut inner = self.lock();
        let item = inner.items.iter_mut().find(|item| item.id == id)?;
        if let Some(status) = status {
            item.status = status;
        }
        if let Some(content) = content {
            item.content = content.trim().to_string();
        }
        let updated = item.clone();
        Some((updated, inner.items.clone()))
    }

    pub fn snapshot(&self) -> Vec<TodoItem> {
        self.lock().items.clone()
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.items.clear();
        inner.next_id = 0;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A panic while holding the lock cannot leave the list half-edited.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Checklist rendering used as tool output.
pub fn render(items: &[TodoItem]) -> String {
    if items.is_empty() {
        return "Todo list is empty.".to_string();
    }
    items
        .iter()
        .map(|item| {
            let mark = match item.status {
                TodoStatus::Pending => "[ ]",
                TodoStatus::InProgress => "[~]",
                TodoStatus::Done => "[x]",
            };
            format!("{}. {mark} {}", item.id, item.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
