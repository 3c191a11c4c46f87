//! The observer interface the agent loop reports to.
//!
//! One observer replaces the UI callbacks (redisplay, file changed, todos,
//! ask-user). Every method is called from the loop's task and must return
//! quickly; none may call back into the loop.

use serde::{Deserialize, Serialize};

use crate::content::ContentBlock;
use crate::message::MessageStatus;
use crate::workspace::FileChange;

/// An immutable view of the in-flight assistant message for one redraw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageSnapshot {
    pub message_id: String,
    pub status: MessageStatus,
    pub iteration: u32,
    pub content: String,
    pub blocks: Vec<ContentBlock>,
}

/// The observer's answer to `ask_question`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionReply {
    /// The question was shown; the user will answer in a later turn.
    Pending,
    /// The observer answered immediately (e.g. scripted sessions).
    Answer(String),
}

/// Status of a todo item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    Pending,
    InProgress,
    Done,
}

impl TodoStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" | "todo" => Some(Self::Pending),
            "in_progress" | "in-progress" | "active" => Some(Self::InProgress),
            "done" | "completed" | "complete" => Some(Self::Done),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoItem {
    pub id: u32,
    pub content: String,
    pub status: TodoStatus,
}

pub trait AgentObserver: Send + Sync {
    /// A (possibly throttled) redraw of the in-flight message.
    fn on_snapshot(&self, _snapshot: &MessageSnapshot) {}

    /// A tool mutated a file. Called before the tool reports success.
    fn on_file_changed(&self, _change: &FileChange) {}

    /// The session todo list changed.
    fn on_todos_changed(&self, _todos: &[TodoItem]) {}

    /// The model asked the user a question.
    fn on_question(&self, _question: &str) -> QuestionReply {
        QuestionReply::Pending
    }
}

/// An observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl AgentObserver for NoopObserver {}
