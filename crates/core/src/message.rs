//! Message and Conversation domain types.
//!
//! User sends a message → the agent loop streams an assistant message →
//! tool results are appended → the assistant message is finalized.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;
use crate::tool::ToolCallResponse;

/// Unique identifier for a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

/// Lifecycle status of a message.
///
/// Only `Streaming` messages may change; `Sent` and `Error` are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Streaming,
    Sent,
    Error,
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Lifecycle status
    pub status: MessageStatus,

    /// Tool calls requested by the assistant (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallResponse>,

    /// If this is a tool result, which tool call it responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn new(role: Role, content: String, status: MessageStatus) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            status,
            tool_calls: Vec::new(),
            tool_call_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content.into(), MessageStatus::Sent)
    }

    /// Create a finished assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content.into(), MessageStatus::Sent)
    }

    /// Create an assistant message that is still being written.
    pub fn streaming_assistant() -> Self {
        Self::new(Role::Assistant, String::new(), MessageStatus::Streaming)
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content.into(), MessageStatus::Sent)
    }

    /// Create a tool result message.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let mut msg = Self::new(Role::Tool, content.into(), MessageStatus::Sent);
        msg.tool_call_id = Some(tool_call_id.into());
        msg
    }

    /// Create an assistant message that carries tool calls.
    pub fn assistant_with_tool_calls(
        content: impl Into<String>,
        tool_calls: Vec<ToolCallResponse>,
    ) -> Self {
        let mut msg = Self::assistant(content);
        msg.tool_calls = tool_calls;
        msg
    }

    pub fn is_streaming(&self) -> bool {
        self.status == MessageStatus::Streaming
    }

    /// Replace the content of a streaming message. Returns `false` (and
    /// leaves the message untouched) once the message is final.
    pub fn set_content(&mut self, content: impl Into<String>) -> bool {
        if !self.is_streaming() {
            return false;
        }
        self.content = content.into();
        true
    }

    /// Append to a streaming message. Returns `false` once the message is final.
    pub fn append(&mut self, text: &str) -> bool {
        if !self.is_streaming() {
            return false;
        }
        self.content.push_str(text);
        true
    }

    /// Transition a streaming message to a final status.
    pub fn finalize(&mut self, status: MessageStatus) -> bool {
        if !self.is_streaming() || status == MessageStatus::Streaming {
            return false;
        }
        self.status = status;
        self.timestamp = Utc::now();
        true
    }
}

/// A conversation is an ordered sequence of messages with shared context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: ConversationId::new(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Add a message to the conversation.
    pub fn push(&mut self, message: Message) {
        self.updated_at = Utc::now();
        self.messages.push(message);
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

/// Persistence port for finalized messages.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a finalized message. Implementations should reject messages
    /// that are still streaming.
    async fn persist(
        &self,
        conversation: &ConversationId,
        message: &Message,
    ) -> std::result::Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("Hello, agent!");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.status, MessageStatus::Sent);
        assert!(msg.tool_calls.is_empty());
    }

    #[test]
    fn only_streaming_messages_mutate() {
        let mut msg = Message::streaming_assistant();
        assert!(msg.append("part"));
        assert!(msg.append("ial"));
        assert_eq!(msg.content, "partial");
        assert!(msg.finalize(MessageStatus::Sent));
        assert!(!msg.set_content("rewritten"));
        assert!(!msg.append("!"));
        assert_eq!(msg.content, "partial");
        assert!(!msg.finalize(MessageStatus::Error));
        assert_eq!(msg.status, MessageStatus::Sent);
    }

    #[test]
    fn finalize_rejects_streaming_target() {
        let mut msg = Message::streaming_assistant();
        assert!(!msg.finalize(MessageStatus::Streaming));
        assert!(msg.is_streaming());
    }

    #[test]
    fn tool_result_links_call() {
        let msg = Message::tool_result("call_1", "ok");
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn conversation_tracks_updates() {
        let mut conv = Conversation::new();
        let created = conv.created_at;
        conv.push(Message::user("First message"));
        assert_eq!(conv.messages.len(), 1);
        assert!(conv.updated_at >= created);
    }
}
