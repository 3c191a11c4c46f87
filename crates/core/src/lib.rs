//! # Forgeloop Core
//!
//! Domain types, ports, and error definitions for the Forgeloop agent loop.
//! This crate has **no transport or storage dependencies**: it defines the
//! vocabulary every other crate speaks.
//!
//! ## Layout
//!
//! - `content`: typed content blocks for display
//! - `stream`: normalized streaming events and raw SSE frames
//! - `tool`: tool call records, results, and definitions
//! - `message`: conversation messages and their lifecycle status
//! - `provider`: the transport port the loop talks to
//! - `workspace`, `memory`, `vcs`: collaborator ports consumed by tools
//! - `observer`: the single UI-facing observer interface

pub mod content;
pub mod error;
pub mod memory;
pub mod message;
pub mod observer;
pub mod provider;
pub mod stream;
pub mod tool;
pub mod vcs;
pub mod workspace;

// Re-export key types at crate root for ergonomics
pub use content::{ContentBlock, ToolCallBlock, ToolStatus};
pub use error::{Error, Result};
pub use message::{Conversation, Message, MessageStatus, MessageStore, Role};
pub use observer::{AgentObserver, MessageSnapshot, NoopObserver, QuestionReply, TodoItem, TodoStatus};
pub use provider::{Provider, ProviderRequest};
pub use stream::{RawFrameSink, SseFrame, StreamEvent};
pub use tool::{ToolCallResponse, ToolDefinition, ToolResult};
pub use vcs::{VcsOperation, VersionControl};
pub use workspace::{ChangeRecorder, ChangeType, FileChange, TreeEntry, Workspace};
