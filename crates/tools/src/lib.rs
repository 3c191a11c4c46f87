//! Tool execution for Forgeloop.
//!
//! [`ToolDispatcher`] turns a model's tool call (a name plus raw argument
//! text) into a [`ToolResult`](forgeloop_core::ToolResult). Built-in tools
//! are a fixed [`ToolKind`] table covering workspace files, search, memory,
//! todos, agent control, and git. Anything else is looked up in the
//! [`ExtensionRegistry`].
//!
//! Concrete collaborators live here too: [`LocalWorkspace`] for the local
//! filesystem, [`GitCli`] for version control, and [`ChangeLog`] as an
//! in-process undo log.

pub mod args;
pub mod change_log;
pub mod dispatcher;
pub mod extension;
pub mod file_ops;
pub mod git;
pub mod kind;
pub mod local_fs;
pub mod memory_ops;
pub mod todo;
pub mod validate;
pub mod vcs_ops;

pub use args::Args;
pub use change_log::ChangeLog;
pub use dispatcher::{DEFAULT_MAX_ERROR_CHARS, ToolDispatcher};
pub use extension::{ExtensionRegistry, ExtensionTool};
pub use git::GitCli;
pub use kind::ToolKind;
pub use local_fs::LocalWorkspace;
pub use todo::TodoList;
