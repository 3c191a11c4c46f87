//! Workspace sandboxing for Forgeloop file tools.
//!
//! Every path a tool receives is relative to the workspace root. The
//! sandbox resolves it, refusing traversal out of the root and anything
//! under a forbidden prefix.

pub mod path;

pub use path::{PathValidationError, WorkspaceSandbox};
