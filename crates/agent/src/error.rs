//! Errors returned by the agent loop itself.
//!
//! Transport and tool failures are not here: they end up in the assistant
//! message (status `Error`) or in tool results, never as an `Err`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("a turn is already in progress")]
    Busy,

    #[error("message is empty")]
    EmptyMessage,
}
