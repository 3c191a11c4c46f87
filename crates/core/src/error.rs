//! Error types for the Forgeloop domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum.

use thiserror::Error;

/// The top-level error type for Forgeloop operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Workspace error: {0}")]
    Workspace(#[from] WorkspaceError),

    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("Version control error: {0}")]
    Vcs(#[from] VcsError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Transport-level failures. Malformed stream payloads are never errors;
/// only the connection and the opening response can fail.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limited by provider")]
    RateLimited,

    #[error("Service unavailable")]
    ServiceUnavailable,

    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

impl ProviderError {
    /// Classify an HTTP status from the opening response.
    pub fn from_status(status_code: u16, body: impl Into<String>) -> Self {
        match status_code {
            401 | 403 => Self::AuthenticationFailed(body.into()),
            429 => Self::RateLimited,
            503 => Self::ServiceUnavailable,
            _ => Self::ApiError {
                status_code,
                message: body.into(),
            },
        }
    }

    /// The short, user-facing message for this failure.
    pub fn user_message(&self) -> String {
        match self {
            Self::AuthenticationFailed(_) => "invalid credentials".into(),
            Self::RateLimited => "rate limited, retry later".into(),
            Self::ServiceUnavailable => "service unavailable".into(),
            Self::ApiError { status_code, .. } => {
                format!("request failed with status {status_code}")
            }
            Self::Network(msg) | Self::StreamInterrupted(msg) => format!("network error: {msg}"),
            Self::NotConfigured(msg) => format!("provider not configured: {msg}"),
        }
    }
}

/// Errors produced while handling one tool call. None of these abort the
/// agent loop; the dispatcher turns every variant into a failed `ToolResult`.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("malformed arguments")]
    MalformedArguments,

    #[error("invalid arguments: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("{tool_name} failed: {reason}")]
    Execution { tool_name: String, reason: String },

    #[error("Tool not available: {0}")]
    Unavailable(String),
}

impl ToolError {
    pub fn execution(tool_name: impl Into<String>, reason: impl ToString) -> Self {
        Self::Execution {
            tool_name: tool_name.into(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("File already exists: {0}")]
    AlreadyExists(String),

    #[error("Access denied for '{path}': {reason}")]
    AccessDenied { path: String, reason: String },

    #[error("I/O error on '{path}': {reason}")]
    Io { path: String, reason: String },
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),
}

#[derive(Debug, Error)]
pub enum VcsError {
    #[error("Not a repository: {0}")]
    NotARepository(String),

    #[error("Command failed (exit code {code}): {stderr}")]
    CommandFailed { code: i32, stderr: String },

    #[error("Failed to launch version control: {0}")]
    Launch(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Message is still streaming: {0}")]
    NotFinalized(String),

    #[error("Persistence failed: {0}")]
    Persistence(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(matches!(
            ProviderError::from_status(401, "bad key"),
            ProviderError::AuthenticationFailed(_)
        ));
        assert!(matches!(ProviderError::from_status(429, ""), ProviderError::RateLimited));
        assert!(matches!(
            ProviderError::from_status(503, ""),
            ProviderError::ServiceUnavailable
        ));
        assert!(matches!(
            ProviderError::from_status(500, "boom"),
            ProviderError::ApiError { status_code: 500, .. }
        ));
    }

    #[test]
    fn user_messages_are_stable() {
        assert_eq!(
            ProviderError::from_status(401, "").user_message(),
            "invalid credentials"
        );
        assert_eq!(
            ProviderError::RateLimited.user_message(),
            "rate limited, retry later"
        );
        assert_eq!(
            ProviderError::ServiceUnavailable.user_message(),
            "service unavailable"
        );
        assert_eq!(
            ProviderError::from_status(502, "gateway").user_message(),
            "request failed with status 502"
        );
        assert_eq!(
            ProviderError::Network("connection reset".into()).user_message(),
            "network error: connection reset"
        );
    }

    #[test]
    fn validation_error_lists_every_violation() {
        let err = ToolError::Validation(vec![
            "missing required argument 'path'".into(),
            "missing required argument 'content'".into(),
        ]);
        let text = err.to_string();
        assert!(text.starts_with("invalid arguments: "));
        assert!(text.contains("'path'"));
        assert!(text.contains("'content'"));
    }

    #[test]
    fn unknown_tool_display() {
        assert_eq!(
            ToolError::UnknownTool("teleport".into()).to_string(),
            "unknown tool: teleport"
        );
    }
}
