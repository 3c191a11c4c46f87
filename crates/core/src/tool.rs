//! Tool call records and results.
//!
//! Tools are what give the agent the ability to act: read and write files,
//! manage todos, recall memories, drive version control.

use serde::{Deserialize, Serialize};

/// A completed tool invocation reconstructed from streamed deltas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallResponse {
    /// Unique call ID (matches the LLM's tool_call.id); never empty.
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Raw JSON arguments text, possibly malformed
    pub arguments: String,
}

/// The uniform result of one tool execution.
///
/// `success == false` with a non-empty `error` and an empty `output` is the
/// canonical failure shape. Never infer success from `output`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,

    pub output: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error.into()),
        }
    }

    /// The text fed back to the model as the tool-result message.
    pub fn to_model_text(&self) -> String {
        if self.success {
            self.output.clone()
        } else {
            format!("Error: {}", self.error.as_deref().unwrap_or("tool failed"))
        }
    }

    /// One-line summary for the tool report written into message content.
    pub fn summary(&self) -> String {
        let text = if self.success {
            self.output.as_str()
        } else {
            self.error.as_deref().unwrap_or("tool failed")
        };
        text.lines().next().unwrap_or_default().trim().to_string()
    }
}

/// A tool definition sent to the LLM so it knows what tools it can call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}
