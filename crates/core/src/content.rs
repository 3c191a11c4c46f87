//! Typed content blocks produced by segmenting assistant text.

use serde::{Deserialize, Serialize};

/// Status of a tool report, as written in message content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Running,
    Success,
    Error,
}

/// A tool report rendered as its own block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallBlock {
    pub name: String,
    pub status: ToolStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default)]
    pub additions: usize,
    #[serde(default)]
    pub deletions: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_content: Option<String>,
    #[serde(default)]
    pub is_active: bool,
}

/// One typed piece of assistant content.
///
/// `is_active` marks the block still being written; at most one block of a
/// sequence is active, and only the last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Code {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
        is_active: bool,
    },
    Thinking {
        text: String,
        is_active: bool,
    },
    Reasoning {
        text: String,
        is_active: bool,
    },
    ToolCall(ToolCallBlock),
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn is_active(&self) -> bool {
        match self {
            Self::Text { .. } => false,
            Self::Code { is_active, .. }
            | Self::Thinking { is_active, .. }
            | Self::Reasoning { is_active, .. } => *is_active,
            Self::ToolCall(block) => block.is_active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_flag_by_variant() {
        assert!(!ContentBlock::text("x").is_active());
        let code = ContentBlock::Code {
            text: "fn main() {}".into(),
            language: Some("rust".into()),
            is_active: true,
        };
        assert!(code.is_active());
    }

    #[test]
    fn block_serialization_tag() {
        let block = ContentBlock::Thinking {
            text: "hmm".into(),
            is_active: false,
        };
        let json = serde_json::to_string(&block).unwrap();
        assert!(json.contains(r#""type":"thinking""#));
    }
}
