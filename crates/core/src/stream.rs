//! Streaming event types.
//!
//! A provider transport yields raw `SseFrame`s; the decoder in
//! `forgeloop-providers` normalizes them into `StreamEvent`s that the agent
//! loop consumes in arrival order.

use serde::{Deserialize, Serialize};

use crate::tool::ToolCallResponse;

/// One raw Server-Sent-Events frame as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SseFrame {
    /// The `event:` field, if the server sent one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,

    /// The `data:` payload, verbatim.
    pub data: String,
}

impl SseFrame {
    pub fn data(data: impl Into<String>) -> Self {
        Self {
            event: None,
            data: data.into(),
        }
    }
}

/// A normalized event from one streaming response.
///
/// Exactly one `Started` precedes all other events of a request, and exactly
/// one of `Completed` / `Error` terminates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Started,

    /// Partial assistant text.
    ContentDelta { text: String },

    /// Partial reasoning text from a dedicated reasoning channel.
    ReasoningDelta { text: String },

    /// One tool-call fragment, keyed by its delta index.
    ToolCallDelta {
        index: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        arguments: Option<String>,
    },

    /// The complete tool calls of this response, emitted once at the
    /// terminal sentinel.
    ToolCalls { calls: Vec<ToolCallResponse> },

    FinishReason { reason: String },

    Error { message: String },

    Completed,

    /// Diagnostic passthrough of every raw frame payload.
    RawFrame { raw: String },
}

impl StreamEvent {
    /// Whether this event ends the stream for the current request.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error { .. })
    }
}

/// A diagnostic sink that receives every raw frame verbatim.
///
/// Implementations must be cheap and must never fail loudly; diagnostics
/// are not allowed to affect the loop.
pub trait RawFrameSink: Send + Sync {
    fn record(&self, raw: &str);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_events() {
        assert!(StreamEvent::Completed.is_terminal());
        assert!(StreamEvent::Error { message: "x".into() }.is_terminal());
        assert!(!StreamEvent::Started.is_terminal());
        assert!(!StreamEvent::FinishReason { reason: "stop".into() }.is_terminal());
    }

    #[test]
    fn event_serialization_tag() {
        let json = serde_json::to_string(&StreamEvent::ContentDelta { text: "hi".into() }).unwrap();
        assert!(json.contains(r#""type":"content_delta""#));

        let delta = StreamEvent::ToolCallDelta {
            index: 0,
            id: None,
            name: Some("read_file".into()),
            arguments: None,
        };
        let json = serde_json::to_string(&delta).unwrap();
        assert!(!json.contains("\"id\""));
        assert!(json.contains("read_file"));
    }
}
