//! Provider trait: the abstraction over LLM transports.
//!
//! A provider opens one streaming request and hands back the raw SSE frames
//! on a single-consumer channel. Decoding is the agent side's job, so every
//! transport shares one normalization path.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::ProviderError;
use crate::message::Message;
use crate::stream::SseFrame;
use crate::tool::ToolDefinition;

/// Receiving half of a frame stream.
pub type FrameReceiver = mpsc::Receiver<std::result::Result<SseFrame, ProviderError>>;

/// Configuration for a provider request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "gpt-4o")
    pub model: String,

    /// The conversation messages, system prompt first
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Available tools the model can call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

fn default_temperature() -> f32 {
    0.7
}

/// The core Provider trait.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openai").
    fn name(&self) -> &str;

    /// Open a streaming request.
    ///
    /// Failures of the opening response (non-2xx, connection refused) are
    /// returned directly; failures after that arrive as `Err` items on the
    /// channel. The channel closes when the server closes the stream.
    async fn open_stream(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<FrameReceiver, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_request_defaults() {
        let req: ProviderRequest =
            serde_json::from_str(r#"{"model":"gpt-4o","messages":[]}"#).unwrap();
        assert!((req.temperature - 0.7).abs() < f32::EPSILON);
        assert!(req.tools.is_empty());
        assert!(req.max_tokens.is_none());
    }
}
