//! Server-Sent-Events framing and stream event decoding.
//!
//! `SseLineParser` turns the raw byte stream into `SseFrame`s;
//! `StreamEventDecoder` turns frames into normalized `StreamEvent`s.

use forgeloop_core::error::ProviderError;
use forgeloop_core::{SseFrame, StreamEvent};
use serde::Deserialize;
use tracing::{trace, warn};

use crate::accumulator::ToolCallAccumulator;

/// The terminal sentinel payload.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Incremental line splitter for an SSE body.
///
/// Buffers raw bytes and decodes only whole lines, so a multi-byte
/// character split across chunks survives intact. Handles `\r\n` line
/// endings. Comment lines (`:`) and fields other than `event`/`data` are
/// ignored.
#[derive(Debug, Default)]
pub struct SseLineParser {
    buffer: Vec<u8>,
    event: Option<String>,
}

impl SseLineParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk of the body; returns every frame it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();

        // `\n` never occurs inside a UTF-8 sequence.
        while let Some(line_end) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=line_end).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(frame) = self.take_line(line) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flush a final line that arrived without a trailing newline.
    pub fn finish(&mut self) -> Option<SseFrame> {
        let rest = std::mem::take(&mut self.buffer);
        let rest = String::from_utf8_lossy(&rest);
        let line = rest.trim_end_matches('\r');
        if line.is_empty() {
            return None;
        }
        self.take_line(line)
    }

    fn take_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            // Blank line ends an SSE event; the event name does not carry over.
            self.event = None;
            return None;
        }
        if line.starts_with(':') {
            return None;
        }
        if let Some(name) = field(line, "event") {
            self.event = Some(name.to_string());
            return None;
        }
        field(line, "data").map(|data| SseFrame {
            event: self.event.clone(),
            data: data.to_string(),
        })
    }
}

fn field<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let value = line.strip_prefix(name)?.strip_prefix(':')?;
    Some(value.strip_prefix(' ').unwrap_or(value))
}

/// Normalizes one streaming response into `StreamEvent`s.
///
/// One decoder per request. `start` emits `Started`; `decode` handles each
/// frame; `fail` and `finish` end the stream on transport failure or close.
/// After a terminal event every call returns nothing.
#[derive(Debug, Default)]
pub struct StreamEventDecoder {
    tool_calls: ToolCallAccumulator,
    started: bool,
    saw_finish_reason: bool,
    terminated: bool,
}

impl StreamEventDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn start(&mut self) -> Vec<StreamEvent> {
        if self.started || self.terminated {
            return Vec::new();
        }
        self.started = true;
        vec![StreamEvent::Started]
    }

    /// Decode one frame. The raw payload is always echoed first as
    /// `RawFrame`, whether or not it parses.
    pub fn decode(&mut self, frame: &SseFrame) -> Vec<StreamEvent> {
        if self.terminated {
            return Vec::new();
        }
        let mut events = self.start();
        events.push(StreamEvent::RawFrame {
            raw: frame.data.clone(),
        });

        let data = frame.data.trim();
        if data == DONE_SENTINEL {
            self.complete(&mut events);
            return events;
        }
        if data.is_empty() {
            return events;
        }

        let chunk: StreamChunk = match serde_json::from_str(data) {
            Ok(chunk) => chunk,
            Err(e) => {
                trace!(error = %e, data, "Ignoring unparseable stream chunk");
                return events;
            }
        };

        if let Some(error) = chunk.error {
            // In-band error objects are payload, not transport failures.
            let detail = error.message.unwrap_or_default();
            warn!(detail = %detail, "Provider sent an in-band error chunk");
        }

        let Some(choice) = chunk.choices.into_iter().next() else {
            return events;
        };

        if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
            events.push(StreamEvent::ContentDelta { text });
        }
        if let Some(text) = choice
            .delta
            .reasoning_content
            .or(choice.delta.reasoning)
            .filter(|t| !t.is_empty())
        {
            events.push(StreamEvent::ReasoningDelta { text });
        }
        for delta in choice.delta.tool_calls.unwrap_or_default() {
            let (name, arguments) = match delta.function {
                Some(f) => (f.name, f.arguments),
                None => (None, None),
            };
            self.tool_calls.apply(
                delta.index,
                delta.id.as_deref(),
                name.as_deref(),
                arguments.as_deref(),
            );
            events.push(StreamEvent::ToolCallDelta {
                index: delta.index,
                id: delta.id,
                name,
                arguments,
            });
        }
        if let Some(reason) = choice.finish_reason {
            self.saw_finish_reason = true;
            events.push(StreamEvent::FinishReason { reason });
        }

        events
    }

    /// Transport failure: emit the classified `Error` and stop.
    pub fn fail(&mut self, error: &ProviderError) -> Vec<StreamEvent> {
        if self.terminated {
            return Vec::new();
        }
        let mut events = self.start();
        self.terminated = true;
        self.tool_calls.clear();
        events.push(StreamEvent::Error {
            message: error.user_message(),
        });
        events
    }

    /// The transport closed without a `[DONE]` sentinel.
    ///
    /// Tool calls count as complete only if a finish reason was seen;
    /// otherwise the partial calls are dropped.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        if self.terminated {
            return Vec::new();
        }
        let mut events = self.start();
        if !self.saw_finish_reason && !self.tool_calls.is_empty() {
            warn!(
                partial_calls = self.tool_calls.len(),
                "Stream closed before tool calls completed, discarding them"
            );
            self.tool_calls.clear();
        }
        self.complete(&mut events);
        events
    }

    fn complete(&mut self, events: &mut Vec<StreamEvent>) {
        self.terminated = true;
        if !self.tool_calls.is_empty() {
            events.push(StreamEvent::ToolCalls {
                calls: self.tool_calls.finalize(),
            });
        }
        events.push(StreamEvent::Completed);
    }
}

// --- Wire types for one `data:` chunk ---

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<ChunkError>,
}

#[derive(Debug, Deserialize)]
struct ChunkError {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<StreamToolCallDelta>>,
}

/// A tool call delta; arrives incrementally across chunks.
#[derive(Debug, Deserialize)]
struct StreamToolCallDelta {
    #[serde(default)]
    index: u32,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<StreamFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}
