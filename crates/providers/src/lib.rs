//! LLM transport and stream decoding for Forgeloop.
//!
//! The transport (`openai_compat`) hands back raw SSE frames; `sse` decodes
//! them into `StreamEvent`s and `accumulator` reassembles tool calls.

pub mod accumulator;
pub mod openai_compat;
pub mod raw_log;
pub mod sse;

pub use accumulator::ToolCallAccumulator;
pub use openai_compat::OpenAiCompatProvider;
pub use raw_log::FileRawLog;
pub use sse::{SseLineParser, StreamEventDecoder};
