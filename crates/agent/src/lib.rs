//! The agentic tool-calling loop.
//!
//! A turn runs **request → stream → dispatch tools → repeat**:
//!
//! 1. **Build the request** (system prompt + windowed history + tool schemas)
//! 2. **Stream** the response through the provider and the event decoder,
//!    redrawing the assistant message as it grows
//! 3. **If tool calls**: run them in order, write a report for each into the
//!    message, append the results to history, and loop back to step 1
//! 4. **Otherwise** finalize the message and persist it
//!
//! The loop also stops on `finish_task`, `ask_question`, the iteration limit,
//! a transport failure, or cancellation.

pub mod background;
pub mod context;
pub mod error;
pub mod loop_runner;
pub mod prompt;
pub mod redisplay;
pub mod sanitize;
pub mod state;
pub mod store;

pub use background::BackgroundTasks;
pub use context::HistoryWindow;
pub use error::AgentError;
pub use loop_runner::{AgentLoop, CANCELLED_RESULT, LoopSettings, TurnOutcome};
pub use prompt::system_prompt;
pub use redisplay::RedisplayThrottle;
pub use sanitize::sanitize;
pub use state::{AgentLoopState, LoopPhase, StopReason};
pub use store::InMemoryMessageStore;
