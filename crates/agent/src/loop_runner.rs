//! The agent loop: request, stream, dispatch tools, repeat.
//!
//! One turn starts from a user message and runs request rounds until the
//! model answers without tools, calls `finish_task` or `ask_question`, hits
//! the iteration limit, fails, or is cancelled. Everything the model writes
//! during the turn, tool reports included, accumulates in a single streaming
//! assistant message that is finalized and persisted at the end.

use forgeloop_config::AppConfig;
use forgeloop_content::{format_report, format_report_with_detail};
use forgeloop_core::memory::MemoryEntry;
use forgeloop_core::message::{Conversation, ConversationId, Message, MessageStatus, MessageStore};
use forgeloop_core::observer::AgentObserver;
use forgeloop_core::provider::{Provider, ProviderRequest};
use forgeloop_core::stream::{RawFrameSink, StreamEvent};
use forgeloop_core::{ToolCallResponse, ToolDefinition, ToolResult, ToolStatus};
use forgeloop_providers::StreamEventDecoder;
use forgeloop_tools::{ToolDispatcher, ToolKind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::background::BackgroundTasks;
use crate::context::HistoryWindow;
use crate::context::token::{estimate_message_tokens, estimate_tools_tokens};
use crate::error::AgentError;
use crate::redisplay::RedisplayThrottle;
use crate::sanitize::sanitize;
use crate::state::{AgentLoopState, LoopPhase, StopReason};
use crate::store::InMemoryMessageStore;

/// Tool result given to calls that never ran.
pub const CANCELLED_RESULT: &str = "cancelled by user";
const STOPPED_NOTICE: &str = "_Stopped by user._";

/// Knobs for one loop instance.
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub max_iterations: u32,
    pub redisplay_interval: Duration,
    pub background_timeout: Duration,
    pub context_window_tokens: usize,
    pub learn_from_writes: bool,
    pub system_prompt: String,
}

impl LoopSettings {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            max_iterations: 25,
            redisplay_interval: Duration::from_millis(100),
            background_timeout: Duration::from_secs(30),
            context_window_tokens: 64_000,
            learn_from_writes: false,
            system_prompt: crate::prompt::system_prompt(None, std::path::Path::new(".")),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let agent = &config.agent;
        Self {
            model: config.provider.model.clone(),
            temperature: config.provider.temperature,
            max_tokens: Some(config.provider.max_tokens),
            max_iterations: agent.max_iterations,
            redisplay_interval: Duration::from_millis(agent.redisplay_interval_ms),
            background_timeout: Duration::from_secs(agent.background_timeout_secs),
            context_window_tokens: agent.context_window_tokens,
            learn_from_writes: agent.learn_from_writes,
            system_prompt: crate::prompt::system_prompt(
                agent.system_prompt.as_deref(),
                &config.workspace_root(),
            ),
        }
    }
}

/// What a finished turn produced.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// The finalized assistant message; `None` when a cancelled turn had
    /// no content and was discarded.
    pub message: Option<Message>,
    pub reason: StopReason,
    /// Request rounds made.
    pub iterations: u32,
}

/// How one request round ended.
enum RoundEnd {
    Completed(Vec<ToolCallResponse>),
    Failed(String),
    Cancelled,
}

/// Mutable state of the turn in flight.
struct Turn {
    message: Message,
    state: AgentLoopState,
    throttle: RedisplayThrottle,
    /// Text the model wrote this round; becomes its history entry.
    round_text: String,
    in_reasoning: bool,
    /// The next write must start a new paragraph.
    needs_break: bool,
}

impl Turn {
    fn new(observer: Arc<dyn AgentObserver>, interval: Duration) -> Self {
        Self {
            message: Message::streaming_assistant(),
            state: AgentLoopState::new(),
            throttle: RedisplayThrottle::new(observer, interval),
            round_text: String::new(),
            in_reasoning: false,
            needs_break: false,
        }
    }

    fn redraw(&mut self) {
        self.throttle.update(&self.message, self.state.iteration);
    }

    fn paragraph_break(&mut self) {
        let content = &self.message.content;
        let sep = if content.is_empty() || content.ends_with("\n\n") {
            ""
        } else if content.ends_with('\n') {
            "\n"
        } else {
            "\n\n"
        };
        self.message.append(sep);
        self.needs_break = false;
    }

    fn push_content(&mut self, text: &str) {
        self.close_reasoning();
        if self.needs_break {
            self.paragraph_break();
        }
        self.message.append(text);
        self.round_text.push_str(text);
    }

    fn push_reasoning(&mut self, text: &str) {
        if !self.in_reasoning {
            self.paragraph_break();
            self.message.append("<reasoning>");
            self.in_reasoning = true;
        }
        self.message.append(text);
    }

    fn close_reasoning(&mut self) {
        if self.in_reasoning {
            self.message.append("</reasoning>");
            self.in_reasoning = false;
            self.needs_break = true;
        }
    }

    /// Write a standalone paragraph (notices, errors).
    fn write_block(&mut self, text: &str) {
        self.close_reasoning();
        self.paragraph_break();
        self.message.append(text);
        self.needs_break = true;
    }

    /// Write a running report for `name`; returns where it starts.
    fn begin_report(&mut self, name: &str) -> usize {
        self.close_reasoning();
        self.paragraph_break();
        let start = self.message.content.len();
        self.message
            .append(&format_report(name, ToolStatus::Running, ""));
        self.needs_break = true;
        start
    }

    /// Replace the report starting at `start` with its final form.
    fn finish_report(&mut self, start: usize, name: &str, summary: &str, result: &ToolResult) {
        let status = if result.success {
            ToolStatus::Success
        } else {
            ToolStatus::Error
        };
        let mut content = self.message.content[..start].to_string();
        content.push_str(&format_report_with_detail(
            name,
            status,
            summary,
            &report_detail(result),
        ));
        self.message.set_content(content);
        self.needs_break = true;
    }
}

/// Diffs produced by edit tools are shown under the report header.
fn report_detail(result: &ToolResult) -> String {
    if !result.success {
        return String::new();
    }
    match result.output.find("```diff") {
        Some(at) => result.output[at..].to_string(),
        None => String::new(),
    }
}

fn argument_str(arguments: &str, key: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(arguments).ok()?;
    value.get(key)?.as_str().map(str::to_string)
}

/// One-line summary for a tool report.
fn report_summary(call: &ToolCallResponse, result: &ToolResult) -> String {
    if result.success && call.name == ToolKind::ReadFile.name() {
        let lines = result.output.lines().count();
        return match argument_str(&call.arguments, "path") {
            Some(path) => format!("Read {path} ({lines} lines)"),
            None => format!("Read {lines} lines"),
        };
    }
    let summary = result.summary();
    if summary.chars().count() > 160 {
        let cut: String = summary.chars().take(160).collect();
        format!("{cut}…")
    } else {
        summary
    }
}

struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, AgentError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| AgentError::Busy)?;
        Ok(Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// The core agent loop that orchestrates LLM calls and tool execution.
pub struct AgentLoop {
    provider: Arc<dyn Provider>,
    dispatcher: Arc<ToolDispatcher>,
    observer: Arc<dyn AgentObserver>,
    store: Arc<dyn MessageStore>,
    raw_sink: Option<Arc<dyn RawFrameSink>>,
    settings: LoopSettings,
    window: HistoryWindow,
    conversation: tokio::sync::Mutex<Conversation>,
    conversation_id: ConversationId,
    busy: AtomicBool,
    current_cancel: Mutex<Option<CancellationToken>>,
    background: BackgroundTasks,
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn Provider>,
        dispatcher: Arc<ToolDispatcher>,
        settings: LoopSettings,
    ) -> Self {
        let conversation = Conversation::new();
        Self {
            provider,
            dispatcher,
            observer: Arc::new(forgeloop_core::NoopObserver),
            store: Arc::new(InMemoryMessageStore::new()),
            raw_sink: None,
            window: HistoryWindow::new(settings.context_window_tokens),
            background: BackgroundTasks::new(settings.background_timeout),
            settings,
            conversation_id: conversation.id.clone(),
            conversation: tokio::sync::Mutex::new(conversation),
            busy: AtomicBool::new(false),
            current_cancel: Mutex::new(None),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn AgentObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn MessageStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_raw_sink(mut self, sink: Arc<dyn RawFrameSink>) -> Self {
        self.raw_sink = Some(sink);
        self
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    pub fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// A copy of the conversation history sent to the model.
    pub async fn history(&self) -> Vec<Message> {
        self.conversation.lock().await.messages.clone()
    }

    /// Forget the conversation and the todo list. Refused mid-turn.
    pub async fn reset(&self) -> Result<(), AgentError> {
        let _busy = BusyGuard::acquire(&self.busy)?;
        self.conversation.lock().await.messages.clear();
        self.dispatcher.todos().clear();
        Ok(())
    }

    /// Cancel the turn in flight, if any. Returns whether one was running.
    pub fn cancel(&self) -> bool {
        match lock(&self.current_cancel).as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Stop background work. Call once, at exit.
    pub async fn shutdown(&self) {
        self.background.shutdown().await;
    }

    /// Run one user turn; cancellable through [`AgentLoop::cancel`].
    pub async fn run_turn(&self, user_text: &str) -> Result<TurnOutcome, AgentError> {
        self.run_turn_with(user_text, CancellationToken::new()).await
    }

    /// Run one user turn under an external cancellation token.
    pub async fn run_turn_with(
        &self,
        user_text: &str,
        cancel: CancellationToken,
    ) -> Result<TurnOutcome, AgentError> {
        let text = user_text.trim();
        if text.is_empty() {
            return Err(AgentError::EmptyMessage);
        }
        let _busy = BusyGuard::acquire(&self.busy)?;
        *lock(&self.current_cancel) = Some(cancel.clone());

        let mut conversation = self.conversation.lock().await;
        conversation.push(Message::user(text));
        info!(
            conversation_id = %self.conversation_id,
            messages = conversation.messages.len(),
            "Starting turn"
        );

        let mut turn = Turn::new(self.observer.clone(), self.settings.redisplay_interval);
        turn.state.begin_turn();
        let definitions = self.dispatcher.definitions();

        let reason = self
            .drive(&mut conversation, &mut turn, &definitions, &cancel)
            .await;
        let outcome = self.finalize(&mut conversation, turn, reason).await;

        *lock(&self.current_cancel) = None;
        info!(
            conversation_id = %self.conversation_id,
            reason = ?outcome.reason,
            iterations = outcome.iterations,
            "Turn finished"
        );
        Ok(outcome)
    }

    async fn drive(
        &self,
        conversation: &mut Conversation,
        turn: &mut Turn,
        definitions: &[ToolDefinition],
        cancel: &CancellationToken,
    ) -> StopReason {
        loop {
            if cancel.is_cancelled() {
                return StopReason::Cancelled;
            }
            if turn.state.iteration >= self.settings.max_iterations {
                warn!(
                    iterations = turn.state.iteration,
                    "Max tool iterations reached, stopping turn"
                );
                turn.write_block(&format!(
                    "_Stopped after {} iterations: the tool-call limit for one request was reached._",
                    self.settings.max_iterations
                ));
                return StopReason::IterationLimit;
            }

            turn.state.iteration += 1;
            let request = self.build_request(conversation, definitions);
            turn.state.enter(LoopPhase::Streaming);
            debug!(iteration = turn.state.iteration, "Agent loop iteration");

            let calls = match self.stream_round(request, turn, cancel).await {
                RoundEnd::Completed(calls) => calls,
                RoundEnd::Cancelled => return StopReason::Cancelled,
                RoundEnd::Failed(message) => {
                    if cancel.is_cancelled() {
                        return StopReason::Cancelled;
                    }
                    turn.write_block(&format!("**Error:** {message}"));
                    return StopReason::Failed(message);
                }
            };
            if calls.is_empty() {
                return StopReason::Answered;
            }

            turn.state.enter(LoopPhase::ToolExecuting);
            debug!(tool_count = calls.len(), "Executing tool calls");
            let round_text = std::mem::take(&mut turn.round_text);
            conversation.push(Message::assistant_with_tool_calls(
                round_text.trim(),
                calls.clone(),
            ));
            turn.state.pending_tool_calls = calls;
            self.execute_calls(conversation, turn, cancel).await;

            if cancel.is_cancelled() || turn.state.cancelled {
                return StopReason::Cancelled;
            }
            if !turn.state.should_continue() {
                return if turn.state.task_completed {
                    StopReason::TaskCompleted
                } else {
                    StopReason::AwaitingUser
                };
            }
            turn.state.enter(LoopPhase::Requesting);
        }
    }

    fn build_request(
        &self,
        conversation: &Conversation,
        definitions: &[ToolDefinition],
    ) -> ProviderRequest {
        let system = Message::system(&self.settings.system_prompt);
        let reserved = estimate_message_tokens(&system) + estimate_tools_tokens(definitions);
        let mut messages = vec![system];
        messages.extend(self.window.select(&conversation.messages, reserved));
        ProviderRequest {
            model: self.settings.model.clone(),
            messages,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            tools: definitions.to_vec(),
        }
    }

    async fn stream_round(
        &self,
        request: ProviderRequest,
        turn: &mut Turn,
        cancel: &CancellationToken,
    ) -> RoundEnd {
        let mut decoder = StreamEventDecoder::new();
        let mut calls = Vec::new();
        let mut failure = None;
        for event in decoder.start() {
            self.apply_event(event, turn, &mut calls, &mut failure);
        }

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => return RoundEnd::Cancelled,
            opened = self.provider.open_stream(request) => opened,
        };

        match opened {
            Err(e) => {
                warn!(provider = self.provider.name(), error = %e, "Failed to open stream");
                for event in decoder.fail(&e) {
                    self.apply_event(event, turn, &mut calls, &mut failure);
                }
            }
            Ok(mut frames) => {
                while !decoder.is_terminated() {
                    let next = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return RoundEnd::Cancelled,
                        next = frames.recv() => next,
                    };
                    let events = match next {
                        Some(Ok(frame)) => decoder.decode(&frame),
                        Some(Err(e)) => decoder.fail(&e),
                        None => decoder.finish(),
                    };
                    for event in events {
                        if cancel.is_cancelled() {
                            return RoundEnd::Cancelled;
                        }
                        self.apply_event(event, turn, &mut calls, &mut failure);
                    }
                }
            }
        }

        turn.close_reasoning();
        match failure {
            Some(message) => RoundEnd::Failed(message),
            None => RoundEnd::Completed(calls),
        }
    }

    fn apply_event(
        &self,
        event: StreamEvent,
        turn: &mut Turn,
        calls: &mut Vec<ToolCallResponse>,
        failure: &mut Option<String>,
    ) {
        match event {
            StreamEvent::Started => trace!("Stream started"),
            StreamEvent::ContentDelta { text } => {
                turn.push_content(&text);
                turn.redraw();
            }
            StreamEvent::ReasoningDelta { text } => {
                turn.push_reasoning(&text);
                turn.redraw();
            }
            StreamEvent::ToolCallDelta { index, name, .. } => {
                trace!(index, name = ?name, "Tool call delta");
            }
            StreamEvent::ToolCalls { calls: batch } => calls.extend(batch),
            StreamEvent::FinishReason { reason } => debug!(%reason, "Finish reason"),
            StreamEvent::Error { message } => *failure = Some(message),
            StreamEvent::Completed => trace!("Stream completed"),
            StreamEvent::RawFrame { raw } => {
                if let Some(sink) = &self.raw_sink {
                    sink.record(&raw);
                }
            }
        }
    }

    /// Run the round's tool calls in order. Every call gets a tool result,
    /// including calls skipped after cancellation.
    async fn execute_calls(
        &self,
        conversation: &mut Conversation,
        turn: &mut Turn,
        cancel: &CancellationToken,
    ) {
        let calls = std::mem::take(&mut turn.state.pending_tool_calls);
        for call in calls {
            if cancel.is_cancelled() {
                conversation.push(Message::tool_result(&call.id, CANCELLED_RESULT));
                continue;
            }

            let report_start = turn.begin_report(&call.name);
            turn.redraw();

            let executed = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                result = self.dispatcher.execute(&call.name, &call.arguments) => Some(result),
            };
            let Some(result) = executed else {
                turn.state.enter(LoopPhase::Cancelled);
                let result = ToolResult::failure(CANCELLED_RESULT);
                turn.finish_report(report_start, &call.name, CANCELLED_RESULT, &result);
                conversation.push(Message::tool_result(&call.id, CANCELLED_RESULT));
                continue;
            };

            let summary = report_summary(&call, &result);
            turn.finish_report(report_start, &call.name, &summary, &result);
            conversation.push(Message::tool_result(&call.id, result.to_model_text()));

            if call.name == ToolKind::FinishTask.name() {
                turn.state.task_completed = true;
            } else if call.name == ToolKind::AskQuestion.name() {
                turn.state.awaiting_user = true;
            }
            if result.success {
                self.learn_from(&call, &result);
            }
            turn.redraw();
        }
    }

    /// Save a short note about a successful write, off the turn's path.
    fn learn_from(&self, call: &ToolCallResponse, result: &ToolResult) {
        if !self.settings.learn_from_writes {
            return;
        }
        if !matches!(
            ToolKind::from_name(&call.name),
            Some(ToolKind::WriteFile | ToolKind::CreateFile | ToolKind::SearchReplace)
        ) {
            return;
        }
        let Some(memory) = self.dispatcher.memory().cloned() else {
            return;
        };
        let Some(path) = argument_str(&call.arguments, "path") else {
            return;
        };
        let note = format!("Changed {path}: {}", result.summary());
        self.background.spawn("learn_from_write", async move {
            memory
                .store(MemoryEntry::new(note, vec!["workspace".into(), "learned".into()]))
                .await
                .map(|_| ())
        });
    }

    async fn finalize(
        &self,
        conversation: &mut Conversation,
        mut turn: Turn,
        reason: StopReason,
    ) -> TurnOutcome {
        turn.close_reasoning();
        let cancelled = reason == StopReason::Cancelled;
        if cancelled {
            turn.state.enter(LoopPhase::Cancelled);
            turn.throttle.cancel();
        }
        turn.state.enter(LoopPhase::Finalizing);
        let iterations = turn.state.iteration;

        if cancelled && turn.message.content.trim().is_empty() {
            debug!("Cancelled turn produced no content; discarding it");
            turn.state.enter(LoopPhase::Idle);
            return TurnOutcome {
                message: None,
                reason,
                iterations,
            };
        }
        if cancelled {
            turn.write_block(STOPPED_NOTICE);
        }

        let status = match reason {
            StopReason::Failed(_) => MessageStatus::Error,
            _ => MessageStatus::Sent,
        };
        let content = sanitize(&turn.message.content);
        turn.message.set_content(content);
        turn.message.finalize(status);

        if let Err(e) = self.store.persist(&self.conversation_id, &turn.message).await {
            warn!(message_id = %turn.message.id, error = %e, "Failed to persist message");
        }

        let round_text = turn.round_text.trim();
        if !round_text.is_empty() {
            let text = if cancelled {
                format!("{round_text}\n\n({CANCELLED_RESULT})")
            } else {
                round_text.to_string()
            };
            conversation.push(Message::assistant(text));
        }

        turn.throttle.flush(&turn.message, iterations);
        turn.state.enter(LoopPhase::Idle);
        TurnOutcome {
            message: Some(turn.message),
            reason,
            iterations,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
