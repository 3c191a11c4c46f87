//! End-to-end turns against a scripted provider.

use async_trait::async_trait;
use forgeloop_agent::{
    AgentError, AgentLoop, CANCELLED_RESULT, InMemoryMessageStore, LoopSettings, StopReason,
};
use forgeloop_core::error::{ProviderError, ToolError};
use forgeloop_core::memory::MemoryBackend;
use forgeloop_core::provider::{FrameReceiver, Provider, ProviderRequest};
use forgeloop_core::{
    AgentObserver, MessageSnapshot, MessageStatus, RawFrameSink, Role, SseFrame, ToolResult,
};
use forgeloop_memory::InMemoryBackend;
use forgeloop_security::WorkspaceSandbox;
use forgeloop_tools::{ExtensionTool, LocalWorkspace, ToolDispatcher};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

enum Step {
    Frame(String),
    Fail(String),
}

#[derive(Default)]
struct Round {
    open_error: Option<String>,
    steps: Vec<Step>,
    /// Keep the stream open after the last step.
    hang: bool,
}

impl Round {
    fn frames(frames: Vec<String>) -> Self {
        Self {
            steps: frames.into_iter().map(Step::Frame).collect(),
            ..Default::default()
        }
    }
}

#[derive(Default)]
struct ScriptedProvider {
    rounds: Mutex<VecDeque<Round>>,
    /// Played whenever the script runs out.
    repeat: Option<fn() -> Round>,
    requests: Mutex<Vec<ProviderRequest>>,
    held: Mutex<Vec<mpsc::Sender<Result<SseFrame, ProviderError>>>>,
}

impl ScriptedProvider {
    fn new(rounds: Vec<Round>) -> Self {
        Self {
            rounds: Mutex::new(rounds.into()),
            ..Default::default()
        }
    }

    fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn open_stream(&self, request: ProviderRequest) -> Result<FrameReceiver, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let next = self.rounds.lock().unwrap().pop_front();
        let round = match (next, self.repeat) {
            (Some(round), _) => round,
            (None, Some(make)) => make(),
            (None, None) => Round::frames(vec![content("(script exhausted)"), done()]),
        };
        if let Some(message) = round.open_error {
            return Err(ProviderError::Network(message));
        }

        let (tx, rx) = mpsc::channel(round.steps.len() + 1);
        for step in round.steps {
            let item = match step {
                Step::Frame(data) => Ok(SseFrame::data(data)),
                Step::Fail(message) => Err(ProviderError::StreamInterrupted(message)),
            };
            tx.send(item).await.unwrap();
        }
        if round.hang {
            self.held.lock().unwrap().push(tx);
        }
        Ok(rx)
    }
}

fn content(text: &str) -> String {
    json!({"choices": [{"delta": {"content": text}}]}).to_string()
}

fn reasoning(text: &str) -> String {
    json!({"choices": [{"delta": {"reasoning_content": text}}]}).to_string()
}

fn tool_call(index: u32, id: &str, name: &str, arguments: serde_json::Value) -> String {
    json!({"choices": [{"delta": {"tool_calls": [{
        "index": index,
        "id": id,
        "function": {"name": name, "arguments": arguments.to_string()}
    }]}}]})
    .to_string()
}

fn finish(reason: &str) -> String {
    json!({"choices": [{"delta": {}, "finish_reason": reason}]}).to_string()
}

fn done() -> String {
    "[DONE]".to_string()
}

fn answer(text: &str) -> Round {
    Round::frames(vec![content(text), finish("stop"), done()])
}

fn calls(list: Vec<(&str, &str, serde_json::Value)>) -> Round {
    let mut frames: Vec<String> = list
        .into_iter()
        .enumerate()
        .map(|(i, (id, name, args))| tool_call(i as u32, id, name, args))
        .collect();
    frames.push(finish("tool_calls"));
    frames.push(done());
    Round::frames(frames)
}

#[derive(Default)]
struct RecordingObserver {
    snapshots: Mutex<Vec<MessageSnapshot>>,
}

impl AgentObserver for RecordingObserver {
    fn on_snapshot(&self, snapshot: &MessageSnapshot) {
        self.snapshots.lock().unwrap().push(snapshot.clone());
    }
}

#[derive(Default)]
struct RecordingSink(Mutex<Vec<String>>);

impl RawFrameSink for RecordingSink {
    fn record(&self, raw: &str) {
        self.0.lock().unwrap().push(raw.to_string());
    }
}

struct SlowTool;

#[async_trait]
impl ExtensionTool for SlowTool {
    fn name(&self) -> &str {
        "slow_tool"
    }

    fn description(&self) -> &str {
        "Takes a long time"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(ToolResult::ok("finally"))
    }
}

struct Harness {
    dir: TempDir,
    provider: Arc<ScriptedProvider>,
    observer: Arc<RecordingObserver>,
    store: Arc<InMemoryMessageStore>,
    agent: AgentLoop,
}

fn settings() -> LoopSettings {
    let mut settings = LoopSettings::new("test-model");
    settings.max_iterations = 5;
    settings.redisplay_interval = Duration::from_millis(10);
    settings
}

fn harness_with(
    provider: ScriptedProvider,
    settings: LoopSettings,
    configure: impl FnOnce(ToolDispatcher) -> ToolDispatcher,
) -> Harness {
    let dir = TempDir::new().unwrap();
    let sandbox = WorkspaceSandbox::new(dir.path(), &[]);
    let workspace = Arc::new(LocalWorkspace::new(sandbox.clone()));
    let dispatcher = Arc::new(configure(ToolDispatcher::new(workspace, sandbox)));
    let provider = Arc::new(provider);
    let observer = Arc::new(RecordingObserver::default());
    let store = Arc::new(InMemoryMessageStore::new());
    let agent = AgentLoop::new(provider.clone(), dispatcher, settings)
        .with_observer(observer.clone())
        .with_store(store.clone());
    Harness {
        dir,
        provider,
        observer,
        store,
        agent,
    }
}

fn harness(rounds: Vec<Round>) -> Harness {
    harness_with(ScriptedProvider::new(rounds), settings(), |d| d)
}

#[tokio::test]
async fn plain_answer_is_finalized_and_persisted() {
    let h = harness(vec![Round::frames(vec![
        content("Hello"),
        content(" world"),
        finish("stop"),
        done(),
    ])]);

    let outcome = h.agent.run_turn("hi").await.unwrap();
    assert_eq!(outcome.reason, StopReason::Answered);
    assert_eq!(outcome.iterations, 1);

    let message = outcome.message.unwrap();
    assert_eq!(message.content, "Hello world");
    assert_eq!(message.status, MessageStatus::Sent);

    let stored = h.store.messages(h.agent.conversation_id()).await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, message.id);

    let history = h.agent.history().await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[1].content, "Hello world");

    let snapshots = h.observer.snapshots.lock().unwrap();
    let last = snapshots.last().unwrap();
    assert_eq!(last.status, MessageStatus::Sent);
    assert_eq!(last.content, "Hello world");
}

#[tokio::test]
async fn requests_carry_system_prompt_and_tools() {
    let h = harness(vec![answer("ok")]);
    h.agent.run_turn("hi").await.unwrap();

    let requests = h.provider.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].model, "test-model");
    assert_eq!(requests[0].messages[0].role, Role::System);
    assert_eq!(requests[0].messages[1].content, "hi");
    assert!(requests[0].tools.iter().any(|t| t.name == "read_file"));
    assert!(requests[0].tools.iter().any(|t| t.name == "finish_task"));
}

#[tokio::test]
async fn tool_round_then_answer() {
    let h = harness(vec![
        calls(vec![(
            "call_1",
            "write_file",
            json!({"path": "notes.txt", "content": "hi\n"}),
        )]),
        answer("Done."),
    ]);

    let outcome = h.agent.run_turn("write a note").await.unwrap();
    assert_eq!(outcome.reason, StopReason::Answered);
    assert_eq!(outcome.iterations, 2);

    let written = std::fs::read_to_string(h.dir.path().join("notes.txt")).unwrap();
    assert_eq!(written, "hi\n");

    let message = outcome.message.unwrap();
    assert!(message.content.starts_with("🔧 **write_file** ✅"));
    assert!(message.content.ends_with("\n\nDone."));

    let history = h.agent.history().await;
    let roles: Vec<Role> = history.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        [Role::User, Role::Assistant, Role::Tool, Role::Assistant]
    );
    assert_eq!(history[1].tool_calls[0].id, "call_1");
    assert_eq!(history[2].tool_call_id.as_deref(), Some("call_1"));

    // The second request sees the tool result.
    let second = &h.provider.requests()[1];
    assert!(second.messages.iter().any(|m| m.role == Role::Tool));
}

#[tokio::test]
async fn failed_tool_is_reported_and_loop_continues() {
    let h = harness(vec![
        calls(vec![("call_1", "read_file", json!({"path": "missing.txt"}))]),
        answer("That file does not exist."),
    ]);

    let outcome = h.agent.run_turn("read it").await.unwrap();
    assert_eq!(outcome.reason, StopReason::Answered);
    let message = outcome.message.unwrap();
    assert!(message.content.starts_with("🔧 **read_file** ❌"));

    let history = h.agent.history().await;
    assert_eq!(history[2].role, Role::Tool);
    assert!(!history[2].content.is_empty());
}

#[tokio::test]
async fn finish_task_ends_the_turn() {
    let h = harness(vec![
        calls(vec![("call_1", "finish_task", json!({"summary": "all done"}))]),
        answer("never requested"),
    ]);

    let outcome = h.agent.run_turn("do it").await.unwrap();
    assert_eq!(outcome.reason, StopReason::TaskCompleted);
    assert_eq!(h.provider.requests().len(), 1);
    assert!(outcome.message.unwrap().content.contains("**finish_task** ✅"));
}

#[tokio::test]
async fn finish_task_after_a_write_in_the_same_round() {
    let h = harness(vec![
        calls(vec![
            ("call_1", "write_file", json!({"path": "x.txt", "content": "x"})),
            ("call_2", "finish_task", json!({"summary": "wrote x"})),
        ]),
        answer("never requested"),
    ]);

    let outcome = h.agent.run_turn("write x then stop").await.unwrap();
    assert_eq!(outcome.reason, StopReason::TaskCompleted);
    assert_eq!(outcome.iterations, 1);
    assert_eq!(h.provider.requests().len(), 1);
    assert_eq!(
        std::fs::read_to_string(h.dir.path().join("x.txt")).unwrap(),
        "x"
    );

    let message = outcome.message.unwrap();
    assert!(message.content.contains("**write_file** ✅"));
    assert!(message.content.contains("**finish_task** ✅"));

    let history = h.agent.history().await;
    let results: Vec<Option<&str>> = history
        .iter()
        .filter(|m| m.role == Role::Tool)
        .map(|m| m.tool_call_id.as_deref())
        .collect();
    assert_eq!(results, [Some("call_1"), Some("call_2")]);
}

#[tokio::test]
async fn ask_question_waits_for_the_user() {
    let h = harness(vec![calls(vec![(
        "call_1",
        "ask_question",
        json!({"question": "Which branch?"}),
    )])]);

    let outcome = h.agent.run_turn("deploy").await.unwrap();
    assert_eq!(outcome.reason, StopReason::AwaitingUser);
    assert_eq!(h.provider.requests().len(), 1);
}

#[tokio::test]
async fn iteration_limit_stops_the_loop() {
    let mut provider = ScriptedProvider::new(vec![]);
    provider.repeat = Some(|| calls(vec![("call_x", "list_files", json!({}))]));
    let mut settings = settings();
    settings.max_iterations = 3;
    let h = harness_with(provider, settings, |d| d);

    let outcome = h.agent.run_turn("loop forever").await.unwrap();
    assert_eq!(outcome.reason, StopReason::IterationLimit);
    assert_eq!(outcome.iterations, 3);
    assert_eq!(h.provider.requests().len(), 3);
    assert!(
        outcome
            .message
            .unwrap()
            .content
            .contains("Stopped after 3 iterations")
    );
}

#[tokio::test]
async fn open_failure_finalizes_with_error() {
    let h = harness(vec![Round {
        open_error: Some("connection refused".into()),
        ..Default::default()
    }]);

    let outcome = h.agent.run_turn("hi").await.unwrap();
    assert!(matches!(outcome.reason, StopReason::Failed(_)));
    let message = outcome.message.unwrap();
    assert_eq!(message.status, MessageStatus::Error);
    assert!(message.content.contains("**Error:** network error: connection refused"));
    assert_eq!(h.store.len().await, 1);
}

#[tokio::test]
async fn mid_stream_failure_keeps_partial_content() {
    let h = harness(vec![Round {
        steps: vec![
            Step::Frame(content("Partial")),
            Step::Fail("reset by peer".into()),
        ],
        ..Default::default()
    }]);

    let outcome = h.agent.run_turn("hi").await.unwrap();
    let message = outcome.message.unwrap();
    assert_eq!(message.status, MessageStatus::Error);
    assert!(message.content.starts_with("Partial\n\n**Error:**"));
}

#[tokio::test]
async fn reasoning_channel_becomes_a_section() {
    let h = harness(vec![Round::frames(vec![
        reasoning("weighing"),
        content("Answer"),
        done(),
    ])]);

    let outcome = h.agent.run_turn("hi").await.unwrap();
    assert_eq!(
        outcome.message.unwrap().content,
        "<reasoning>weighing</reasoning>\n\nAnswer"
    );
    // Reasoning is display-only; history keeps the answer.
    assert_eq!(h.agent.history().await[1].content, "Answer");
}

#[tokio::test]
async fn raw_frames_reach_the_sink() {
    let sink = Arc::new(RecordingSink::default());
    let mut h = harness(vec![answer("ok")]);
    h.agent = h.agent.with_raw_sink(sink.clone());

    h.agent.run_turn("hi").await.unwrap();
    let raw = sink.0.lock().unwrap();
    assert_eq!(raw.len(), 3);
    assert_eq!(raw[2], "[DONE]");
}

#[tokio::test]
async fn cancel_during_tool_skips_the_rest() {
    let h = harness_with(
        ScriptedProvider::new(vec![calls(vec![
            ("call_1", "slow_tool", json!({})),
            ("call_2", "list_files", json!({})),
        ])]),
        settings(),
        |d| d.with_extension(Box::new(SlowTool)),
    );

    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let outcome = h.agent.run_turn_with("go", token).await.unwrap();
    assert_eq!(outcome.reason, StopReason::Cancelled);
    assert_eq!(h.provider.requests().len(), 1);

    let message = outcome.message.unwrap();
    assert!(message.content.contains("**slow_tool** ❌ cancelled by user"));
    assert!(message.content.ends_with("_Stopped by user._"));

    let history = h.agent.history().await;
    let results: Vec<&str> = history
        .iter()
        .filter(|m| m.role == Role::Tool)
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(results, [CANCELLED_RESULT, CANCELLED_RESULT]);
    assert!(!h.agent.is_busy());
}

#[tokio::test]
async fn cancelled_turn_without_content_is_discarded() {
    let h = harness(vec![Round {
        hang: true,
        ..Default::default()
    }]);

    let (outcome, cancelled) = tokio::join!(h.agent.run_turn("hi"), async {
        tokio::time::sleep(Duration::from_millis(30)).await;
        h.agent.cancel()
    });
    assert!(cancelled);

    let outcome = outcome.unwrap();
    assert_eq!(outcome.reason, StopReason::Cancelled);
    assert!(outcome.message.is_none());
    assert!(h.store.is_empty().await);
}

#[tokio::test]
async fn cancel_wins_over_a_queued_stream_error() {
    let h = harness(vec![Round {
        steps: vec![Step::Frame(content("Partial"))],
        hang: true,
        ..Default::default()
    }]);

    let (outcome, cancelled) = tokio::join!(h.agent.run_turn("hi"), async {
        tokio::time::sleep(Duration::from_millis(30)).await;
        let tx = h.provider.held.lock().unwrap()[0].clone();
        tx.try_send(Err(ProviderError::StreamInterrupted("reset by peer".into())))
            .unwrap();
        h.agent.cancel()
    });
    assert!(cancelled);

    let outcome = outcome.unwrap();
    assert_eq!(outcome.reason, StopReason::Cancelled);
    let message = outcome.message.unwrap();
    assert_eq!(message.status, MessageStatus::Sent);
    assert!(message.content.starts_with("Partial"));
    assert!(message.content.ends_with("_Stopped by user._"));
    assert!(!message.content.contains("**Error:**"));
}

#[tokio::test]
async fn second_turn_is_refused_while_busy() {
    let h = harness(vec![Round {
        hang: true,
        ..Default::default()
    }]);

    let (first, second) = tokio::join!(h.agent.run_turn("first"), async {
        tokio::time::sleep(Duration::from_millis(30)).await;
        let second = h.agent.run_turn("second").await;
        h.agent.cancel();
        second
    });

    assert!(matches!(second, Err(AgentError::Busy)));
    assert_eq!(first.unwrap().reason, StopReason::Cancelled);
}

#[tokio::test]
async fn empty_message_is_rejected() {
    let h = harness(vec![]);
    assert!(matches!(
        h.agent.run_turn("   ").await,
        Err(AgentError::EmptyMessage)
    ));
    assert!(h.provider.requests().is_empty());
}

#[tokio::test]
async fn writes_are_learned_in_the_background() {
    let memory = Arc::new(InMemoryBackend::new());
    let mut settings = settings();
    settings.learn_from_writes = true;
    let backend = memory.clone();
    let h = harness_with(
        ScriptedProvider::new(vec![
            calls(vec![(
                "call_1",
                "create_file",
                json!({"path": "src/main.rs", "content": "fn main() {}\n"}),
            )]),
            answer("Created."),
        ]),
        settings,
        move |d| d.with_memory(backend),
    );

    h.agent.run_turn("scaffold").await.unwrap();

    let mut count = 0;
    for _ in 0..50 {
        count = memory.count().await.unwrap();
        if count > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(count, 1);
    let saved = memory.list(10).await.unwrap();
    assert!(saved[0].content.starts_with("Changed src/main.rs"));
    assert!(saved[0].tags.contains(&"learned".to_string()));
}

#[tokio::test]
async fn reset_clears_history() {
    let h = harness(vec![answer("one")]);
    h.agent.run_turn("hi").await.unwrap();
    assert_eq!(h.agent.history().await.len(), 2);

    h.agent.reset().await.unwrap();
    assert!(h.agent.history().await.is_empty());
}
