//! The tool dispatcher: parse, validate, run, and report one tool call.

use forgeloop_core::error::ToolError;
use forgeloop_core::memory::MemoryBackend;
use forgeloop_core::observer::{AgentObserver, NoopObserver, QuestionReply};
use forgeloop_core::vcs::VersionControl;
use forgeloop_core::workspace::{ChangeRecorder, FileChange, Workspace};
use forgeloop_core::{TodoStatus, ToolDefinition, ToolResult};
use forgeloop_security::WorkspaceSandbox;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::args::Args;
use crate::extension::{ExtensionRegistry, ExtensionTool};
use crate::kind::{ToolFamily, ToolKind};
use crate::todo::{self, TodoList};
use crate::{file_ops, memory_ops, vcs_ops};

pub const DEFAULT_MAX_ERROR_CHARS: usize = 2_000;
const DEFAULT_RECORD_TIMEOUT: Duration = Duration::from_secs(2);
const TRUNCATION_SUFFIX: &str = "... (truncated)";

/// Executes tool calls against the workspace and its collaborators.
///
/// `execute` never fails: every error becomes a failure `ToolResult` whose
/// text is fed back to the model.
pub struct ToolDispatcher {
    workspace: Arc<dyn Workspace>,
    sandbox: WorkspaceSandbox,
    memory: Option<Arc<dyn MemoryBackend>>,
    vcs: Option<Arc<dyn VersionControl>>,
    recorder: Option<Arc<dyn ChangeRecorder>>,
    observer: Arc<dyn AgentObserver>,
    extensions: ExtensionRegistry,
    todos: TodoList,
    max_error_chars: usize,
    record_timeout: Duration,
}

impl ToolDispatcher {
    /// A dispatcher with file, search, todo, and control tools. Memory and
    /// version-control tools appear once their backends are attached.
    pub fn new(workspace: Arc<dyn Workspace>, sandbox: WorkspaceSandbox) -> Self {
        Self {
            workspace,
            sandbox,
            memory: None,
            vcs: None,
            recorder: None,
            observer: Arc::new(NoopObserver),
            extensions: ExtensionRegistry::new(),
            todos: TodoList::new(),
            max_error_chars: DEFAULT_MAX_ERROR_CHARS,
            record_timeout: DEFAULT_RECORD_TIMEOUT,
        }
    }

    pub fn with_memory(mut self, memory: Arc<dyn MemoryBackend>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn with_vcs(mut self, vcs: Arc<dyn VersionControl>) -> Self {
        self.vcs = Some(vcs);
        self
    }

    pub fn with_change_recorder(mut self, recorder: Arc<dyn ChangeRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn AgentObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_extension(mut self, tool: Box<dyn ExtensionTool>) -> Self {
        if ToolKind::from_name(tool.name()).is_some() {
            warn!(tool = tool.name(), "Extension shadows a built-in tool and will never run");
        }
        self.extensions.register(tool);
        self
    }

    pub fn with_max_error_chars(mut self, max: usize) -> Self {
        self.max_error_chars = max.max(TRUNCATION_SUFFIX.chars().count() + 1);
        self
    }

    pub fn with_record_timeout(mut self, timeout: Duration) -> Self {
        self.record_timeout = timeout;
        self
    }

    pub fn memory(&self) -> Option<&Arc<dyn MemoryBackend>> {
        self.memory.as_ref()
    }

    pub fn todos(&self) -> &TodoList {
        &self.todos
    }

    /// Whether a built-in tool's backend is attached.
    fn is_available(&self, kind: ToolKind) -> bool {
        match kind.family() {
            ToolFamily::Memory => self.memory.is_some(),
            ToolFamily::VersionControl => self.vcs.is_some(),
            _ => true,
        }
    }

    /// Schemas for every available tool: built-ins first, then extensions.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        ToolKind::ALL
            .into_iter()
            .filter(|kind| self.is_available(*kind))
            .map(ToolKind::definition)
            .chain(self.extensions.definitions())
            .collect()
    }

    /// Run one tool call. Never panics and never returns an error.
    pub async fn execute(&self, name: &str, raw_arguments: &str) -> ToolResult {
        let started = Instant::now();
        let result = match self.run(name, raw_arguments).await {
            Ok(result) => result,
            Err(e) => {
                debug!(tool = %name, error = %e, "Tool call failed");
                ToolResult::failure(truncate_chars(&e.to_string(), self.max_error_chars))
            }
        };
        debug!(
            tool = %name,
            success = result.success,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Tool executed"
        );
        result
    }

    async fn run(&self, name: &str, raw_arguments: &str) -> Result<ToolResult, ToolError> {
        let Some(kind) = ToolKind::from_name(name) else {
            let args = Args::parse(raw_arguments)?;
            return self.extensions.execute(name, args.into_value()).await;
        };

        if kind.is_control() {
            // Control signals succeed whatever the model sent.
            let args = Args::parse(raw_arguments).unwrap_or_default();
            return Ok(ToolResult::ok(self.control(kind, &args)));
        }

        let args = Args::parse(raw_arguments)?;
        crate::validate::validate(kind, &args, &self.sandbox)?;

        let output = match kind.family() {
            ToolFamily::File | ToolFamily::Search => {
                let outcome = file_ops::execute(kind, self.workspace.as_ref(), &args).await?;
                if let Some(change) = &outcome.change {
                    self.report_change(change).await;
                }
                outcome.output
            }
            ToolFamily::Memory => {
                let memory = self
                    .memory
                    .as_deref()
                    .ok_or_else(|| ToolError::Unavailable("memory is not configured".into()))?;
                memory_ops::execute(kind, memory, &args).await?
            }
            ToolFamily::VersionControl => {
                let vcs = self.vcs.as_deref().ok_or_else(|| {
                    ToolError::Unavailable("version control is not configured".into())
                })?;
                vcs_ops::execute(kind, vcs, &args).await?
            }
            ToolFamily::Todo => self.todo(kind, &args)?,
            ToolFamily::Control => self.control(kind, &args),
        };
        Ok(ToolResult::ok(output))
    }

    /// Record in the undo log (bounded, best-effort) and tell the observer.
    async fn report_change(&self, change: &FileChange) {
        if let Some(recorder) = &self.recorder {
            match tokio::time::timeout(self.record_timeout, recorder.record_change(change)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(path = %change.path, error = %e, "Failed to record file change"),
                Err(_) => warn!(path = %change.path, "Recording file change timed out"),
            }
        }
        self.observer.on_file_changed(change);
    }

    fn todo(&self, kind: ToolKind, args: &Args) -> Result<String, ToolError> {
        let parse_status = |args: &Args| -> Result<Option<TodoStatus>, ToolError> {
            match args.opt_str("status") {
                None => Ok(None),
                Some(raw) => TodoStatus::parse(raw).map(Some).ok_or_else(|| {
                    ToolError::Validation(vec![format!(
                        "'status' must be pending, in_progress, or done (got '{raw}')"
                    )])
                }),
            }
        };

        match kind {
            ToolKind::CreateTodo => {
                let content = args.str("content")?;
                let status = parse_status(args)?.unwrap_or(TodoStatus::Pending);
                let (item, all) = self.todos.create(content, status);
                self.observer.on_todos_changed(&all);
                Ok(format!("Added todo {}: {}\n{}", item.id, item.content, todo::render(&all)))
            }
            ToolKind::UpdateTodo => {
                let id = args
                    .opt_u64("id")
                    .and_then(|id| u32::try_from(id).ok())
                    .ok_or_else(|| ToolError::Validation(vec!["'id' must be a todo id".into()]))?;
                let status = parse_status(args)?;
                let content = args.opt_str("content");
                if status.is_none() && content.is_none() {
                    return Err(ToolError::Validation(vec![
                        "provide 'status' or 'content' to update".into(),
                    ]));
                }
                let (item, all) = self
                    .todos
                    .update(id, status, content)
                    .ok_or_else(|| ToolError::execution(kind.name(), format!("no todo with id {id}")))?;
                self.observer.on_todos_changed(&all);
                Ok(format!("Updated todo {}\n{}", item.id, todo::render(&all)))
            }
            _ => Ok(todo::render(&self.todos.snapshot())),
        }
    }

    fn control(&self, kind: ToolKind, args: &Args) -> String {
        match kind {
            ToolKind::AskQuestion => {
                let question = args.opt_str("question").unwrap_or_default().trim();
                match self.observer.on_question(question) {
                    QuestionReply::Pending => {
                        "Question shown to the user; waiting for their reply.".to_string()
                    }
                    QuestionReply::Answer(answer) => format!("User answered: {answer}"),
                }
            }
            _ => match args.opt_str("summary").map(str::trim).filter(|s| !s.is_empty()) {
                Some(summary) => format!("Task marked complete: {summary}"),
                None => "Task marked complete.".to_string(),
            },
        }
    }
}

/// Cut `text` to at most `max` characters, marking the cut.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(TRUNCATION_SUFFIX.chars().count());
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(TRUNCATION_SUFFIX);
    out
}
