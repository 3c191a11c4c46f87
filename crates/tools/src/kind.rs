//! The fixed table of built-in tools.
//!
//! Each tool is a `ToolKind` variant. Argument specs drive both validation
//! and the JSON schema sent to the model, so the two cannot drift apart.

use forgeloop_core::ToolDefinition;
use serde_json::{Map, Value, json};

/// Which family a tool belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolFamily {
    File,
    Search,
    Memory,
    Todo,
    Control,
    VersionControl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    ReadFile,
    WriteFile,
    CreateFile,
    DeleteFile,
    RenameFile,
    CopyFile,
    MoveFile,
    ListFiles,
    SearchReplace,
    SearchFiles,
    SaveMemory,
    RecallMemory,
    ListMemories,
    DeleteMemory,
    CreateTodo,
    UpdateTodo,
    ListTodos,
    FinishTask,
    AskQuestion,
    GitStatus,
    GitStage,
    GitCommit,
    GitPush,
    GitPull,
    GitBranch,
    GitCheckout,
    GitLog,
    GitDiff,
    GitDiscard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    String,
    Integer,
    Bool,
    StringList,
}

/// One declared argument of a tool.
#[derive(Debug, Clone, Copy)]
pub struct ArgSpec {
    pub name: &'static str,
    pub ty: ArgType,
    pub required: bool,
    /// Workspace path argument; checked for traversal and forbidden prefixes.
    pub is_path: bool,
    pub description: &'static str,
}

const fn req(name: &'static str, ty: ArgType, description: &'static str) -> ArgSpec {
    ArgSpec {
        name,
        ty,
        required: true,
        is_path: false,
        description,
    }
}

const fn opt(name: &'static str, ty: ArgType, description: &'static str) -> ArgSpec {
    ArgSpec {
        name,
        ty,
        required: false,
        is_path: false,
        description,
    }
}

const fn path(name: &'static str, required: bool, description: &'static str) -> ArgSpec {
    ArgSpec {
        name,
        ty: ArgType::String,
        required,
        is_path: true,
        description,
    }
}

const READ_FILE: &[ArgSpec] = &[
    path("path", true, "Workspace-relative file path"),
    opt("start_line", ArgType::Integer, "First line to return (1-based)"),
    opt("end_line", ArgType::Integer, "Last line to return (inclusive)"),
];
const WRITE_FILE: &[ArgSpec] = &[
    path("path", true, "Workspace-relative file path"),
    req("content", ArgType::String, "Full new file content"),
];
const CREATE_FILE: &[ArgSpec] = &[
    path("path", true, "Workspace-relative path of the new file"),
    opt("content", ArgType::String, "Initial content (empty if omitted)"),
];
const ONE_PATH: &[ArgSpec] = &[path("path", true, "Workspace-relative file path")];
const FROM_TO: &[ArgSpec] = &[
    path("from", true, "Source path"),
    path("to", true, "Destination path"),
];
const LIST_FILES: &[ArgSpec] = &[path("path", false, "Directory to list (workspace root if omitted)")];
const SEARCH_REPLACE: &[ArgSpec] = &[
    path("path", true, "File to edit"),
    req("search", ArgType::String, "Exact text to find"),
    req("replace", ArgType::String, "Replacement text"),
    opt("replace_all", ArgType::Bool, "Replace every occurrence instead of requiring a unique match"),
];
const SEARCH_FILES: &[ArgSpec] = &[
    req("query", ArgType::String, "Text to search for"),
    path("path", false, "Directory to search (workspace root if omitted)"),
    opt("case_sensitive", ArgType::Bool, "Match case exactly (default false)"),
    opt("max_results", ArgType::Integer, "Maximum matching lines to return (default 50)"),
];
const SAVE_MEMORY: &[ArgSpec] = &[
    req("content", ArgType::String, "What to remember"),
    opt("tags", ArgType::StringList, "Tags for later filtering"),
];
const RECALL_MEMORY: &[ArgSpec] = &[
    req("query", ArgType::String, "Keywords to look for"),
    opt("limit", ArgType::Integer, "Maximum results (default 10)"),
    opt("tags", ArgType::StringList, "Only memories with one of these tags"),
];
const LIST_MEMORIES: &[ArgSpec] = &[opt("limit", ArgType::Integer, "Maximum results (default 20)")];
const DELETE_MEMORY: &[ArgSpec] = &[req("id", ArgType::String, "Memory id")];
const CREATE_TODO: &[ArgSpec] = &[
    req("content", ArgType::String, "What needs doing"),
    opt("status", ArgType::String, "pending, in_progress, or done"),
];
const UPDATE_TODO: &[ArgSpec] = &[
    req("id", ArgType::Integer, "Todo id"),
    opt("status", ArgType::String, "pending, in_progress, or done"),
    opt("content", ArgType::String, "New description"),
];
const FINISH_TASK: &[ArgSpec] = &[opt("summary", ArgType::String, "What was accomplished")];
const ASK_QUESTION: &[ArgSpec] = &[opt("question", ArgType::String, "The question for the user")];
const NONE: &[ArgSpec] = &[];
const GIT_STAGE: &[ArgSpec] = &[ArgSpec {
    name: "paths",
    ty: ArgType::StringList,
    required: true,
    is_path: true,
    description: "Paths to stage (use \".\" for everything)",
}];
const GIT_COMMIT: &[ArgSpec] = &[req("message", ArgType::String, "Commit message")];
const GIT_BRANCH: &[ArgSpec] = &[opt("name", ArgType::String, "Branch to create (lists branches if omitted)")];
const GIT_CHECKOUT: &[ArgSpec] = &[
    req("branch", ArgType::String, "Branch to switch to"),
    opt("create", ArgType::Bool, "Create the branch first"),
];
const GIT_LOG: &[ArgSpec] = &[opt("limit", ArgType::Integer, "Number of commits (default 10)")];
const GIT_DIFF: &[ArgSpec] = &[
    path("path", false, "Limit the diff to one path"),
    opt("staged", ArgType::Bool, "Show staged changes"),
];
const GIT_DISCARD: &[ArgSpec] = &[path("path", true, "Path whose working-tree changes to discard")];

impl ToolKind {
    pub const ALL: [ToolKind; 29] = [
        Self::ReadFile,
        Self::WriteFile,
        Self::CreateFile,
        Self::DeleteFile,
        Self::RenameFile,
        Self::CopyFile,
        Self::MoveFile,
        Self::ListFiles,
        Self::SearchReplace,
        Self::SearchFiles,
        Self::SaveMemory,
        Self::RecallMemory,
        Self::ListMemories,
        Self::DeleteMemory,
        Self::CreateTodo,
        Self::UpdateTodo,
        Self::ListTodos,
        Self::FinishTask,
        Self::AskQuestion,
        Self::GitStatus,
        Self::GitStage,
        Self::GitCommit,
        Self::GitPush,
        Self::GitPull,
        Self::GitBranch,
        Self::GitCheckout,
        Self::GitLog,
        Self::GitDiff,
        Self::GitDiscard,
    ];

    /// Exact-name lookup.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::ReadFile => "read_file",
            Self::WriteFile => "write_file",
            Self::CreateFile => "create_file",
            Self::DeleteFile => "delete_file",
            Self::RenameFile => "rename_file",
            Self::CopyFile => "copy_file",
            Self::MoveFile => "move_file",
            Self::ListFiles => "list_files",
            Self::SearchReplace => "search_replace",
            Self::SearchFiles => "search_files",
            Self::SaveMemory => "save_memory",
            Self::RecallMemory => "recall_memory",
            Self::ListMemories => "list_memories",
            Self::DeleteMemory => "delete_memory",
            Self::CreateTodo => "create_todo",
            Self::UpdateTodo => "update_todo",
            Self::ListTodos => "list_todos",
            Self::FinishTask => "finish_task",
            Self::AskQuestion => "ask_question",
            Self::GitStatus => "git_status",
            Self::GitStage => "git_stage",
            Self::GitCommit => "git_commit",
            Self::GitPush => "git_push",
            Self::GitPull => "git_pull",
            Self::GitBranch => "git_branch",
            Self::GitCheckout => "git_checkout",
            Self::GitLog => "git_log",
            Self::GitDiff => "git_diff",
            Self::GitDiscard => "git_discard",
        }
    }

    pub fn family(self) -> ToolFamily {
        match self {
            Self::ReadFile
            | Self::WriteFile
            | Self::CreateFile
            | Self::DeleteFile
            | Self::RenameFile
            | Self::CopyFile
            | Self::MoveFile
            | Self::ListFiles => ToolFamily::File,
            Self::SearchReplace | Self::SearchFiles => ToolFamily::Search,
            Self::SaveMemory | Self::RecallMemory | Self::ListMemories | Self::DeleteMemory => {
                ToolFamily::Memory
            }
            Self::CreateTodo | Self::UpdateTodo | Self::ListTodos => ToolFamily::Todo,
            Self::FinishTask | Self::AskQuestion => ToolFamily::Control,
            Self::GitStatus
            | Self::GitStage
            | Self::GitCommit
            | Self::GitPush
            | Self::GitPull
            | Self::GitBranch
            | Self::GitCheckout
            | Self::GitLog
            | Self::GitDiff
            | Self::GitDiscard => ToolFamily::VersionControl,
        }
    }

    /// Tools that change workspace files and report a `FileChange`.
    pub fn is_mutating(self) -> bool {
        matches!(
            self,
            Self::WriteFile
                | Self::CreateFile
                | Self::DeleteFile
                | Self::RenameFile
                | Self::CopyFile
                | Self::MoveFile
                | Self::SearchReplace
        )
    }

    /// Control signals always succeed; the loop acts on their names.
    pub fn is_control(self) -> bool {
        self.family() == ToolFamily::Control
    }

    pub fn args(self) -> &'static [ArgSpec] {
        match self {
            Self::ReadFile => READ_FILE,
            Self::WriteFile => WRITE_FILE,
            Self::CreateFile => CREATE_FILE,
            Self::DeleteFile => ONE_PATH,
            Self::RenameFile | Self::CopyFile | Self::MoveFile => FROM_TO,
            Self::ListFiles => LIST_FILES,
            Self::SearchReplace => SEARCH_REPLACE,
            Self::SearchFiles => SEARCH_FILES,
            Self::SaveMemory => SAVE_MEMORY,
            Self::RecallMemory => RECALL_MEMORY,
            Self::ListMemories => LIST_MEMORIES,
            Self::DeleteMemory => DELETE_MEMORY,
            Self::CreateTodo => CREATE_TODO,
            Self::UpdateTodo => UPDATE_TODO,
            Self::ListTodos => NONE,
            Self::FinishTask => FINISH_TASK,
            Self::AskQuestion => ASK_QUESTION,
            Self::GitStatus | Self::GitPush | Self::GitPull => NONE,
            Self::GitStage => GIT_STAGE,
            Self::GitCommit => GIT_COMMIT,
            Self::GitBranch => GIT_BRANCH,
            Self::GitCheckout => GIT_CHECKOUT,
            Self::GitLog => GIT_LOG,
            Self::GitDiff => GIT_DIFF,
            Self::GitDiscard => GIT_DISCARD,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::ReadFile => "Read a text file from the workspace, optionally a line range.",
            Self::WriteFile => "Write a file, replacing its content. Creates it if missing.",
            Self::CreateFile => "Create a new file. Fails if the file already exists.",
            Self::DeleteFile => "Delete a file.",
            Self::RenameFile => "Rename a file.",
            Self::CopyFile => "Copy a file to a new path.",
            Self::MoveFile => "Move a file to another directory or path.",
            Self::ListFiles => "List files and directories under a path.",
            Self::SearchReplace => {
                "Replace an exact text snippet in a file. The snippet must match exactly once unless replace_all is set."
            }
            Self::SearchFiles => "Search workspace files for lines containing the query text.",
            Self::SaveMemory => "Save a note to long-term memory.",
            Self::RecallMemory => "Recall saved notes matching keywords.",
            Self::ListMemories => "List the most recent saved notes.",
            Self::DeleteMemory => "Delete a saved note by id.",
            Self::CreateTodo => "Add an item to the task's todo list.",
            Self::UpdateTodo => "Update the status or text of a todo item.",
            Self::ListTodos => "Show the todo list.",
            Self::FinishTask => "Call when the user's request is fully complete. Ends the turn.",
            Self::AskQuestion => {
                "Ask the user a clarifying question. Ends the turn until they reply."
            }
            Self::GitStatus => "Show the working tree status.",
            Self::GitStage => "Stage paths for commit.",
            Self::GitCommit => "Commit staged changes.",
            Self::GitPush => "Push the current branch.",
            Self::GitPull => "Pull (fast-forward only) the current branch.",
            Self::GitBranch => "List branches or create one.",
            Self::GitCheckout => "Switch branches, optionally creating the branch.",
            Self::GitLog => "Show recent commits.",
            Self::GitDiff => "Show unstaged or staged changes.",
            Self::GitDiscard => "Discard working-tree changes to a path.",
        }
    }

    /// JSON schema for the model.
    pub fn parameters_schema(self) -> Value {
        let mut properties = Map::new();
        for spec in self.args() {
            let schema = match spec.ty {
                ArgType::String => json!({"type": "string", "description": spec.description}),
                ArgType::Integer => json!({"type": "integer", "description": spec.description}),
                ArgType::Bool => json!({"type": "boolean", "description": spec.description}),
                ArgType::StringList => json!({
                    "type": "array",
                    "items": {"type": "string"},
                    "description": spec.description
                }),
            };
            properties.insert(spec.name.to_string(), schema);
        }
        let required: Vec<&str> = self
            .args()
            .iter()
            .filter(|s| s.required)
            .map(|s| s.name)
            .collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    pub fn definition(self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}
