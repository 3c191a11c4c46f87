//! The system prompt sent at the head of every request.

use std::path::Path;

const BASE_PROMPT: &str = "\
You are Forgeloop, a coding agent working inside the user's project workspace.

Work in small steps. Read files before changing them, prefer search_replace \
for focused edits, and keep the user's existing style. All paths are relative \
to the workspace root.

Use the todo tools to track multi-step work. When the request is fully done, \
call finish_task with a short summary. If you need information only the user \
can give, call ask_question and stop.";

/// Build the system prompt: the configured prompt (or the built-in one),
/// followed by workspace facts.
pub fn system_prompt(custom: Option<&str>, workspace_root: &Path) -> String {
    let base = custom
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(BASE_PROMPT);
    format!(
        "{base}\n\nWorkspace root: {}",
        workspace_root.display()
    )
}
