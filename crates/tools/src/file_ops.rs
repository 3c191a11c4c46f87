//! File and search tools over the `Workspace` port.

use forgeloop_content::render_unified_diff;
use forgeloop_core::error::{ToolError, WorkspaceError};
use forgeloop_core::workspace::{ChangeType, FileChange, Workspace};

use crate::args::Args;
use crate::kind::ToolKind;

/// `read_file` output is cut off after this many characters.
const MAX_READ_CHARS: usize = 100_000;
const MAX_LISTED_ENTRIES: usize = 500;
const DEFAULT_SEARCH_RESULTS: usize = 50;

/// What a file tool produced: its output and, for mutations, the change.
#[derive(Debug)]
pub struct FileOutcome {
    pub output: String,
    pub change: Option<FileChange>,
}

impl FileOutcome {
    fn read(output: String) -> Self {
        Self {
            output,
            change: None,
        }
    }

    fn changed(output: String, change: FileChange) -> Self {
        Self {
            output,
            change: Some(change),
        }
    }
}

fn fail(kind: ToolKind, err: WorkspaceError) -> ToolError {
    ToolError::execution(kind.name(), err)
}

fn change(path: &str, change_type: ChangeType) -> FileChange {
    FileChange {
        path: path.to_string(),
        change_type,
        from_path: None,
        old_content: None,
        new_content: None,
    }
}

fn with_diff(summary: String, path: &str, old: &str, new: &str) -> String {
    let diff = render_unified_diff(path, old, new);
    if diff.is_empty() {
        summary
    } else {
        format!("{summary}\n```diff\n{}\n```", diff.trim_end())
    }
}

fn line_count(content: &str) -> usize {
    content.lines().count()
}

pub async fn execute(
    kind: ToolKind,
    workspace: &dyn Workspace,
    args: &Args,
) -> Result<FileOutcome, ToolError> {
    match kind {
        ToolKind::ReadFile => read_file(workspace, args).await,
        ToolKind::WriteFile => write_file(workspace, args).await,
        ToolKind::CreateFile => create_file(workspace, args).await,
        ToolKind::DeleteFile => delete_file(workspace, args).await,
        ToolKind::RenameFile | ToolKind::CopyFile | ToolKind::MoveFile => {
            relocate(kind, workspace, args).await
        }
        ToolKind::ListFiles => list_files(workspace, args).await,
        ToolKind::SearchReplace => search_replace(workspace, args).await,
        ToolKind::SearchFiles => search_files(workspace, args).await,
        other => Err(ToolError::UnknownTool(other.name().to_string())),
    }
}

async fn read_file(workspace: &dyn Workspace, args: &Args) -> Result<FileOutcome, ToolError> {
    let kind = ToolKind::ReadFile;
    let path = args.str("path")?;
    let content = workspace
        .read_file(path)
        .await
        .map_err(|e| fail(kind, e))?;

    let start = args.opt_u64("start_line").map(|n| n.max(1) as usize);
    let end = args.opt_u64("end_line").map(|n| n as usize);
    let mut text = if start.is_some() || end.is_some() {
        let first = start.unwrap_or(1);
        let total = line_count(&content);
        let last = end.unwrap_or(total).min(total);
        if first > last {
            return Err(ToolError::execution(
                kind.name(),
                format!("line range {first}-{last} is empty; the file has {total} lines"),
            ));
        }
        content
            .lines()
            .skip(first - 1)
            .take(last + 1 - first)
            .collect::<Vec<_>>()
            .join("\n")
    } else {
        content
    };

    if text.chars().count() > MAX_READ_CHARS {
        let cut = text
            .char_indices()
            .nth(MAX_READ_CHARS)
            .map_or(text.len(), |(i, _)| i);
        text.truncate(cut);
        text.push_str("\n[truncated; use start_line/end_line to read the rest]");
    }
    Ok(FileOutcome::read(text))
}

async fn write_file(workspace: &dyn Workspace, args: &Args) -> Result<FileOutcome, ToolError> {
    let kind = ToolKind::WriteFile;
    let path = args.str("path")?;
    let content = args.str("content")?;

    let old = match workspace.read_file(path).await {
        Ok(old) => Some(old),
        Err(WorkspaceError::NotFound(_)) => None,
        Err(e) => return Err(fail(kind, e)),
    };
    workspace
        .write_file(path, content)
        .await
        .map_err(|e| fail(kind, e))?;

    let summary = format!("Wrote {} lines to {path}", line_count(content));
    let (output, change_type) = match &old {
        Some(old) => (with_diff(summary, path, old, content), ChangeType::Modified),
        None => (summary, ChangeType::Created),
    };
    let mut record = change(path, change_type);
    record.old_content = old;
    record.new_content = Some(content.to_string());
    Ok(FileOutcome::changed(output, record))
}

async fn create_file(workspace: &dyn Workspace, args: &Args) -> Result<FileOutcome, ToolError> {
    let kind = ToolKind::CreateFile;
    let path = args.str("path")?;
    let content = args.opt_str("content").unwrap_or_default();
    workspace
        .create_file(path, content)
        .await
        .map_err(|e| fail(kind, e))?;

    let mut record = change(path, ChangeType::Created);
    record.new_content = Some(content.to_string());
    Ok(FileOutcome::changed(
        format!("Created {path} ({} lines)", line_count(content)),
        record,
    ))
}

async fn delete_file(workspace: &dyn Workspace, args: &Args) -> Result<FileOutcome, ToolError> {
    let kind = ToolKind::DeleteFile;
    let path = args.str("path")?;
    // Kept for the undo log; binary files simply have no recorded content.
    let old = workspace.read_file(path).await.ok();
    workspace
        .delete_file(path)
        .await
        .map_err(|e| fail(kind, e))?;

    let mut record = change(path, ChangeType::Deleted);
    record.old_content = old;
    Ok(FileOutcome::changed(format!("Deleted {path}"), record))
}

async fn relocate(
    kind: ToolKind,
    workspace: &dyn Workspace,
    args: &Args,
) -> Result<FileOutcome, ToolError> {
    let from = args.str("from")?;
    let to = args.str("to")?;
    let (result, change_type, verb) = match kind {
        ToolKind::RenameFile => (workspace.rename_file(from, to).await, ChangeType::Renamed, "Renamed"),
        ToolKind::CopyFile => (workspace.copy_file(from, to).await, ChangeType::Copied, "Copied"),
        _ => (workspace.move_file(from, to).await, ChangeType::Moved, "Moved"),
    };
    result.map_err(|e| fail(kind, e))?;

    let mut record = change(to, change_type);
    record.from_path = Some(from.to_string());
    Ok(FileOutcome::changed(format!("{verb} {from} to {to}"), record))
}

async fn list_files(workspace: &dyn Workspace, args: &Args) -> Result<FileOutcome, ToolError> {
    let kind = ToolKind::ListFiles;
    let path = args.opt_str("path").unwrap_or(".");
    let entries = workspace
        .list_tree(path)
        .await
        .map_err(|e| fail(kind, e))?;

    if entries.is_empty() {
        return Ok(FileOutcome::read(format!("{path} is empty")));
    }
    let mut lines: Vec<String> = entries
        .iter()
        .take(MAX_LISTED_ENTRIES)
        .map(|entry| {
            if entry.is_dir {
                format!("{}/", entry.path)
            } else {
                format!("{} ({} bytes)", entry.path, entry.size)
            }
        })
        .collect();
    if entries.len() > MAX_LISTED_ENTRIES {
        lines.push(format!(
            "... {} more entries not shown",
            entries.len() - MAX_LISTED_ENTRIES
        ));
    }
    let files = entries.iter().filter(|e| !e.is_dir).count();
    Ok(FileOutcome::read(format!(
        "{files} files in {path}\n{}",
        lines.join("\n")
    )))
}

async fn search_replace(workspace: &dyn Workspace, args: &Args) -> Result<FileOutcome, ToolError> {
    let kind = ToolKind::SearchReplace;
    let path = args.str("path")?;
    let search = args.str("search")?;
    let replace = args.str("replace")?;
    let replace_all = args.bool_or("replace_all", false);

    if search.is_empty() {
        return Err(ToolError::execution(kind.name(), "search text is empty"));
    }
    let old = workspace
        .read_file(path)
        .await
        .map_err(|e| fail(kind, e))?;

    let matches = old.matches(search).count();
    if matches == 0 {
        return Err(ToolError::execution(
            kind.name(),
            format!("search text not found in {path}"),
        ));
    }
    if matches > 1 && !replace_all {
        return Err(ToolError::execution(
            kind.name(),
            format!(
                "search text matches {matches} times in {path}; pass a more specific snippet or set replace_all"
            ),
        ));
    }

    let new = if replace_all {
        old.replace(search, replace)
    } else {
        old.replacen(search, replace, 1)
    };
    workspace
        .write_file(path, &new)
        .await
        .map_err(|e| fail(kind, e))?;

    let noun = if matches == 1 { "occurrence" } else { "occurrences" };
    let output = with_diff(
        format!("Replaced {matches} {noun} in {path}"),
        path,
        &old,
        &new,
    );
    let mut record = change(path, ChangeType::Modified);
    record.old_content = Some(old);
    record.new_content = Some(new);
    Ok(FileOutcome::changed(output, record))
}

async fn search_files(workspace: &dyn Workspace, args: &Args) -> Result<FileOutcome, ToolError> {
    let kind = ToolKind::SearchFiles;
    let query = args.str("query")?;
    let path = args.opt_str("path").unwrap_or(".");
    let case_sensitive = args.bool_or("case_sensitive", false);
    let max_results = args.usize_or("max_results", DEFAULT_SEARCH_RESULTS).max(1);

    if query.is_empty() {
        return Err(ToolError::execution(kind.name(), "query is empty"));
    }
    let needle = if case_sensitive {
        query.to_string()
    } else {
        query.to_lowercase()
    };

    let entries = workspace
        .list_tree(path)
        .await
        .map_err(|e| fail(kind, e))?;

    let mut hits = Vec::new();
    let mut truncated = false;
    'files: for entry in entries.iter().filter(|e| !e.is_dir) {
        // Unreadable or non-text files are skipped.
        let Ok(content) = workspace.read_file(&entry.path).await else {
            continue;
        };
        for (number, line) in content.lines().enumerate() {
            let found = if case_sensitive {
                line.contains(&needle)
            } else {
                line.to_lowercase().contains(&needle)
            };
            if found {
                if hits.len() == max_results {
                    truncated = true;
                    break 'files;
                }
                hits.push(format!("{}:{}: {}", entry.path, number + 1, line.trim()));
            }
        }
    }

    if hits.is_empty() {
        return Ok(FileOutcome::read(format!("No matches for '{query}' in {path}")));
    }
    let mut output = format!("{} matches for '{query}'\n{}", hits.len(), hits.join("\n"));
    if truncated {
        output.push_str(&format!("\n[stopped after {max_results} matches]"));
    }
    Ok(FileOutcome::read(output))
}
