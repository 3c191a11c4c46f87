//! Terminal rendering of the live assistant message.

use forgeloop_core::observer::{AgentObserver, MessageSnapshot, TodoItem};
use forgeloop_core::workspace::FileChange;
use forgeloop_core::MessageStatus;
use std::io::Write;
use std::sync::Mutex;
use tracing::info;

/// Turns successive full snapshots of a message into terminal output.
///
/// Snapshots only grow, except when a tool report is rewritten in place;
/// a rewrite on the last printed line is redrawn with a carriage return.
#[derive(Debug, Default)]
pub struct LiveText {
    message_id: Option<String>,
    printed: String,
}

const CLEAR_LINE: &str = "\r\x1b[2K";

fn common_prefix(a: &str, b: &str) -> usize {
    a.char_indices()
        .zip(b.chars())
        .find(|((_, ca), cb)| ca != cb)
        .map_or_else(|| a.len().min(b.len()), |((i, _), _)| i)
}

impl LiveText {
    /// What to write to bring the terminal from the last snapshot to `content`.
    pub fn delta(&mut self, message_id: &str, content: &str) -> String {
        if self.message_id.as_deref() != Some(message_id) {
            self.message_id = Some(message_id.to_string());
            self.printed.clear();
        }

        let common = common_prefix(&self.printed, content);
        let out = if common == self.printed.len() {
            content[common..].to_string()
        } else {
            let line_start = self.printed[..common].rfind('\n').map_or(0, |i| i + 1);
            if self.printed[line_start..].contains('\n') {
                format!("\n{}", &content[line_start..])
            } else {
                format!("{CLEAR_LINE}{}", &content[line_start..])
            }
        };
        self.printed = content.to_string();
        out
    }

    /// Forget the current message; the next snapshot starts fresh.
    pub fn end(&mut self) {
        self.message_id = None;
        self.printed.clear();
    }
}

/// Prints snapshots to stdout and side events to stderr.
#[derive(Debug, Default)]
pub struct TerminalObserver {
    live: Mutex<LiveText>,
}

impl TerminalObserver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AgentObserver for TerminalObserver {
    fn on_snapshot(&self, snapshot: &MessageSnapshot) {
        let mut live = self.live.lock().unwrap_or_else(|p| p.into_inner());
        let mut out = live.delta(&snapshot.message_id, &snapshot.content);
        if snapshot.status != MessageStatus::Streaming {
            out.push('\n');
            live.end();
        }
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(out.as_bytes());
        let _ = stdout.flush();
    }

    fn on_file_changed(&self, change: &FileChange) {
        info!(path = %change.path, change = ?change.change_type, "Workspace file changed");
    }

    fn on_todos_changed(&self, todos: &[TodoItem]) {
        let rendered = forgeloop_tools::todo::render(todos);
        eprintln!();
        for line in rendered.lines() {
            eprintln!("  {line}");
        }
    }
}
