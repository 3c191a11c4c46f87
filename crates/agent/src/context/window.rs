//! Sliding history window under a token budget.

use forgeloop_core::message::{Message, Role};

use super::token::estimate_message_tokens;

/// Picks the most recent history that fits a token budget.
///
/// Messages are taken in units: an assistant message with tool calls
/// travels together with the tool results that answer it, so a window never
/// starts with an orphaned tool result. The newest unit is always kept even
/// when it alone exceeds the budget.
#[derive(Debug, Clone, Copy)]
pub struct HistoryWindow {
    budget: usize,
}

impl HistoryWindow {
    pub fn new(budget_tokens: usize) -> Self {
        Self {
            budget: budget_tokens,
        }
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Select history, leaving `reserved` tokens for the system prompt and
    /// tool schemas. System messages in `history` are skipped.
    pub fn select(&self, history: &[Message], reserved: usize) -> Vec<Message> {
        let budget = self.budget.saturating_sub(reserved);
        let units = group_units(history);

        let mut used = 0;
        let mut start = units.len();
        for (i, unit) in units.iter().enumerate().rev() {
            let cost: usize = unit.iter().map(|m| estimate_message_tokens(m)).sum();
            if start != units.len() && used + cost > budget {
                break;
            }
            used += cost;
            start = i;
        }

        let selected: Vec<Message> = units[start..]
            .iter()
            .flat_map(|unit| unit.iter().map(|m| (*m).clone()))
            .collect();
        if start > 0 {
            tracing::debug!(
                dropped_units = start,
                kept = selected.len(),
                tokens = used,
                "History window trimmed"
            );
        }
        selected
    }
}

/// Split history into units that must be kept or dropped together.
fn group_units(history: &[Message]) -> Vec<Vec<&Message>> {
    let mut units: Vec<Vec<&Message>> = Vec::new();
    for message in history {
        match message.role {
            Role::System => continue,
            Role::Tool => match units.last_mut() {
                Some(unit) if unit.first().is_some_and(|m| !m.tool_calls.is_empty()) => {
                    unit.push(message)
                }
                // A tool result with no call before it cannot be sent.
                _ => continue,
            },
            _ => units.push(vec![message]),
        }
    }
    units
}

#[cfg(test)]
mod tests {
    use super::*;
    use forgeloop_core::ToolCallResponse;

    fn call(id: &str) -> ToolCallResponse {
        ToolCallResponse {
            id: id.into(),
            name: "read_file".into(),
            arguments: "{}".into(),
        }
    }

    fn history() -> Vec<Message> {
        vec![
            Message::system("ignored"),
            Message::user(&"old question ".repeat(20)),
            Message::assistant_with_tool_calls("", vec![call("c1"), call("c2")]),
            Message::tool_result("c1", "one"),
            Message::tool_result("c2", "two"),
            Message::assistant("done"),
            Message::user("latest"),
        ]
    }

    #[test]
    fn large_budget_keeps_everything_but_system() {
        let selected = HistoryWindow::new(10_000).select(&history(), 0);
        assert_eq!(selected.len(), 6);
        assert!(selected.iter().all(|m| m.role != Role::System));
    }

    #[test]
    fn tool_results_stay_with_their_call() {
        let all = history();
        let tail: usize = all[2..]
            .iter()
            .map(estimate_message_tokens)
            .sum();
        let selected = HistoryWindow::new(tail).select(&all, 0);
        assert_eq!(selected.len(), 5);
        assert!(!selected[0].tool_calls.is_empty());

        // One token short: the whole tool unit goes, never half of it.
        let selected = HistoryWindow::new(tail - 1).select(&all, 0);
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].content, "done");
    }

    #[test]
    fn newest_message_always_kept() {
        let selected = HistoryWindow::new(1).select(&history(), 0);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].content, "latest");
    }

    #[test]
    fn orphaned_tool_results_dropped() {
        let history = vec![Message::tool_result("c9", "stray"), Message::user("hi")];
        let selected = HistoryWindow::new(10_000).select(&history, 0);
        assert_eq!(selected.len(), 1);
    }

    #[test]
    fn reserved_tokens_shrink_budget() {
        let all = history();
        let full = HistoryWindow::new(10_000).select(&all, 0).len();
        let reduced = HistoryWindow::new(10_000).select(&all, 9_990).len();
        assert!(reduced < full);
    }
}
