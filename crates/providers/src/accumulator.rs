//! Reassembles streamed tool-call fragments into complete calls.

use std::collections::BTreeMap;

use forgeloop_core::ToolCallResponse;

#[derive(Debug, Default)]
struct PartialCall {
    id: String,
    name: String,
    arguments: String,
}

/// Merges per-index tool-call deltas.
///
/// Indexes are stable for one response. `id` and `name` normally arrive in
/// the first fragment of an index; argument text arrives in pieces and is
/// concatenated in delivery order.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    calls: BTreeMap<u32, PartialCall>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one fragment into the record at `index`.
    pub fn apply(
        &mut self,
        index: u32,
        id: Option<&str>,
        name: Option<&str>,
        arguments: Option<&str>,
    ) {
        let call = self.calls.entry(index).or_default();
        if let Some(id) = id.filter(|s| !s.is_empty()) {
            call.id = id.to_string();
        }
        if let Some(name) = name.filter(|s| !s.is_empty()) {
            call.name = name.to_string();
        }
        if let Some(fragment) = arguments {
            call.arguments.push_str(fragment);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// Drop everything accumulated so far.
    pub fn clear(&mut self) {
        self.calls.clear();
    }

    /// Drain the accumulated calls in ascending index order.
    ///
    /// Calls without a provider id get a generated `call_<uuid>` id so the
    /// tool-result messages can always reference them.
    pub fn finalize(&mut self) -> Vec<ToolCallResponse> {
        std::mem::take(&mut self.calls)
            .into_values()
            .map(|call| ToolCallResponse {
                id: if call.id.is_empty() {
                    format!("call_{}", uuid::Uuid::new_v4().simple())
                } else {
                    call.id
                },
                name: call.name,
                arguments: call.arguments,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_call_assembly() {
        let mut acc = ToolCallAccumulator::new();
        acc.apply(0, Some("call_123"), Some("read_file"), Some("{\"path\""));
        acc.apply(0, None, None, Some(": \"src/lib.rs\"}"));

        let calls = acc.finalize();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_123");
        assert_eq!(calls[0].name, "read_file");
        assert_eq!(calls[0].arguments, "{\"path\": \"src/lib.rs\"}");
        assert!(acc.is_empty());
    }

    #[test]
    fn arguments_are_chunking_invariant() {
        let arguments = r#"{"path":"notes/ünïcode.md","content":"line one\nline two"}"#;

        let mut whole = ToolCallAccumulator::new();
        whole.apply(0, Some("call_a"), Some("write_file"), Some(arguments));

        let mut by_char = ToolCallAccumulator::new();
        by_char.apply(0, Some("call_a"), Some("write_file"), None);
        let mut buf = [0u8; 4];
        for ch in arguments.chars() {
            by_char.apply(0, None, None, Some(ch.encode_utf8(&mut buf)));
        }

        let mut uneven = ToolCallAccumulator::new();
        uneven.apply(0, Some("call_a"), Some("write_file"), Some(""));
        let mut rest = arguments;
        let mut width = 1;
        while !rest.is_empty() {
            let mut cut = width.min(rest.len());
            while !rest.is_char_boundary(cut) {
                cut += 1;
            }
            let (head, tail) = rest.split_at(cut);
            uneven.apply(0, None, None, Some(head));
            rest = tail;
            width = width % 7 + 2;
        }

        let expected = whole.finalize();
        assert_eq!(by_char.finalize(), expected);
        assert_eq!(uneven.finalize(), expected);
        assert_eq!(expected[0].arguments, arguments);
    }

    #[test]
    fn finalize_orders_by_index() {
        let mut acc = ToolCallAccumulator::new();
        acc.apply(2, Some("c"), Some("third"), Some("{}"));
        acc.apply(0, Some("a"), Some("first"), Some("{}"));
        acc.apply(1, Some("b"), Some("second"), Some("{}"));

        let names: Vec<String> = acc.finalize().into_iter().map(|c| c.name).collect();
        assert_eq!(names, ["first", "second", "third"]);
    }

    #[test]
    fn interleaved_indexes_stay_separate() {
        let mut acc = ToolCallAccumulator::new();
        acc.apply(0, Some("a"), Some("read_file"), Some("{\"pa"));
        acc.apply(1, Some("b"), Some("list_files"), Some("{\"pa"));
        acc.apply(0, None, None, Some("th\":\"a\"}"));
        acc.apply(1, None, None, Some("th\":\".\"}"));

        let calls = acc.finalize();
        assert_eq!(calls[0].arguments, r#"{"path":"a"}"#);
        assert_eq!(calls[1].arguments, r#"{"path":"."}"#);
    }

    #[test]
    fn missing_id_is_synthesized() {
        let mut acc = ToolCallAccumulator::new();
        acc.apply(0, Some(""), Some("finish_task"), None);
        let calls = acc.finalize();
        assert!(calls[0].id.starts_with("call_"));
        assert!(calls[0].id.len() > "call_".len());
    }

    #[test]
    fn empty_name_does_not_overwrite() {
        let mut acc = ToolCallAccumulator::new();
        acc.apply(0, Some("a"), Some("write_file"), None);
        acc.apply(0, None, Some(""), Some("{}"));
        assert_eq!(acc.finalize()[0].name, "write_file");
    }
}
