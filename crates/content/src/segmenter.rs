//! Single-pass scanner from assistant text to content blocks.
//!
//! Precedence at each position: code fence (line start), tool-report header
//! (line start), thinking/reasoning opener, plain text. Anything inside an
//! open fence is code, including text that looks like a header or a tag.

use forgeloop_core::{ContentBlock, ToolCallBlock};

use crate::diff::{extract_file_path, parse_diff};
use crate::scan::{
    Fence, TagKind, TagMatch, find_close_tag, find_fence_close, is_partial_fence, parse_fence,
    parse_open_tag, strip_partial_close,
};
use crate::tool_report::{HeaderParse, ToolHeader, output_end, parse_header};

/// Split `text` into typed blocks.
///
/// With `is_streaming_tail` set, `text` is the growing tail of a response:
/// an unclosed fence, tag, or trailing tool report becomes the single active
/// (last) block, and a half-arrived opener is held back. Without it, nothing
/// is active and unclosed constructs run to the end of the text.
pub fn segment(text: &str, is_streaming_tail: bool) -> Vec<ContentBlock> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    let mut scanner = Scanner {
        src: text,
        pos: 0,
        streaming: is_streaming_tail,
        blocks: Vec::new(),
        run: String::new(),
    };
    scanner.scan();
    scanner.flush_text();
    tidy(scanner.blocks)
}

struct Scanner<'a> {
    src: &'a str,
    pos: usize,
    streaming: bool,
    blocks: Vec<ContentBlock>,
    run: String,
}

impl Scanner<'_> {
    fn scan(&mut self) {
        let src = self.src;
        while self.pos < src.len() {
            let rest = &src[self.pos..];

            if self.at_line_start() {
                if let Some(fence) = parse_fence(rest) {
                    self.take_fence(fence);
                    continue;
                }
                match parse_header(rest, self.streaming) {
                    HeaderParse::Header(header) => {
                        self.take_tool_report(header);
                        continue;
                    }
                    HeaderParse::Partial => return,
                    HeaderParse::NotHeader => {}
                }
                if self.streaming && !rest.contains('\n') && is_partial_fence(rest) {
                    return;
                }
            }

            match parse_open_tag(rest) {
                TagMatch::Open { kind, len } => {
                    self.take_tag(kind, len);
                    continue;
                }
                TagMatch::Partial if self.streaming && !rest.contains('\n') => return,
                _ => {}
            }

            let step = text_step(rest);
            self.run.push_str(&rest[..step]);
            self.pos += step;
        }
    }

    fn at_line_start(&self) -> bool {
        self.pos == 0 || self.src.as_bytes()[self.pos - 1] == b'\n'
    }

    fn flush_text(&mut self) {
        if !self.run.is_empty() {
            let text = std::mem::take(&mut self.run);
            self.blocks.push(ContentBlock::Text { text });
        }
    }

    fn push(&mut self, block: ContentBlock) {
        self.flush_text();
        self.blocks.push(block);
    }

    fn take_fence(&mut self, fence: Fence) {
        let src = self.src;
        let body_start = self.pos + fence.header_len;
        let language = fence.language.clone();

        if let Some((close_start, close_end)) = find_fence_close(src, body_start, &fence) {
            let body = &src[body_start..close_start];
            let text = body
                .strip_suffix('\n')
                .map(|b| b.strip_suffix('\r').unwrap_or(b))
                .unwrap_or(body);
            self.push(ContentBlock::Code {
                text: text.to_string(),
                language,
                is_active: false,
            });
            self.pos = close_end;
            return;
        }

        let mut body = src.get(body_start..).unwrap_or_default();
        if self.streaming {
            body = strip_partial_closer(body);
        }
        self.push(ContentBlock::Code {
            text: body.trim_end_matches(['\n', '\r']).to_string(),
            language,
            is_active: self.streaming,
        });
        self.pos = src.len();
    }

    fn take_tool_report(&mut self, header: ToolHeader) {
        let src = self.src;
        let output_start = (self.pos + header.len).min(src.len());
        let end = output_end(src, output_start, self.streaming);
        let body = src[output_start..end]
            .trim_start_matches(['\n', '\r'])
            .trim_end();

        let output = match (header.summary.is_empty(), body.is_empty()) {
            (true, true) => String::new(),
            (false, true) => header.summary.clone(),
            (true, false) => body.to_string(),
            (false, false) => format!("{}\n{}", header.summary, body),
        };
        let stats = parse_diff(&output);
        let file_path = extract_file_path(&header.name, &output);

        self.push(ContentBlock::ToolCall(ToolCallBlock {
            status: header.status,
            output: (!output.is_empty()).then_some(output.clone()),
            file_path,
            additions: stats.as_ref().map_or(0, |s| s.additions),
            deletions: stats.as_ref().map_or(0, |s| s.deletions),
            old_content: stats.as_ref().map(|s| s.old_content.clone()),
            new_content: stats.map(|s| s.new_content),
            is_active: self.streaming && end == src.len(),
            name: header.name,
        }));
        self.pos = end;
    }

    fn take_tag(&mut self, kind: TagKind, open_len: usize) {
        let src = self.src;
        let body_start = self.pos + open_len;
        let body = &src[body_start..];

        let (text, is_active, consumed) = match find_close_tag(body, kind) {
            Some((close_start, close_end)) => (&body[..close_start], false, close_end),
            None if self.streaming => (strip_partial_close(body, kind), true, body.len()),
            None => (body, false, body.len()),
        };
        let text = text.trim().to_string();
        self.push(match kind {
            TagKind::Thinking => ContentBlock::Thinking { text, is_active },
            TagKind::Reasoning => ContentBlock::Reasoning { text, is_active },
        });
        self.pos = body_start + consumed;
    }
}

/// How much plain text to consume before the next position worth checking:
/// through the end of the line, or up to the next `<`.
fn text_step(rest: &str) -> usize {
    for (i, c) in rest.char_indices() {
        if c == '\n' {
            return i + 1;
        }
        if c == '<' && i > 0 {
            return i;
        }
    }
    rest.len()
}

/// Hide a closing fence that is still arriving (a last line of only fence
/// characters, too short to close yet).
fn strip_partial_closer(body: &str) -> &str {
    let last_start = body.rfind('\n').map_or(0, |i| i + 1);
    if is_partial_fence(&body[last_start..]) {
        &body[..last_start]
    } else {
        body
    }
}

/// Drop empty blocks, then merge text runs that ended up adjacent.
fn tidy(blocks: Vec<ContentBlock>) -> Vec<ContentBlock> {
    let mut out: Vec<ContentBlock> = Vec::with_capacity(blocks.len());
    for block in blocks {
        let empty = match &block {
            ContentBlock::Text { text } => text.trim().is_empty(),
            ContentBlock::Code { text, .. }
            | ContentBlock::Thinking { text, .. }
            | ContentBlock::Reasoning { text, .. } => text.trim().is_empty(),
            ContentBlock::ToolCall(_) => false,
        };
        if empty {
            continue;
        }
        if let (Some(ContentBlock::Text { text: prev }), ContentBlock::Text { text }) =
            (out.last_mut(), &block)
        {
            prev.push_str(text);
            continue;
        }
        out.push(block);
    }

    for block in &mut out {
        if let ContentBlock::Text { text } = block {
            *text = text.trim().to_string();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use forgeloop_core::ToolStatus;

    fn tool(block: &ContentBlock) -> &ToolCallBlock {
        match block {
            ContentBlock::ToolCall(t) => t,
            other => panic!("expected tool block, got {other:?}"),
        }
    }

    #[test]
    fn plain_markdown_is_one_text_block() {
        assert_eq!(
            segment("Hello **world**", false),
            vec![ContentBlock::text("Hello **world**")]
        );
    }

    #[test]
    fn closed_fence_is_inactive_code() {
        assert_eq!(
            segment("```js\nconsole.log(1)\n```", false),
            vec![ContentBlock::Code {
                text: "console.log(1)".into(),
                language: Some("js".into()),
                is_active: false,
            }]
        );
    }

    #[test]
    fn unclosed_thinking_while_streaming_is_active() {
        let blocks = segment("Let me check.\n<thinking>partial reasoning", true);
        assert_eq!(blocks.len(), 2);
        assert_eq!(
            blocks.last(),
            Some(&ContentBlock::Thinking {
                text: "partial reasoning".into(),
                is_active: true,
            })
        );
    }

    #[test]
    fn consecutive_tool_headers_split_output() {
        let text = "🔧 **write_file** ✅ wrote 10 lines\n🔧 **read_file** ⏳";
        let blocks = segment(text, false);
        assert_eq!(blocks.len(), 2);

        let first = tool(&blocks[0]);
        assert_eq!(first.name, "write_file");
        assert_eq!(first.status, ToolStatus::Success);
        assert_eq!(first.output.as_deref(), Some("wrote 10 lines"));

        let second = tool(&blocks[1]);
        assert_eq!(second.name, "read_file");
        assert_eq!(second.status, ToolStatus::Running);
        assert_eq!(second.output, None);
    }

    #[test]
    fn empty_content_yields_no_blocks() {
        assert!(segment("", false).is_empty());
        assert!(segment("  \n\n ", true).is_empty());
    }

    #[test]
    fn mixed_content_in_order() {
        let text = "Intro\n<reasoning>plan it</reasoning>\n```rust\nfn a() {}\n```\nOutro";
        let blocks = segment(text, false);
        assert_eq!(
            blocks,
            vec![
                ContentBlock::text("Intro"),
                ContentBlock::Reasoning {
                    text: "plan it".into(),
                    is_active: false
                },
                ContentBlock::Code {
                    text: "fn a() {}".into(),
                    language: Some("rust".into()),
                    is_active: false
                },
                ContentBlock::text("Outro"),
            ]
        );
    }

    #[test]
    fn close_tag_may_use_other_spelling() {
        let blocks = segment("<THINK>hmm</thinking>after", false);
        assert_eq!(
            blocks,
            vec![
                ContentBlock::Thinking {
                    text: "hmm".into(),
                    is_active: false
                },
                ContentBlock::text("after"),
            ]
        );
    }

    #[test]
    fn header_inside_fence_is_literal() {
        let text = "```\n🔧 **write_file** ✅ done\n<thinking>x</thinking>\n```";
        let blocks = segment(text, false);
        assert_eq!(blocks.len(), 1);
        assert!(matches!(
            &blocks[0],
            ContentBlock::Code { text, .. } if text.contains("🔧 **write_file**") && text.contains("<thinking>")
        ));
    }

    #[test]
    fn final_parse_is_idempotent_and_inactive() {
        let text = "a\n```py\nprint(1)\n<think>open\n🔧 **x** ✅";
        let first = segment(text, false);
        let second = segment(text, false);
        assert_eq!(first, second);
        assert!(first.iter().all(|b| !b.is_active()));
        assert!(matches!(first.last(), Some(ContentBlock::Code { is_active: false, .. })));
    }

    #[test]
    fn streaming_has_at_most_one_active_block_last() {
        let full = "Sure.\n<thinking>step one</thinking>\n🔧 **read_file** ✅ read `src/a.rs`\nbody\n```rust\nfn x() {}\n```\n<reasoning>more</reasoning>\nDone.";
        for (i, _) in full.char_indices() {
            let blocks = segment(&full[..i], true);
            let active: Vec<usize> = blocks
                .iter()
                .enumerate()
                .filter(|(_, b)| b.is_active())
                .map(|(idx, _)| idx)
                .collect();
            assert!(active.len() <= 1, "prefix {i}: {blocks:?}");
            if let Some(&idx) = active.first() {
                assert_eq!(idx, blocks.len() - 1, "prefix {i}: {blocks:?}");
            }
        }
    }

    #[test]
    fn streaming_holds_back_partial_openers() {
        assert_eq!(segment("Hello <thi", true), vec![ContentBlock::text("Hello")]);
        assert_eq!(segment("Hello\n``", true), vec![ContentBlock::text("Hello")]);
        assert_eq!(segment("Hello\n🔧 **wri", true), vec![ContentBlock::text("Hello")]);
        // Final text keeps them.
        assert_eq!(segment("Hello <thi", false), vec![ContentBlock::text("Hello <thi")]);
    }

    #[test]
    fn streaming_code_hides_partial_closer() {
        let blocks = segment("```sh\nls -la\n``", true);
        assert_eq!(
            blocks,
            vec![ContentBlock::Code {
                text: "ls -la".into(),
                language: Some("sh".into()),
                is_active: true
            }]
        );
    }

    #[test]
    fn tool_report_running_at_tail_is_active() {
        let blocks = segment("Working on it\n🔧 **list_files** ⏳", true);
        let last = tool(blocks.last().unwrap());
        assert!(last.is_active);
        assert_eq!(last.status, ToolStatus::Running);
    }

    #[test]
    fn tool_output_stops_at_thinking_opener() {
        let blocks = segment("🔧 **read_file** ✅ ok\nline\n<thinking>next</thinking>", false);
        assert_eq!(blocks.len(), 2);
        assert_eq!(tool(&blocks[0]).output.as_deref(), Some("ok\nline"));
    }

    #[test]
    fn tool_block_aux_fields() {
        let text = "🔧 **search_replace** ✅ 1 edit\n```diff\n--- a/src/lib.rs\n+++ b/src/lib.rs\n@@ -1,2 +1,2 @@\n-old\n+new\n keep\n```";
        let blocks = segment(text, false);
        let block = tool(&blocks[0]);
        assert_eq!(block.file_path.as_deref(), Some("src/lib.rs"));
        assert_eq!((block.additions, block.deletions), (1, 1));
        assert_eq!(block.old_content.as_deref(), Some("old\nkeep"));
        assert_eq!(block.new_content.as_deref(), Some("new\nkeep"));
    }

    #[test]
    fn non_diff_tool_output_has_zero_counts() {
        let blocks = segment("🔧 **list_files** ✅ 3 entries\n- a\n+ b", false);
        let block = tool(&blocks[0]);
        assert_eq!((block.additions, block.deletions), (0, 0));
        assert_eq!(block.old_content, None);
    }

    #[test]
    fn empty_sections_are_dropped_and_text_coalesces() {
        let blocks = segment("a <think> </think> b", false);
        assert_eq!(blocks, vec![ContentBlock::text("a  b")]);
    }
}
