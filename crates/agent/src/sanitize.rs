//! Final cleanup of assistant content before it is persisted.

use forgeloop_content::scan::{
    Fence, TagKind, TagMatch, find_close_tag, find_open_tag, is_fence_closer, parse_fence,
    parse_open_tag,
};

/// At most this many consecutive blank lines survive outside code.
const MAX_BLANK_LINES: usize = 2;

struct OpenSection {
    kind: TagKind,
    /// Where the opening tag starts in the output.
    tag_start: usize,
    /// Where the section body starts in the output.
    body_start: usize,
}

/// Clean up finished assistant content.
///
/// Strips control characters other than newline and tab, closes a code
/// fence or thinking/reasoning section left open, drops empty sections,
/// collapses long runs of blank lines, and trims the result.
pub fn sanitize(content: &str) -> String {
    let cleaned: String = content
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect();

    let mut out = String::with_capacity(cleaned.len());
    let mut fence: Option<Fence> = None;
    let mut section: Option<OpenSection> = None;
    let mut blank_run = 0;

    for line in cleaned.split_inclusive('\n') {
        if let Some(open) = &fence {
            out.push_str(line);
            if is_fence_closer(line, open) {
                fence = None;
            }
            continue;
        }

        if section.is_none() {
            if line.trim().is_empty() {
                blank_run += 1;
                if blank_run > MAX_BLANK_LINES {
                    continue;
                }
                out.push_str(line);
                continue;
            }
            blank_run = 0;
            if let Some(opened) = parse_fence(line) {
                fence = Some(opened);
                out.push_str(line);
                continue;
            }
        }

        let mut rest = line;
        while !rest.is_empty() {
            match &section {
                None => {
                    let Some(at) = find_open_tag(rest) else {
                        out.push_str(rest);
                        break;
                    };
                    let TagMatch::Open { kind, len } = parse_open_tag(&rest[at..]) else {
                        out.push_str(rest);
                        break;
                    };
                    out.push_str(&rest[..at]);
                    let tag_start = out.len();
                    out.push_str(&rest[at..at + len]);
                    section = Some(OpenSection {
                        kind,
                        tag_start,
                        body_start: out.len(),
                    });
                    rest = &rest[at + len..];
                }
                Some(open) => {
                    let Some((close_start, close_end)) = find_close_tag(rest, open.kind) else {
                        out.push_str(rest);
                        break;
                    };
                    out.push_str(&rest[..close_start]);
                    if out[open.body_start..].trim().is_empty() {
                        out.truncate(open.tag_start);
                    } else {
                        out.push_str(&rest[close_start..close_end]);
                    }
                    section = None;
                    rest = &rest[close_end..];
                }
            }
        }
    }

    if let Some(open) = fence {
        if !out.ends_with('\n') {
            out.push('\n');
        }
        let closer = char::from(open.marker).to_string().repeat(open.width);
        out.push_str(&closer);
    } else if let Some(open) = section {
        if out[open.body_start..].trim().is_empty() {
            out.truncate(open.tag_start);
        } else {
            let name = open.kind.spellings()[0];
            out.push_str(&format!("\n</{name}>"));
        }
    }

    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_control_characters() {
        assert_eq!(sanitize("a\u{0007}b\tc\r\nd\u{001b}"), "ab\tc\nd");
    }

    #[test]
    fn closes_unclosed_fence() {
        assert_eq!(
            sanitize("Here:\n```rust\nfn main() {}"),
            "Here:\n```rust\nfn main() {}\n```"
        );
        assert_eq!(sanitize("~~~~\nx\n"), "~~~~\nx\n~~~~");
    }

    #[test]
    fn closes_unclosed_section() {
        assert_eq!(
            sanitize("<thinking>weighing options"),
            "<thinking>weighing options\n</thinking>"
        );
    }

    #[test]
    fn removes_empty_sections() {
        assert_eq!(sanitize("<reasoning>  \n</reasoning>Answer"), "Answer");
        assert_eq!(sanitize("Answer\n<think>"), "Answer");
    }

    #[test]
    fn tags_inside_fences_are_untouched() {
        let text = "```xml\n<thinking></thinking>\n```";
        assert_eq!(sanitize(text), text);
    }

    #[test]
    fn collapses_blank_lines_outside_code() {
        assert_eq!(sanitize("a\n\n\n\n\nb"), "a\n\n\nb");
        let code = "```\nx\n\n\n\n\ny\n```";
        assert_eq!(sanitize(code), code);
    }

    #[test]
    fn trims_surrounding_whitespace() {
        assert_eq!(sanitize("\n\n  hello  \n\n"), "hello");
        assert_eq!(sanitize(""), "");
    }

    #[test]
    fn idempotent() {
        let once = sanitize("<think>hmm\n\n\n\n```py\nprint(1)");
        assert_eq!(sanitize(&once), once);
    }
}
