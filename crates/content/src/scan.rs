//! Low-level recognizers shared by the segmenter and the tool-report grammar.
//!
//! Everything here works on `&str` slices that start at the scanner's
//! current position. No allocation except case folding for tag search.

/// A recognized code-fence opener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fence {
    /// `` ` `` or `~`
    pub marker: u8,
    /// Run length of the opener (at least 3).
    pub width: usize,
    pub language: Option<String>,
    /// Bytes consumed by the opener line, newline included.
    pub header_len: usize,
}

/// Parse a fence opener at the start of `rest` (which must be a line start).
pub fn parse_fence(rest: &str) -> Option<Fence> {
    let line_end = rest.find('\n');
    let line = rest[..line_end.unwrap_or(rest.len())].trim_end_matches('\r');
    let body = strip_indent(line)?;

    let marker = *body.as_bytes().first()?;
    if marker != b'`' && marker != b'~' {
        return None;
    }
    let width = body.bytes().take_while(|b| *b == marker).count();
    if width < 3 {
        return None;
    }
    let info = body[width..].trim();
    if marker == b'`' && info.contains('`') {
        return None;
    }

    Some(Fence {
        marker,
        width,
        language: info.split_whitespace().next().map(str::to_string),
        header_len: line_end.map_or(rest.len(), |e| e + 1),
    })
}

/// Whether `line` closes `fence`.
pub fn is_fence_closer(line: &str, fence: &Fence) -> bool {
    let line = line.trim_end_matches(['\n', '\r']);
    let Some(body) = strip_indent(line) else {
        return false;
    };
    let run = body.bytes().take_while(|b| *b == fence.marker).count();
    run >= fence.width && body[run..].trim().is_empty()
}

/// A line of one or two fence characters with nothing after it: the start of
/// an opener or closer that has not fully arrived.
pub fn is_partial_fence(line: &str) -> bool {
    let Some(body) = strip_indent(line) else {
        return false;
    };
    let Some(&marker) = body.as_bytes().first() else {
        return false;
    };
    (marker == b'`' || marker == b'~')
        && body.len() < 3
        && body.bytes().all(|b| b == marker)
}

/// Locate the closer of `fence` in `src`, scanning whole lines from `from`.
///
/// Returns `(closer_line_start, end_after_closer_line)`.
pub fn find_fence_close(src: &str, from: usize, fence: &Fence) -> Option<(usize, usize)> {
    let mut pos = from;
    while pos < src.len() {
        let rest = &src[pos..];
        let line_len = rest.find('\n').map_or(rest.len(), |i| i + 1);
        if is_fence_closer(&rest[..line_len], fence) {
            return Some((pos, pos + line_len));
        }
        pos += line_len;
    }
    None
}

fn strip_indent(line: &str) -> Option<&str> {
    let body = line.trim_start_matches(' ');
    (line.len() - body.len() <= 3).then_some(body)
}

/// The two reasoning-style section kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Thinking,
    Reasoning,
}

impl TagKind {
    /// Accepted spellings, longest first so `think` never shadows `thinking`.
    pub fn spellings(self) -> &'static [&'static str] {
        match self {
            Self::Thinking => &["thinking", "think"],
            Self::Reasoning => &["reasoning", "reason"],
        }
    }
}

const ALL_TAGS: [(TagKind, &str); 4] = [
    (TagKind::Thinking, "thinking"),
    (TagKind::Thinking, "think"),
    (TagKind::Reasoning, "reasoning"),
    (TagKind::Reasoning, "reason"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagMatch {
    /// A full opening tag of `len` bytes.
    Open { kind: TagKind, len: usize },
    /// `rest` is a proper prefix of some opening tag.
    Partial,
    None,
}

/// Recognize an opening tag at the start of `rest`, case-insensitively.
pub fn parse_open_tag(rest: &str) -> TagMatch {
    let bytes = rest.as_bytes();
    if bytes.first() != Some(&b'<') {
        return TagMatch::None;
    }
    for (kind, name) in ALL_TAGS {
        let len = name.len() + 2;
        if bytes.len() >= len
            && bytes[1..=name.len()].eq_ignore_ascii_case(name.as_bytes())
            && bytes[len - 1] == b'>'
        {
            return TagMatch::Open { kind, len };
        }
    }
    let is_prefix = ALL_TAGS.iter().any(|(_, name)| {
        let tag = format!("<{name}>");
        bytes.len() < tag.len() && tag.as_bytes()[..bytes.len()].eq_ignore_ascii_case(bytes)
    });
    if is_prefix {
        TagMatch::Partial
    } else {
        TagMatch::None
    }
}

/// Byte offset of the first complete opening tag in `text`.
pub fn find_open_tag(text: &str) -> Option<usize> {
    text.match_indices('<')
        .map(|(i, _)| i)
        .find(|&i| matches!(parse_open_tag(&text[i..]), TagMatch::Open { .. }))
}

/// Find the earliest closing tag for `kind` in `body`, in either spelling.
///
/// Returns `(close_start, close_end)`.
pub fn find_close_tag(body: &str, kind: TagKind) -> Option<(usize, usize)> {
    // ASCII folding keeps byte offsets intact.
    let folded = body.to_ascii_lowercase();
    kind.spellings()
        .iter()
        .filter_map(|name| {
            let tag = format!("</{name}>");
            folded.find(&tag).map(|start| (start, start + tag.len()))
        })
        .min_by_key(|(start, _)| *start)
}

/// Drop a trailing fragment of a closing tag (`</thi`) from streaming text.
pub fn strip_partial_close(text: &str, kind: TagKind) -> &str {
    let Some(idx) = text.rfind('<') else {
        return text;
    };
    let tail = text[idx..].to_ascii_lowercase();
    let partial = kind.spellings().iter().any(|name| {
        let tag = format!("</{name}>");
        tail.len() < tag.len() && tag.starts_with(&tail)
    });
    if partial { &text[..idx] } else { text }
}
