//! The textual tool-report grammar.
//!
//! A report is a header line `🔧 **name** <status> summary` (the status may
//! instead open the following line), followed by free-form output that runs
//! until the next report header or the next thinking/reasoning opener.
//! The agent loop writes reports with [`format_report`]; the segmenter reads
//! them back with [`parse_header`] and [`output_end`].

use forgeloop_core::ToolStatus;

use crate::scan::{find_fence_close, find_open_tag, parse_fence};

pub const TOOL_MARKER: char = '🔧';
pub const RUNNING_MARKER: char = '⏳';
pub const RUNNING_MARKER_ALT: char = '🔄';
pub const SUCCESS_MARKER: char = '✅';
pub const ERROR_MARKER: char = '❌';

const VARIATION_SELECTOR: char = '\u{FE0F}';

pub fn status_marker(status: ToolStatus) -> char {
    match status {
        ToolStatus::Running => RUNNING_MARKER,
        ToolStatus::Success => SUCCESS_MARKER,
        ToolStatus::Error => ERROR_MARKER,
    }
}

/// Render a one-line report header.
pub fn format_report(name: &str, status: ToolStatus, summary: &str) -> String {
    let summary = summary.lines().next().unwrap_or_default().trim();
    let marker = status_marker(status);
    if summary.is_empty() {
        format!("{TOOL_MARKER} **{name}** {marker}")
    } else {
        format!("{TOOL_MARKER} **{name}** {marker} {summary}")
    }
}

/// Render a header followed by a detail body (e.g. a fenced diff).
pub fn format_report_with_detail(
    name: &str,
    status: ToolStatus,
    summary: &str,
    detail: &str,
) -> String {
    let header = format_report(name, status, summary);
    let detail = detail.trim_matches('\n');
    if detail.trim().is_empty() {
        header
    } else {
        format!("{header}\n{detail}")
    }
}

/// A parsed report header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolHeader {
    pub name: String,
    pub status: ToolStatus,
    pub summary: String,
    /// Bytes consumed by the header (one or two lines, newline included).
    pub len: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderParse {
    Header(ToolHeader),
    /// A header that has not fully arrived yet; hold it back while streaming.
    Partial,
    NotHeader,
}

/// Parse a report header at the start of `rest` (a line start).
pub fn parse_header(rest: &str, streaming: bool) -> HeaderParse {
    let newline = rest.find('\n');
    let line_len = newline.map_or(rest.len(), |i| i + 1);
    let line = rest[..newline.unwrap_or(rest.len())].trim_end_matches('\r');
    let last_line = newline.is_none();

    let Some(after_marker) = line.trim_start().strip_prefix(TOOL_MARKER) else {
        return HeaderParse::NotHeader;
    };
    let after_marker = after_marker
        .trim_start_matches(VARIATION_SELECTOR)
        .trim_start();

    let Some(name_part) = after_marker.strip_prefix("**") else {
        return if streaming && last_line && "**".starts_with(after_marker) {
            HeaderParse::Partial
        } else {
            HeaderParse::NotHeader
        };
    };
    let Some(name_end) = name_part.find("**") else {
        return if streaming && last_line {
            HeaderParse::Partial
        } else {
            HeaderParse::NotHeader
        };
    };
    let name = name_part[..name_end].trim();
    if name.is_empty() || name.contains('\n') {
        return HeaderParse::NotHeader;
    }
    let tail = name_part[name_end + 2..].trim();

    let header = |status, summary: &str, len| {
        HeaderParse::Header(ToolHeader {
            name: name.to_string(),
            status,
            summary: summary.to_string(),
            len,
        })
    };

    if let Some((status, summary)) = parse_status(tail) {
        return header(status, summary, line_len);
    }

    let remainder = &rest[line_len..];
    let next_len = remainder.find('\n').map_or(remainder.len(), |i| i + 1);
    if let Some((status, summary)) = parse_status(remainder[..next_len].trim()) {
        return header(status, summary, line_len + next_len);
    }

    // Nothing after the header yet: the call is still running.
    if streaming && remainder.trim().is_empty() {
        return header(ToolStatus::Running, tail, rest.len());
    }
    HeaderParse::NotHeader
}

/// Split a leading status marker off `text`.
fn parse_status(text: &str) -> Option<(ToolStatus, &str)> {
    let mut chars = text.chars();
    let status = match chars.next()? {
        RUNNING_MARKER | RUNNING_MARKER_ALT => ToolStatus::Running,
        SUCCESS_MARKER => ToolStatus::Success,
        ERROR_MARKER => ToolStatus::Error,
        _ => return None,
    };
    let summary = chars.as_str().trim_start_matches(VARIATION_SELECTOR).trim();
    Some((status, summary))
}

/// Where the output of a report starting at `start` ends: the next header
/// line or the next thinking/reasoning opener, whichever comes first.
///
/// Fenced blocks inside the output are skipped whole, so a header or tag
/// inside a fence never ends the output.
pub fn output_end(src: &str, start: usize, streaming: bool) -> usize {
    let mut pos = start;
    while pos < src.len() {
        let rest = &src[pos..];
        if !matches!(parse_header(rest, streaming), HeaderParse::NotHeader) {
            return pos;
        }
        if let Some(fence) = parse_fence(rest) {
            let body_start = pos + fence.header_len;
            pos = find_fence_close(src, body_start, &fence).map_or(src.len(), |(_, end)| end);
            continue;
        }
        let line_len = rest.find('\n').map_or(rest.len(), |i| i + 1);
        if let Some(offset) = find_open_tag(&rest[..line_len]) {
            return pos + offset;
        }
        pos += line_len;
    }
    src.len()
}
