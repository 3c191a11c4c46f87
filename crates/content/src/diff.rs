//! Best-effort extraction of file paths and diff statistics from tool output,
//! plus the unified-diff renderer the editing tools use.

/// Counts and reconstructed sides of a unified diff.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffStats {
    pub additions: usize,
    pub deletions: usize,
    pub old_content: String,
    pub new_content: String,
}

/// Derive the file a tool report is about.
///
/// Priority: an explicit `path:` / `file:` line, then `+++` / `---` diff
/// headers, then a quoted or backticked path-like token. When none of those
/// match and `tool_name` looks file-related, the first bare path-like token.
pub fn extract_file_path(tool_name: &str, output: &str) -> Option<String> {
    explicit_path_line(output)
        .or_else(|| diff_header_path(output))
        .or_else(|| quoted_path(output))
        .or_else(|| {
            is_file_tool(tool_name)
                .then(|| bare_path(output))
                .flatten()
        })
}

fn explicit_path_line(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let line = line.trim();
        let lower = line.to_ascii_lowercase();
        let value = if lower.starts_with("path:") || lower.starts_with("file:") {
            &line[5..]
        } else {
            return None;
        };
        let value = value.trim().trim_matches(|c| c == '`' || c == '"' || c == '\'');
        (!value.is_empty()).then(|| value.to_string())
    })
}

fn diff_header_path(output: &str) -> Option<String> {
    let header = |prefix: &str, side: &str| {
        output.lines().find_map(|line| {
            let value = line.strip_prefix(prefix)?;
            let value = value.split('\t').next().unwrap_or_default().trim();
            if value.is_empty() || value == "/dev/null" {
                return None;
            }
            Some(value.strip_prefix(side).unwrap_or(value).to_string())
        })
    };
    header("+++ ", "b/").or_else(|| header("--- ", "a/"))
}

fn quoted_path(output: &str) -> Option<String> {
    for line in output.lines() {
        for quote in ['`', '"', '\''] {
            let mut parts = line.split(quote);
            parts.next();
            // Odd-indexed pieces sit between a pair of quotes.
            while let (Some(inside), Some(_)) = (parts.next(), parts.clone().next()) {
                if is_path_like(inside) {
                    return Some(inside.to_string());
                }
                parts.next();
            }
        }
    }
    None
}

fn bare_path(output: &str) -> Option<String> {
    output
        .split_whitespace()
        .map(|token| token.trim_matches(|c: char| matches!(c, ',' | ':' | ';' | '(' | ')' | '[' | ']')))
        .map(|token| token.trim_end_matches('.'))
        .find(|token| is_path_like(token))
        .map(str::to_string)
}

fn is_file_tool(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    name.contains("file")
        || name.contains("replace")
        || ["read", "write", "create", "delete", "rename", "copy", "move", "edit"]
            .iter()
            .any(|verb| name.starts_with(verb))
}

fn is_path_like(token: &str) -> bool {
    if token.is_empty()
        || token.len() > 260
        || token.chars().any(char::is_whitespace)
        || token.contains("://")
        || !token.chars().any(char::is_alphabetic)
    {
        return false;
    }
    token.contains('/') || has_extension(token)
}

fn has_extension(token: &str) -> bool {
    let name = token.rsplit('/').next().unwrap_or(token);
    match name.rsplit_once('.') {
        Some((stem, ext)) => {
            !stem.is_empty()
                && (1..=8).contains(&ext.len())
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
                && ext.chars().any(|c| c.is_ascii_alphabetic())
        }
        None => false,
    }
}

/// Parse a unified diff out of tool output.
///
/// Only recognizable diffs count: a ```` ```diff ```` fence, or `@@` hunk
/// markers together with `+++` / `---` headers. Anything else is `None`.
pub fn parse_diff(output: &str) -> Option<DiffStats> {
    let lines: Vec<&str> = output.lines().collect();

    let region: &[&str] = if let Some(start) = lines.iter().position(|l| is_diff_fence(l)) {
        let body = &lines[start + 1..];
        let end = body
            .iter()
            .position(|l| l.trim_start().starts_with("```"))
            .unwrap_or(body.len());
        &body[..end]
    } else if lines.iter().any(|l| l.starts_with("@@"))
        && lines.iter().any(|l| l.starts_with("+++") || l.starts_with("---"))
    {
        &lines
    } else {
        return None;
    };

    let mut stats = DiffStats::default();
    let mut old = Vec::new();
    let mut new = Vec::new();
    let mut in_hunk = !region.iter().any(|l| l.starts_with("@@"));

    let mut i = 0;
    while i < region.len() {
        let line = region[i];
        i += 1;

        if line.starts_with("@@") {
            in_hunk = true;
            continue;
        }
        if line.starts_with("diff ") || line.starts_with("index ") {
            continue;
        }
        if line.starts_with("--- ") && region.get(i).is_some_and(|n| n.starts_with("+++ ")) {
            // File header pair; the next hunk marker reopens counting.
            i += 1;
            in_hunk = !region[i..].iter().any(|l| l.starts_with("@@"));
            continue;
        }
        if !in_hunk {
            continue;
        }

        match line.as_bytes().first() {
            Some(b'+') => {
                stats.additions += 1;
                new.push(&line[1..]);
            }
            Some(b'-') => {
                stats.deletions += 1;
                old.push(&line[1..]);
            }
            Some(b' ') => {
                old.push(&line[1..]);
                new.push(&line[1..]);
            }
            Some(b'\\') => {}
            _ => {
                old.push(line);
                new.push(line);
            }
        }
    }

    stats.old_content = old.join("\n");
    stats.new_content = new.join("\n");
    Some(stats)
}

fn is_diff_fence(line: &str) -> bool {
    let trimmed = line.trim();
    let info = trimmed
        .strip_prefix("```")
        .or_else(|| trimmed.strip_prefix("~~~"))
        .map(|rest| rest.trim_start_matches(['`', '~']).trim());
    matches!(info, Some(lang) if lang.eq_ignore_ascii_case("diff") || lang.eq_ignore_ascii_case("patch"))
}

/// Render a single-hunk unified diff between `old` and `new`.
///
/// The hunk spans from the first to the last changed line with up to three
/// lines of context. Returns an empty string when nothing changed.
pub fn render_unified_diff(path: &str, old: &str, new: &str) -> String {
    const CONTEXT: usize = 3;

    let old_lines: Vec<&str> = old.lines().collect();
    let new_lines: Vec<&str> = new.lines().collect();

    let prefix = old_lines
        .iter()
        .zip(&new_lines)
        .take_while(|(a, b)| a == b)
        .count();
    if prefix == old_lines.len() && prefix == new_lines.len() {
        return String::new();
    }
    let max_suffix = old_lines.len().min(new_lines.len()) - prefix;
    let suffix = old_lines
        .iter()
        .rev()
        .zip(new_lines.iter().rev())
        .take(max_suffix)
        .take_while(|(a, b)| a == b)
        .count();

    let start = prefix.saturating_sub(CONTEXT);
    let old_end = old_lines.len() - suffix;
    let new_end = new_lines.len() - suffix;
    let trailing = suffix.min(CONTEXT);

    let old_count = old_end + trailing - start;
    let new_count = new_end + trailing - start;
    let range_start = |count: usize| if count == 0 { start } else { start + 1 };

    let mut out = format!(
        "--- a/{path}\n+++ b/{path}\n@@ -{},{} +{},{} @@\n",
        range_start(old_count),
        old_count,
        range_start(new_count),
        new_count
    );
    for line in &old_lines[start..prefix] {
        out.push_str(&format!(" {line}\n"));
    }
    for line in &old_lines[prefix..old_end] {
        out.push_str(&format!("-{line}\n"));
    }
    for line in &new_lines[prefix..new_end] {
        out.push_str(&format!("+{line}\n"));
    }
    for line in &old_lines[old_end..old_end + trailing] {
        out.push_str(&format!(" {line}\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_path_line_wins() {
        let out = "path: src/main.rs\n+++ b/other.rs\n`third.rs`";
        assert_eq!(extract_file_path("anything", out).as_deref(), Some("src/main.rs"));
    }

    #[test]
    fn diff_headers_next() {
        let out = "--- a/old.rs\n+++ b/new.rs\n@@ -1 +1 @@\n-a\n+b";
        assert_eq!(extract_file_path("x", out).as_deref(), Some("new.rs"));

        let deleted = "--- a/gone.rs\n+++ /dev/null";
        assert_eq!(extract_file_path("x", deleted).as_deref(), Some("gone.rs"));
    }

    #[test]
    fn quoted_token_then_bare_for_file_tools() {
        assert_eq!(
            extract_file_path("x", "Updated `lib/util.py` successfully").as_deref(),
            Some("lib/util.py")
        );
        assert_eq!(
            extract_file_path("write_file", "Wrote 12 lines to notes/todo.md.").as_deref(),
            Some("notes/todo.md")
        );
        assert_eq!(extract_file_path("git_status", "Wrote notes/todo.md"), None);
    }

    #[test]
    fn prose_is_not_a_path() {
        assert_eq!(extract_file_path("read_file", "done in 1.5 seconds"), None);
        assert_eq!(extract_file_path("x", "see \"hello world\""), None);
        assert_eq!(extract_file_path("read_file", "see https://example.com/a.html"), None);
    }

    #[test]
    fn diff_stats_from_hunks() {
        let out = "--- a/f.txt\n+++ b/f.txt\n@@ -1,3 +1,3 @@\n keep\n-old line\n+new line\n+extra\n";
        let stats = parse_diff(out).unwrap();
        assert_eq!(stats.additions, 2);
        assert_eq!(stats.deletions, 1);
        assert_eq!(stats.old_content, "keep\nold line");
        assert_eq!(stats.new_content, "keep\nnew line\nextra");
    }

    #[test]
    fn diff_stats_from_fence() {
        let out = "Applied edit\n```diff\n-a\n+b\n+c\n```\nafter";
        let stats = parse_diff(out).unwrap();
        assert_eq!((stats.additions, stats.deletions), (2, 1));
    }

    #[test]
    fn non_diff_output_has_no_stats() {
        assert_eq!(parse_diff("- bullet\n+ plus\n"), None);
        assert_eq!(parse_diff("@@ but no headers"), None);
    }

    #[test]
    fn rendered_diff_round_trips_through_parser() {
        let old = "a\nb\nc\nd\ne\nf\ng\nh\n";
        let new = "a\nb\nc\nd\nE\nf\ng\nh\n";
        let diff = render_unified_diff("x.txt", old, new);
        assert!(diff.contains("@@ -2,7 +2,7 @@"));
        let stats = parse_diff(&diff).unwrap();
        assert_eq!((stats.additions, stats.deletions), (1, 1));
        assert_eq!(extract_file_path("search_replace", &diff).as_deref(), Some("x.txt"));
    }

    #[test]
    fn rendered_diff_for_new_file() {
        let diff = render_unified_diff("n.txt", "", "one\ntwo\n");
        assert!(diff.contains("@@ -0,0 +1,2 @@"));
        assert_eq!(render_unified_diff("n.txt", "same", "same"), "");
    }
}
