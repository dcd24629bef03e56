//! Small text helpers shared by the handlers and renderers.

use regex::Regex;
use std::sync::LazyLock;

/// Longest derived title, in chars, before an ellipsis is appended.
pub const MAX_TITLE_CHARS: usize = 60;

/// Longest file stem, in chars.
const MAX_FILE_STEM_CHARS: usize = 120;

static NOSTR_URI_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"nostr:((?:npub|note|nevent|nprofile|naddr)1[02-9ac-hj-np-z]{6})[02-9ac-hj-np-z]+")
        .unwrap()
});

/// First 8 chars of a hex id or key.
pub fn short_hex(hex: &str) -> &str {
    match hex.char_indices().nth(8) {
        Some((idx, _)) => &hex[..idx],
        None => hex,
    }
}

/// Collapse whitespace runs to one space and drop control chars, so the
/// text fits on one line.
pub fn single_line(text: &str) -> String {
    text.split(|c: char| c.is_whitespace() || c.is_control())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalize note content for a document body.
///
/// CRLF becomes LF, trailing whitespace is dropped from every line, runs of
/// blank lines collapse to a single blank line and the result is trimmed.
pub fn clean_content(content: &str) -> String {
    let normalized = content.replace("\r\n", "\n").replace('\r', "\n");
    let mut out: Vec<&str> = Vec::new();
    let mut blank_run = 0;
    for line in normalized.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push(line);
    }
    out.join("\n").trim().to_string()
}

/// Derive a human title from note content.
///
/// Uses the first non-empty line with markdown heading marks removed and
/// `nostr:` URIs shortened. Falls back to `Note <short id>`.
pub fn derive_title(content: &str, id: &str) -> String {
    let first_line = content
        .lines()
        .map(str::trim)
        .find(|line| !line.trim_start_matches('#').trim().is_empty());

    let Some(line) = first_line else {
        return format!("Note {}", short_hex(id));
    };

    let line = line.trim_start_matches('#').trim();
    let line = NOSTR_URI_RE.replace_all(line, "$1…");
    truncate_chars(&line, MAX_TITLE_CHARS)
}

/// Truncate to `max` chars on a char boundary, appending `…` when cut.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", text[..idx].trim_end()),
        None => text.to_string(),
    }
}

/// Make a string safe to use as a document file stem.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '#' | '^' | '[' | ']'))
        .filter(|c| !c.is_control())
        .collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    let collapsed = collapsed.trim_matches('.').trim();
    if collapsed.is_empty() {
        return "untitled".to_string();
    }
    match collapsed.char_indices().nth(MAX_FILE_STEM_CHARS) {
        Some((idx, _)) => collapsed[..idx].trim_end().to_string(),
        None => collapsed.to_string(),
    }
}

/// Wiki-style link to a document title.
pub fn wiki_link(title: &str) -> String {
    format!("[[{}]]", title)
}
