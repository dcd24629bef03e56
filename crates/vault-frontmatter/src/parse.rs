//! Line-oriented parser for the frontmatter block.
//!
//! The grammar is deliberately small:
//!
//! ```text
//! key: raw scalar            -> string, never coerced
//! key: [a, "b", [1, 2]]      -> flow list, elements coerced
//! key:                       -> list (following `- ` lines) or nested map
//!   - item                   -> coerced scalar appended to the list
//!   - [a, b]                 -> nested list appended to the list
//! ```
//!
//! Top-level scalars stay raw strings while list elements are coerced to
//! bool / null / number. Existing documents depend on that asymmetry.

use serde_json::{Number, Value};

use crate::error::FrontmatterError;
use crate::{Frontmatter, ParsedDocument};

pub(crate) const DELIMITER: &str = "---";

/// Split `"---\n<block>\n---\n<body>"` into block and body.
///
/// Blank lines and a single `# ` heading may precede the opening delimiter;
/// they are dropped. Returns `None` when no complete block is present.
pub(crate) fn split_document(text: &str) -> Option<(&str, &str)> {
    let mut lines = text.split_inclusive('\n');
    let mut offset = 0;
    let mut seen_heading = false;

    let block_start = loop {
        let line = lines.next()?;
        offset += line.len();
        let content = line.trim_end_matches(['\n', '\r']);
        if content == DELIMITER && line.ends_with('\n') {
            break offset;
        }
        if content.trim().is_empty() {
            continue;
        }
        if content.starts_with("# ") && !seen_heading {
            seen_heading = true;
            continue;
        }
        return None;
    };

    let mut cursor = block_start;
    for line in lines {
        if line.trim_end_matches(['\n', '\r']) == DELIMITER {
            let block = text[block_start..cursor]
                .strip_suffix('\n')
                .unwrap_or(&text[block_start..cursor]);
            let block = block.strip_suffix('\r').unwrap_or(block);
            return Some((block, &text[cursor + line.len()..]));
        }
        cursor += line.len();
    }
    None
}

/// Parse a whole document. Text without a block is all body.
pub fn parse_document(text: &str) -> Result<ParsedDocument, FrontmatterError> {
    match split_document(text) {
        Some((block, body)) => Ok(ParsedDocument {
            frontmatter: parse_block(block)?,
            body: body.to_string(),
        }),
        None => Ok(ParsedDocument {
            frontmatter: Frontmatter::new(),
            body: text.to_string(),
        }),
    }
}

/// Parse the text between the delimiters.
pub fn parse_block(block: &str) -> Result<Frontmatter, FrontmatterError> {
    let lines = block
        .lines()
        .enumerate()
        .filter_map(|(idx, raw)| {
            let text = raw.trim();
            if text.is_empty() || text.starts_with('#') {
                return None;
            }
            Some(Line {
                number: idx + 1,
                indent: raw.len() - raw.trim_start().len(),
                text,
            })
        })
        .collect();

    let mut parser = BlockParser { lines, pos: 0 };
    let map = parser.parse_map(0)?;
    match parser.peek() {
        Some(line) => Err(FrontmatterError::UnexpectedIndent { line: line.number }),
        None => Ok(map),
    }
}

struct Line<'a> {
    number: usize,
    indent: usize,
    text: &'a str,
}

struct BlockParser<'a> {
    lines: Vec<Line<'a>>,
    pos: usize,
}

impl<'a> BlockParser<'a> {
    fn peek(&self) -> Option<&Line<'a>> {
        self.lines.get(self.pos)
    }

    fn parse_map(&mut self, indent: usize) -> Result<Frontmatter, FrontmatterError> {
        let mut map = Frontmatter::new();
        let mut current: Option<String> = None;

        while let Some(line) = self.peek() {
            if line.indent < indent {
                break;
            }
            let (number, line_indent, text) = (line.number, line.indent, line.text);

            if let Some(item) = list_item(text) {
                let key = current
                    .as_ref()
                    .ok_or(FrontmatterError::OrphanListItem { line: number })?;
                let value = parse_list_element(item, number)?;
                match map.get_mut(key) {
                    Some(Value::Array(items)) => items.push(value),
                    _ => {
                        return Err(FrontmatterError::NotAList {
                            line: number,
                            key: key.clone(),
                        })
                    }
                }
                self.pos += 1;
                continue;
            }

            if line_indent > indent {
                return Err(FrontmatterError::UnexpectedIndent { line: number });
            }

            let (key, raw) =
                split_key_value(text).ok_or_else(|| FrontmatterError::MalformedLine {
                    line: number,
                    text: text.to_string(),
                })?;
            self.pos += 1;

            let value = if raw.is_empty() {
                match self.peek() {
                    Some(next) if next.indent > line_indent && list_item(next.text).is_none() => {
                        let nested_indent = next.indent;
                        Value::Object(self.parse_map(nested_indent)?)
                    }
                    _ => Value::Array(Vec::new()),
                }
            } else if is_flow_list(raw) {
                Value::Array(parse_flow_list(raw, number)?)
            } else {
                Value::String(raw.to_string())
            };

            map.insert(key.to_string(), value);
            current = Some(key.to_string());
        }
        Ok(map)
    }
}

fn list_item(text: &str) -> Option<&str> {
    if text == "-" {
        return Some("");
    }
    text.strip_prefix("- ").map(str::trim)
}

fn split_key_value(text: &str) -> Option<(&str, &str)> {
    let (key, value) = match text.find(": ") {
        Some(idx) => (&text[..idx], text[idx + 2..].trim()),
        None => (text.strip_suffix(':')?, ""),
    };
    let key = key.trim();
    (!key.is_empty()).then_some((key, value))
}

fn is_flow_list(raw: &str) -> bool {
    raw.starts_with('[') && raw.ends_with(']')
}

fn parse_list_element(item: &str, line: usize) -> Result<Value, FrontmatterError> {
    if is_flow_list(item) {
        Ok(Value::Array(parse_flow_list(item, line)?))
    } else {
        coerce_scalar(item, line)
    }
}

/// Parse `[a, "b, c", [1, 2]]`.
pub(crate) fn parse_flow_list(raw: &str, line: usize) -> Result<Vec<Value>, FrontmatterError> {
    let inner = &raw[1..raw.len() - 1];
    split_flow_items(inner, line)?
        .into_iter()
        .map(|item| {
            if item.starts_with('[') {
                if !item.ends_with(']') {
                    return Err(FrontmatterError::UnbalancedBrackets { line });
                }
                Ok(Value::Array(parse_flow_list(item, line)?))
            } else {
                coerce_scalar(item, line)
            }
        })
        .collect()
}

/// Split on top-level commas, honouring quotes and bracket depth.
fn split_flow_items(inner: &str, line: usize) -> Result<Vec<&str>, FrontmatterError> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;

    for (idx, c) in inner.char_indices() {
        if in_quotes {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_quotes = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_quotes = true,
            '[' => depth += 1,
            ']' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or(FrontmatterError::UnbalancedBrackets { line })?
            }
            ',' if depth == 0 => {
                items.push(inner[start..idx].trim());
                start = idx + 1;
            }
            _ => {}
        }
    }

    if in_quotes {
        return Err(FrontmatterError::UnterminatedQuote { line });
    }
    if depth != 0 {
        return Err(FrontmatterError::UnbalancedBrackets { line });
    }
    items.push(inner[start..].trim());
    items.retain(|item| !item.is_empty());
    Ok(items)
}

/// Coerce a list-element scalar.
pub(crate) fn coerce_scalar(raw: &str, line: usize) -> Result<Value, FrontmatterError> {
    if let Some(rest) = raw.strip_prefix('"') {
        let inner = rest
            .strip_suffix('"')
            .filter(|_| !ends_with_escape(rest))
            .ok_or(FrontmatterError::UnterminatedQuote { line })?;
        return Ok(Value::String(unescape(inner)));
    }
    Ok(match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        _ => parse_number(raw).unwrap_or_else(|| Value::String(raw.to_string())),
    })
}

/// True when the closing quote of `rest` is itself escaped.
fn ends_with_escape(rest: &str) -> bool {
    let Some(body) = rest.strip_suffix('"') else {
        return false;
    };
    body.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

pub(crate) fn parse_number(raw: &str) -> Option<Value> {
    let numeric_chars = raw
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E'));
    if !numeric_chars || !raw.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    if let Ok(int) = raw.parse::<i64>() {
        return Some(Value::Number(int.into()));
    }
    raw.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

fn unescape(inner: &str) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next) => out.push(next),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}
