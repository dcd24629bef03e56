//! Serializer for the frontmatter block. Output re-parses to the same map
//! under [`parse_block`](crate::parse_block); values the grammar cannot
//! express are rejected instead of being written.

use serde_json::Value;

use crate::error::FrontmatterError;
use crate::parse::{coerce_scalar, DELIMITER};
use crate::Frontmatter;

const INDENT: usize = 2;

/// Serialize a map into the delimited block `"---\n<block>\n---"`.
pub fn serialize_frontmatter(map: &Frontmatter) -> Result<String, FrontmatterError> {
    let block = serialize_block(map)?;
    if block.is_empty() {
        return Ok(format!("{DELIMITER}\n{DELIMITER}"));
    }
    Ok(format!("{DELIMITER}\n{block}\n{DELIMITER}"))
}

/// Serialize the lines between the delimiters.
pub fn serialize_block(map: &Frontmatter) -> Result<String, FrontmatterError> {
    let mut lines = Vec::new();
    write_map(&mut lines, map, 0)?;
    Ok(lines.join("\n"))
}

fn write_map(lines: &mut Vec<String>, map: &Frontmatter, depth: usize) -> Result<(), FrontmatterError> {
    let pad = " ".repeat(depth * INDENT);
    for (key, value) in map {
        check_key(key)?;
        match value {
            Value::Null => continue,
            Value::String(s) if s.is_empty() => continue,
            Value::Object(inner) if inner.is_empty() => continue,
            Value::String(s) => {
                if s.contains(['\n', '\r']) {
                    return Err(FrontmatterError::MultilineValue(key.clone()));
                }
                if !is_plain_scalar(s) {
                    return Err(FrontmatterError::UnrepresentableValue(key.clone()));
                }
                lines.push(format!("{pad}{key}: {s}"));
            }
            Value::Bool(b) => lines.push(format!("{pad}{key}: {b}")),
            Value::Number(n) => lines.push(format!("{pad}{key}: {n}")),
            Value::Array(items) if items.is_empty() => lines.push(format!("{pad}{key}: []")),
            Value::Array(items) => {
                lines.push(format!("{pad}{key}:"));
                for item in items {
                    let rendered = match item {
                        Value::Array(nested) => flow_list(nested, key)?,
                        other => block_item(other, key)?,
                    };
                    lines.push(format!("{pad}  - {rendered}"));
                }
            }
            Value::Object(inner) => {
                let mut nested = Vec::new();
                write_map(&mut nested, inner, depth + 1)?;
                // A bare `key:` would read back as an empty list.
                if nested.is_empty() {
                    continue;
                }
                lines.push(format!("{pad}{key}:"));
                lines.extend(nested);
            }
        }
    }
    Ok(())
}

/// True when `s` reads back unchanged as a `key: value` scalar.
///
/// Such values are never quoted, so padding, whitespace-only text and
/// `[...]` shapes (which parse as lists) cannot be written.
pub fn is_plain_scalar(s: &str) -> bool {
    !s.is_empty()
        && s.trim() == s
        && !s.contains(['\n', '\r'])
        && !(s.starts_with('[') && s.ends_with(']'))
}

fn check_key(key: &str) -> Result<(), FrontmatterError> {
    let bad = key.is_empty()
        || key.trim() != key
        || key.contains(": ")
        || key.ends_with(':')
        || key.starts_with('#')
        || key.starts_with('-')
        || key.contains(['\n', '\r']);
    if bad {
        return Err(FrontmatterError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// `- item` rendering: bare unless the bare text would read back as
/// something other than the same string.
fn block_item(value: &Value, key: &str) -> Result<String, FrontmatterError> {
    match value {
        Value::String(s) => {
            if s.contains(['\n', '\r']) {
                return Err(FrontmatterError::MultilineValue(key.to_string()));
            }
            if needs_quotes(s) {
                Ok(quote(s))
            } else {
                Ok(s.clone())
            }
        }
        Value::Object(_) => Err(FrontmatterError::UnsupportedValue(key.to_string())),
        other => Ok(other.to_string()),
    }
}

/// `[v1, v2]` rendering: strings always quoted, everything else bare.
fn flow_list(items: &[Value], key: &str) -> Result<String, FrontmatterError> {
    let rendered = items
        .iter()
        .map(|item| match item {
            Value::String(s) => {
                if s.contains(['\n', '\r']) {
                    return Err(FrontmatterError::MultilineValue(key.to_string()));
                }
                Ok(quote(s))
            }
            Value::Array(nested) => flow_list(nested, key),
            Value::Object(_) => Err(FrontmatterError::UnsupportedValue(key.to_string())),
            other => Ok(other.to_string()),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(format!("[{}]", rendered.join(", ")))
}

fn needs_quotes(s: &str) -> bool {
    s.is_empty()
        || s.trim() != s
        || s.starts_with('"')
        || s.starts_with('[')
        || !matches!(coerce_scalar(s, 0), Ok(Value::String(ref back)) if back == s)
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_block;
    use serde_json::json;

    fn map(value: Value) -> Frontmatter {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn scalars_and_skips() {
        let fm = map(json!({
            "title": "Hello: world",
            "empty": "",
            "missing": null,
            "kind": 1,
            "draft": false
        }));
        assert_eq!(
            serialize_block(&fm).unwrap(),
            "title: Hello: world\nkind: 1\ndraft: false"
        );
    }

    #[test]
    fn lists() {
        let fm = map(json!({
            "none": [],
            "tags": ["bitcoin", "nostr"],
            "mixed": ["42", 42, "true", "", " pad", "\"q"]
        }));
        assert_eq!(
            serialize_block(&fm).unwrap(),
            "none: []\ntags:\n  - bitcoin\n  - nostr\nmixed:\n  - \"42\"\n  - 42\n  - \"true\"\n  - \"\"\n  - \" pad\"\n  - \"\\\"q\""
        );
    }

    #[test]
    fn nested_lists_quote_strings() {
        let fm = map(json!({
            "nostr_tags": [["e", "abc", "", "root"], ["p", "def"], "loose"]
        }));
        assert_eq!(
            serialize_block(&fm).unwrap(),
            "nostr_tags:\n  - [\"e\", \"abc\", \"\", \"root\"]\n  - [\"p\", \"def\"]\n  - loose"
        );
    }

    #[test]
    fn nested_maps_indent() {
        let fm = map(json!({"meta": {"source": "relay", "hints": ["a"], "inner": {"x": 1}}}));
        assert_eq!(
            serialize_block(&fm).unwrap(),
            "meta:\n  source: relay\n  hints:\n    - a\n  inner:\n    x: 1"
        );
    }

    #[test]
    fn empty_map_is_minimal_block() {
        assert_eq!(serialize_frontmatter(&Frontmatter::new()).unwrap(), "---\n---");
    }

    #[test]
    fn rejects_inexpressible_values() {
        let fm = map(json!({"body": "two\nlines"}));
        assert_eq!(
            serialize_block(&fm),
            Err(FrontmatterError::MultilineValue("body".to_string()))
        );
        let fm = map(json!({"list": [{"a": 1}]}));
        assert_eq!(
            serialize_block(&fm),
            Err(FrontmatterError::UnsupportedValue("list".to_string()))
        );
        let fm = map(json!({"bad: key": 1}));
        assert!(matches!(serialize_block(&fm), Err(FrontmatterError::InvalidKey(_))));
    }

    #[test]
    fn rejects_scalars_that_would_not_read_back() {
        for value in ["[bot]", "   ", " padded", "trailing "] {
            let fm = map(json!({ "name": value }));
            assert_eq!(
                serialize_block(&fm),
                Err(FrontmatterError::UnrepresentableValue("name".to_string())),
                "{value:?}"
            );
        }
        let fm = map(json!({"meta": {"name": "[x]"}}));
        assert_eq!(
            serialize_block(&fm),
            Err(FrontmatterError::UnrepresentableValue("name".to_string()))
        );
    }

    #[test]
    fn plain_scalars() {
        assert!(is_plain_scalar("[bot"));
        assert!(is_plain_scalar("a [b]"));
        assert!(is_plain_scalar("\"quoted\""));
        assert!(!is_plain_scalar(""));
        assert!(!is_plain_scalar("[bot]"));
        assert!(!is_plain_scalar("two\nlines"));
    }

    #[test]
    fn map_of_skipped_values_is_dropped() {
        let fm = map(json!({"meta": {"a": null, "b": ""}, "k": "v"}));
        assert_eq!(serialize_block(&fm).unwrap(), "k: v");
    }

    #[test]
    fn serializer_output_round_trips() {
        let fm = map(json!({
            "title": "A note: with colon",
            "id": "0123",
            "created_at": 1700000000,
            "tags": ["bitcoin", "1234", "null", "with \"quote\""],
            "nostr_tags": [["e", "x", "", "reply"], [1, true, null]],
            "nested": {"a": "b", "list": ["c"], "deep": {"d": "e"}},
            "none": [],
            "handle": "[bot",
            "bracketed": "a [b]",
            "spaced": "a  b"
        }));
        let text = serialize_block(&fm).unwrap();
        let parsed = parse_block(&text).unwrap();
        assert_eq!(serialize_block(&parsed).unwrap(), text);
        for key in ["title", "handle", "bracketed", "spaced"] {
            assert_eq!(parsed[key], fm[key], "{key}");
        }
        assert_eq!(
            parsed.keys().collect::<Vec<_>>(),
            fm.keys().collect::<Vec<_>>()
        );
        assert_eq!(parsed["tags"], fm["tags"]);
        assert_eq!(parsed["nostr_tags"], fm["nostr_tags"]);
        assert_eq!(parsed["nested"], fm["nested"]);
        // Top-level scalars come back as raw strings.
        assert_eq!(parsed["created_at"], json!("1700000000"));
    }
}
