//! Typed cross-references extracted from raw event tags.
//!
//! Follows NIP-10 for `e` tags: marked tags (`root`, `reply`, `mention`)
//! are taken at their word, unmarked tags fall back to the positional
//! scheme. `p` and `q` tags are mentions, `t` tags are topics.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::event::Tag;

static HASHTAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#(\w+)").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceType {
    Root,
    Reply,
    Mention,
    Topic,
}

impl ReferenceType {
    pub const ALL: [ReferenceType; 4] = [
        ReferenceType::Root,
        ReferenceType::Reply,
        ReferenceType::Mention,
        ReferenceType::Topic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceType::Root => "root",
            ReferenceType::Reply => "reply",
            ReferenceType::Mention => "mention",
            ReferenceType::Topic => "topic",
        }
    }

    /// Parse a NIP-10 marker keyword.
    pub fn from_marker(marker: &str) -> Option<Self> {
        match marker {
            "root" => Some(ReferenceType::Root),
            "reply" => Some(ReferenceType::Reply),
            "mention" => Some(ReferenceType::Mention),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReferenceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed link derived from one raw tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagReference {
    pub ref_type: ReferenceType,
    pub target_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relay_hint: Option<String>,
}

impl TagReference {
    pub fn new(ref_type: ReferenceType, target_id: impl Into<String>) -> Self {
        Self {
            ref_type,
            target_id: target_id.into(),
            marker: None,
            relay_hint: None,
        }
    }
}

fn non_empty(tag: &Tag, idx: usize) -> Option<&str> {
    tag.get(idx).map(String::as_str).filter(|s| !s.is_empty())
}

fn is_event_tag(tag: &Tag) -> bool {
    tag.first().map(String::as_str) == Some("e") && non_empty(tag, 1).is_some()
}

fn has_known_marker(tag: &Tag) -> bool {
    non_empty(tag, 3)
        .and_then(ReferenceType::from_marker)
        .is_some()
}

/// Classify raw tags into references, in tag order.
pub fn extract_references(tags: &[Tag]) -> Vec<TagReference> {
    let event_tags: Vec<&Tag> = tags.iter().filter(|t| is_event_tag(t)).collect();
    let marked_style = event_tags.iter().any(|t| has_known_marker(t));
    let unmarked_total = event_tags.iter().filter(|t| !has_known_marker(t)).count();
    let mut unmarked_seen = 0;

    let mut refs = Vec::new();
    for tag in tags {
        let Some(target) = non_empty(tag, 1) else {
            continue;
        };
        let relay_hint = non_empty(tag, 2).map(str::to_string);

        match tag.first().map(String::as_str) {
            Some("e") => {
                let marker = non_empty(tag, 3);
                let ref_type = match marker.and_then(ReferenceType::from_marker) {
                    Some(ref_type) => ref_type,
                    None if marked_style => ReferenceType::Mention,
                    None => {
                        let position = unmarked_seen;
                        unmarked_seen += 1;
                        positional_type(position, unmarked_total)
                    }
                };
                refs.push(TagReference {
                    ref_type,
                    target_id: target.to_string(),
                    marker: marker.map(str::to_string),
                    relay_hint,
                });
            }
            Some("p") | Some("q") => refs.push(TagReference {
                ref_type: ReferenceType::Mention,
                target_id: target.to_string(),
                marker: None,
                relay_hint,
            }),
            Some("t") => refs.push(TagReference::new(
                ReferenceType::Topic,
                target.to_lowercase(),
            )),
            _ => {}
        }
    }
    refs
}

/// Deprecated positional NIP-10: one tag is the reply target; with more,
/// first is root, last is reply, the rest are mentions.
fn positional_type(position: usize, total: usize) -> ReferenceType {
    if total == 1 || position + 1 == total {
        ReferenceType::Reply
    } else if position == 0 {
        ReferenceType::Root
    } else {
        ReferenceType::Mention
    }
}

/// References partitioned by type, each group in original order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupedReferences {
    pub root: Vec<TagReference>,
    pub reply: Vec<TagReference>,
    pub mention: Vec<TagReference>,
    pub topic: Vec<TagReference>,
}

impl GroupedReferences {
    pub fn get(&self, ref_type: ReferenceType) -> &[TagReference] {
        match ref_type {
            ReferenceType::Root => &self.root,
            ReferenceType::Reply => &self.reply,
            ReferenceType::Mention => &self.mention,
            ReferenceType::Topic => &self.topic,
        }
    }

    fn get_mut(&mut self, ref_type: ReferenceType) -> &mut Vec<TagReference> {
        match ref_type {
            ReferenceType::Root => &mut self.root,
            ReferenceType::Reply => &mut self.reply,
            ReferenceType::Mention => &mut self.mention,
            ReferenceType::Topic => &mut self.topic,
        }
    }

    /// First reference of a type by list position.
    pub fn first(&self, ref_type: ReferenceType) -> Option<&TagReference> {
        self.get(ref_type).first()
    }

    pub fn targets(&self, ref_type: ReferenceType) -> Vec<String> {
        self.get(ref_type)
            .iter()
            .map(|r| r.target_id.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        ReferenceType::ALL.iter().all(|t| self.get(*t).is_empty())
    }
}

/// Partition a reference list by type, preserving order within each group.
pub fn group_references(refs: &[TagReference]) -> GroupedReferences {
    let mut grouped = GroupedReferences::default();
    for reference in refs {
        grouped.get_mut(reference.ref_type).push(reference.clone());
    }
    grouped
}

/// Hashtags in free text, without the leading `#`, in order of appearance.
pub fn scan_hashtags(content: &str) -> Vec<String> {
    HASHTAG_RE
        .captures_iter(content)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Union of raw `t` tags and content hashtags, lowercased and deduped.
/// Raw tags come first.
pub fn topic_tags(tags: &[Tag], content: &str) -> Vec<String> {
    let raw = tags
        .iter()
        .filter(|tag| tag.first().map(String::as_str) == Some("t"))
        .filter_map(|tag| non_empty(tag, 1).map(str::to_string));

    let mut seen = HashSet::new();
    raw.chain(scan_hashtags(content))
        .map(|t| t.to_lowercase())
        .filter(|t| seen.insert(t.clone()))
        .collect()
}
