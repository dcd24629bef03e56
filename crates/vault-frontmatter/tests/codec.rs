use std::sync::Arc;

use serde_json::{json, Value};
use vault_frontmatter::*;

fn map(value: Value) -> Frontmatter {
    match value {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

#[test]
fn test_document_round_trip() {
    let notifier = Arc::new(RecordingNotifier::new());
    let codec = FrontmatterCodec::new(notifier.clone());

    let fm = map(json!({
        "title": "Thoughts on zaps",
        "id": "5c83da77af1dec6d7289834998ad7aafbd9e2191396d75ec3cc27f5a77226f36",
        "created_at": "1700000000",
        "kind": "1",
        "tags": ["bitcoin", "lightning"],
        "root": "Genesis note",
        "mentions": [],
        "nostr_tags": [["e", "abc", "wss://relay.example", "root"], ["t", "bitcoin"]]
    }));

    let block = codec.stringify(&fm);
    let document = format!("# Thoughts on zaps\n\n{block}\n\nZaps are neat.\n");
    let parsed = codec.parse(&document);

    assert_eq!(parsed.frontmatter, fm);
    assert_eq!(parsed.body, "\nZaps are neat.\n");
    assert_eq!(codec.stringify(&parsed.frontmatter), block);
    assert!(notifier.is_empty());
}

#[test]
fn test_user_keys_survive_rewrite() {
    let codec = FrontmatterCodec::new(Arc::new(TracingNotifier));
    let on_disk = "---\ntitle: Old title\nrating: 5\nreviewed:\n  - yes\n---\nMy own notes";
    let existing = codec.parse(on_disk);

    let required = map(json!({"title": "New title", "kind": "1"}));
    let merged = codec.merge(&existing.frontmatter, &required);

    assert_eq!(
        codec.stringify(&merged),
        "---\ntitle: New title\nrating: 5\nreviewed:\n  - yes\nkind: 1\n---"
    );
    assert_eq!(existing.body, "My own notes");
}

#[test]
fn test_merge_law() {
    let merged = merge_frontmatter(&map(json!({"a": 1, "b": 2})), &map(json!({"b": 3, "c": 4})));
    assert_eq!(Value::Object(merged), json!({"a": 1, "b": 3, "c": 4}));
}

#[test]
fn test_broken_document_is_kept_verbatim() {
    let notifier = Arc::new(RecordingNotifier::new());
    let codec = FrontmatterCodec::new(notifier.clone());
    let text = "---\ntags: [unclosed, \"quote]\n---\nbody";

    let parsed = codec.parse(text);
    assert!(parsed.frontmatter.is_empty());
    assert_eq!(parsed.body, text);
    assert_eq!(notifier.messages().len(), 1);
}

#[test]
fn test_plain_text_is_all_body() {
    let parsed = parse_document("no frontmatter here\n---\nstill body").unwrap();
    assert!(parsed.frontmatter.is_empty());
    assert_eq!(parsed.body, "no frontmatter here\n---\nstill body");
}
