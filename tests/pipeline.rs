//! End-to-end ingest over a temporary vault directory.

use nostr_core::Event;
use nostr_sdk::{EventBuilder, Keys, Metadata};
use nostr_vault::*;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use vault_frontmatter::RecordingNotifier;

const ALICE: &str = "a11ce00000000000000000000000000000000000000000000000000000000000";

fn event(id: &str, kind: u16, created_at: u64, content: &str, tags: Vec<Vec<&str>>) -> Event {
    Event {
        id: id.to_string(),
        pubkey: ALICE.to_string(),
        created_at,
        kind,
        tags: tags
            .into_iter()
            .map(|t| t.into_iter().map(String::from).collect())
            .collect(),
        content: content.to_string(),
        sig: String::new(),
    }
}

fn hex_id(c: char) -> String {
    c.to_string().repeat(64)
}

async fn open(tmp: &TempDir) -> (Vault, Arc<RecordingNotifier>) {
    let mut config = Config::default();
    config.vault.dir = tmp.path().display().to_string();
    let notifier = Arc::new(RecordingNotifier::new());
    let store = Arc::new(FsDocumentStore::new(tmp.path()));
    let vault = Vault::open(&config, store, notifier.clone()).await.unwrap();
    (vault, notifier)
}

fn read(tmp: &TempDir, rel: &str) -> String {
    std::fs::read_to_string(tmp.path().join(rel)).unwrap()
}

#[tokio::test]
async fn test_profile_resolves_before_notes() {
    let tmp = TempDir::new().unwrap();
    let (vault, notifier) = open(&tmp).await;

    // Note first in input order; the profile handler's priority wins.
    let items = vec![
        InputItem::Event(event(&hex_id('1'), 1, 100, "Hello vault #Rust", vec![vec!["t", "nostr"]])),
        InputItem::Event(event(&hex_id('0'), 0, 90, r#"{"display_name":"Alice A","about":"hi"}"#, vec![])),
    ];
    let summary = vault
        .run(items, IngestOptions::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.delivered, 2);
    assert!(!summary.cancelled);

    let note = read(&tmp, "notes/Hello vault Rust.md");
    assert!(note.starts_with("# Hello vault Rust\n\n---\n"));
    assert!(note.contains("author: Alice A\n"));
    assert!(note.contains("tags:\n  - nostr\n  - rust\n"));
    assert!(note.contains("### Topics\n- #nostr"));

    let profile = read(&tmp, "people/Alice A.md");
    assert!(profile.contains(&format!("aliases:\n  - {ALICE}\n")));
    assert!(profile.ends_with("---\n\nhi\n"));
    assert!(notifier.is_empty());
}

#[tokio::test]
async fn test_rerun_keeps_user_keys_and_links_to_existing_titles() {
    let tmp = TempDir::new().unwrap();
    let parent = hex_id('a');
    {
        let (vault, _) = open(&tmp).await;
        let items = vec![InputItem::Event(event(&parent, 1, 100, "Original thought", vec![]))];
        vault
            .run(items, IngestOptions::default(), &CancellationToken::new())
            .await
            .unwrap();
    }

    // Hand edit: add a key to the frontmatter.
    let path = tmp.path().join("notes/Original thought.md");
    let edited = read(&tmp, "notes/Original thought.md").replacen("---\n", "---\nrating: 5\n", 1);
    std::fs::write(&path, edited).unwrap();

    let (vault, notifier) = open(&tmp).await;
    assert_eq!(vault.titles().get(&parent).as_deref(), Some("Original thought"));

    let items = vec![
        InputItem::Event(event(&parent, 1, 100, "Original thought", vec![])),
        InputItem::Event(event(&hex_id('b'), 1, 200, "A reply", vec![vec!["e", &parent, "", "reply"]])),
    ];
    vault
        .run(items, IngestOptions::default(), &CancellationToken::new())
        .await
        .unwrap();

    let original = read(&tmp, "notes/Original thought.md");
    assert!(original.contains("rating: 5\n"));
    assert!(original.contains("### Replies\n- [[A reply]]"));
    assert!(original.contains("- Next: [[A reply]]"));

    let reply = read(&tmp, "notes/A reply.md");
    assert!(reply.contains("reply_to: Original thought\n"));
    assert!(notifier.is_empty());
}

#[tokio::test]
async fn test_verify_and_dedup() {
    let tmp = TempDir::new().unwrap();
    let (vault, _) = open(&tmp).await;

    let keys = Keys::generate();
    let signed = EventBuilder::text_note("Signed note")
        .sign_with_keys(&keys)
        .unwrap();
    let good = Event::from(&signed);
    let mut forged = Event::from(
        &EventBuilder::metadata(&Metadata::new().name("mallory"))
            .sign_with_keys(&keys)
            .unwrap(),
    );
    forged.content = r#"{"name":"not mallory"}"#.to_string();

    let items = vec![
        InputItem::Event(good.clone()),
        InputItem::Event(good),
        InputItem::Event(forged),
    ];
    let summary = vault
        .run(items, IngestOptions { verify: true }, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        summary,
        IngestSummary {
            received: 3,
            duplicates: 1,
            rejected: 1,
            delivered: 1,
            cancelled: false,
        }
    );
    assert!(tmp.path().join("notes/Signed note.md").is_file());
    assert!(!tmp.path().join("people").exists());
}

#[tokio::test]
async fn test_cancelled_run_delivers_nothing() {
    let tmp = TempDir::new().unwrap();
    let (vault, _) = open(&tmp).await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let items = vec![InputItem::Event(event(&hex_id('c'), 1, 1, "never", vec![]))];
    let summary = vault.run(items, IngestOptions::default(), &cancel).await.unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.delivered, 0);
    assert!(!tmp.path().join("notes").exists());
}

#[tokio::test]
async fn test_relay_stream_with_eose() {
    let tmp = TempDir::new().unwrap();
    let (vault, _) = open(&tmp).await;

    let first = serde_json::to_string(&event(&hex_id('d'), 1, 10, "Before EOSE", vec![])).unwrap();
    let second = serde_json::to_string(&event(&hex_id('e'), 1, 20, "After EOSE", vec![])).unwrap();
    let text = format!("[\"EVENT\",\"sub\",{first}]\n[\"EOSE\",\"sub\"]\n{second}\n");

    let summary = vault
        .run(parse_input(&text), IngestOptions::default(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary.delivered, 2);

    let before = read(&tmp, "notes/Before EOSE.md");
    assert!(before.contains("- Next: [[After EOSE]]"));
}
