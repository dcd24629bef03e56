//! Id → title resolution for wiki links.
//!
//! Titles double as document file stems, so the index keeps them unique
//! across the whole vault (case-insensitively, as most filesystems do).

use anyhow::Result;
use async_trait::async_trait;
use nostr_core::short_hex;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;
use vault_frontmatter::FrontmatterCodec;

use crate::store::DocumentStore;

/// Resolves an event id or pubkey to the title of its document.
#[async_trait]
pub trait TitleLookup: Send + Sync {
    async fn title_by_id(&self, id: &str) -> Option<String>;
}

#[derive(Default)]
struct Titles {
    by_id: HashMap<String, String>,
    /// lowercased title → owning id
    owners: HashMap<String, String>,
}

#[derive(Default)]
pub struct TitleIndex {
    inner: RwLock<Titles>,
}

impl TitleIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<String> {
        self.inner.read().by_id.get(id).cloned()
    }

    /// Record a title as-is, replacing any previous title for `id`.
    pub fn insert(&self, id: &str, title: &str) {
        let mut titles = self.inner.write();
        if let Some(old) = titles.by_id.insert(id.to_string(), title.to_string()) {
            titles.owners.remove(&old.to_lowercase());
        }
        titles.owners.insert(title.to_lowercase(), id.to_string());
    }

    /// Claim a title for `id`.
    ///
    /// An id that already has a title keeps it. Otherwise `candidate` is
    /// used, suffixed with ` (<short id>)` when another id owns it.
    pub fn register_unique(&self, id: &str, candidate: &str) -> String {
        let mut titles = self.inner.write();
        if let Some(existing) = titles.by_id.get(id) {
            return existing.clone();
        }

        let mut title = candidate.to_string();
        if titles.owners.contains_key(&title.to_lowercase()) {
            title = format!("{} ({})", candidate, short_hex(id));
        }
        if titles.owners.contains_key(&title.to_lowercase()) {
            title = format!("{} ({})", candidate, id);
        }

        titles.owners.insert(title.to_lowercase(), id.to_string());
        titles.by_id.insert(id.to_string(), title.clone());
        title
    }

    pub fn len(&self) -> usize {
        self.inner.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().by_id.is_empty()
    }

    /// Load titles of documents already in `dir`, keyed by the string value
    /// of `id_key` in their frontmatter. Returns how many were loaded.
    pub async fn seed_from_store(
        &self,
        store: &dyn DocumentStore,
        codec: &FrontmatterCodec,
        dir: &str,
        id_key: &str,
    ) -> Result<usize> {
        let mut loaded = 0;
        for path in store.list(dir).await? {
            let Some(text) = store.read(&path).await? else {
                continue;
            };
            let doc = codec.parse(&text);
            match doc.frontmatter.get(id_key).and_then(|v| v.as_str()) {
                Some(id) if !id.is_empty() => {
                    self.insert(id, &path.stem);
                    loaded += 1;
                }
                _ => debug!("No `{}` in {}, not indexed", id_key, path),
            }
        }
        Ok(loaded)
    }
}

#[async_trait]
impl TitleLookup for TitleIndex {
    async fn title_by_id(&self, id: &str) -> Option<String> {
        self.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DocumentPath, MemoryDocumentStore};
    use std::sync::Arc;
    use vault_frontmatter::RecordingNotifier;

    const ID_A: &str = "aaaaaaaa11111111111111111111111111111111111111111111111111111111";
    const ID_B: &str = "bbbbbbbb22222222222222222222222222222222222222222222222222222222";

    #[test]
    fn collisions_get_short_id_suffix() {
        let index = TitleIndex::new();
        assert_eq!(index.register_unique(ID_A, "GM"), "GM");
        assert_eq!(index.register_unique(ID_B, "gm"), "gm (bbbbbbbb)");
        assert_eq!(index.get(ID_B).as_deref(), Some("gm (bbbbbbbb)"));
    }

    #[test]
    fn known_id_keeps_its_title() {
        let index = TitleIndex::new();
        index.register_unique(ID_A, "First");
        assert_eq!(index.register_unique(ID_A, "Second"), "First");
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn insert_releases_old_title() {
        let index = TitleIndex::new();
        index.insert(ID_A, "Old");
        index.insert(ID_A, "New");
        assert_eq!(index.register_unique(ID_B, "Old"), "Old");
    }

    #[tokio::test]
    async fn seeds_from_existing_documents() {
        let store = MemoryDocumentStore::new();
        store.insert(
            DocumentPath::new("notes", "Hello"),
            format!("# Hello\n\n---\nid: {ID_A}\n---\nbody"),
        );
        store.insert(DocumentPath::new("notes", "Loose"), "no frontmatter");
        let codec = FrontmatterCodec::new(Arc::new(RecordingNotifier::new()));

        let index = TitleIndex::new();
        let loaded = index
            .seed_from_store(&store, &codec, "notes", "id")
            .await
            .unwrap();
        assert_eq!(loaded, 1);
        assert_eq!(index.title_by_id(ID_A).await.as_deref(), Some("Hello"));
        assert_eq!(index.title_by_id(ID_B).await, None);
    }
}
