use anyhow::{Context, Result};
use async_trait::async_trait;
use nostr_core::{sanitize_file_name, Event, EventHandler, KIND_METADATA};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use vault_frontmatter::FrontmatterCodec;

use crate::render::{profile_display_name, ProfileMetadata, ProfileRenderer};
use crate::store::{DocumentPath, DocumentStore};
use crate::titles::TitleIndex;

/// Kind 0: one document per pubkey, newest metadata wins.
pub struct ProfileHandler {
    store: Arc<dyn DocumentStore>,
    titles: Arc<TitleIndex>,
    codec: FrontmatterCodec,
    renderer: ProfileRenderer,
    dir: String,
    /// pubkey → created_at of the profile currently on disk
    newest: Mutex<HashMap<String, u64>>,
}

impl ProfileHandler {
    pub const PRIORITY: i32 = 0;

    pub fn new(
        store: Arc<dyn DocumentStore>,
        titles: Arc<TitleIndex>,
        codec: FrontmatterCodec,
        dir: impl Into<String>,
        reference_sections: bool,
    ) -> Self {
        Self {
            store,
            titles,
            renderer: ProfileRenderer::new(codec.clone(), reference_sections),
            codec,
            dir: dir.into(),
            newest: Mutex::new(HashMap::new()),
        }
    }

    /// `created_at` recorded in a document from an earlier run.
    fn stored_created_at(&self, existing: Option<&str>) -> Option<u64> {
        let doc = self.codec.parse(existing?);
        doc.frontmatter
            .get("created_at")
            .and_then(|v| v.as_str().and_then(|s| s.parse().ok()).or_else(|| v.as_u64()))
    }
}

#[async_trait]
impl EventHandler for ProfileHandler {
    fn kind(&self) -> u16 {
        KIND_METADATA
    }

    fn priority(&self) -> i32 {
        Self::PRIORITY
    }

    fn validate(&self, event: &Event) -> bool {
        event.kind == KIND_METADATA
            && !event.pubkey.is_empty()
            && ProfileMetadata::from_content(&event.content).is_some()
    }

    async fn process(&self, event: &Event) -> Result<()> {
        let seen = self.newest.lock().get(&event.pubkey).copied();
        if let Some(seen) = seen {
            if seen >= event.created_at {
                debug!("Ignoring older profile {} for {}", event.short_id(), event.pubkey);
                return Ok(());
            }
        }

        let meta = ProfileMetadata::from_content(&event.content)
            .with_context(|| format!("Profile {} is not a JSON object", event.short_id()))?;
        let display_name = profile_display_name(&meta, &event.pubkey);
        let title = self
            .titles
            .register_unique(&event.pubkey, &sanitize_file_name(&display_name));
        let path = DocumentPath::new(&self.dir, &title);

        let existing = self.store.read(&path).await?;
        if let Some(stored) = self.stored_created_at(existing.as_deref()) {
            if stored > event.created_at {
                debug!("Document {} already holds a newer profile", path);
                self.newest.lock().insert(event.pubkey.clone(), stored);
                return Ok(());
            }
        }

        let doc = self.renderer.render(
            &display_name,
            &event.pubkey,
            event.created_at,
            &meta,
            existing.as_deref(),
        );
        self.store
            .write(&path, &doc)
            .await
            .with_context(|| format!("Failed to write profile {}", path))?;
        self.newest
            .lock()
            .insert(event.pubkey.clone(), event.created_at);
        info!("Profile {} -> {}", display_name, path);
        Ok(())
    }

    fn name(&self) -> &str {
        "profile"
    }
}
