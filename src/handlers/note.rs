use anyhow::{Context, Result};
use async_trait::async_trait;
use nostr_core::{sanitize_file_name, Event, EventHandler, ReferenceType, TagReference, KIND_TEXT_NOTE};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::ops::Bound;
use std::sync::Arc;
use tracing::{debug, info};
use vault_frontmatter::FrontmatterCodec;

use crate::render::{NoteContext, NoteRecord, NoteRenderer};
use crate::store::{DocumentPath, DocumentStore};
use crate::titles::TitleIndex;

#[derive(Default)]
struct NoteState {
    records: HashMap<String, NoteRecord>,
    /// (created_at, id), oldest first
    timeline: BTreeSet<(u64, String)>,
    /// target id → references other notes make to it
    incoming: HashMap<String, Vec<TagReference>>,
    /// Ids to re-render at the next cleanup, in the order they were queued.
    pending: Vec<String>,
    queued: HashSet<String>,
}

/// Kind 1: one document per note, re-rendered at end of stream once
/// neighbours and backlinks are known.
pub struct NoteHandler {
    store: Arc<dyn DocumentStore>,
    titles: Arc<TitleIndex>,
    renderer: NoteRenderer,
    dir: String,
    state: Mutex<NoteState>,
}

impl NoteHandler {
    pub const PRIORITY: i32 = 10;

    pub fn new(
        store: Arc<dyn DocumentStore>,
        titles: Arc<TitleIndex>,
        codec: FrontmatterCodec,
        dir: impl Into<String>,
    ) -> Self {
        Self {
            store,
            renderer: NoteRenderer::new(codec, titles.clone()),
            titles,
            dir: dir.into(),
            state: Mutex::new(NoteState::default()),
        }
    }

    fn title_of(&self, id: &str) -> String {
        self.titles.get(id).unwrap_or_else(|| id.to_string())
    }

    fn context(&self, record: &NoteRecord) -> NoteContext {
        let state = self.state.lock();
        let key = (record.created_at, record.id.clone());
        let previous = state
            .timeline
            .range(..key.clone())
            .next_back()
            .map(|(_, id)| self.title_of(id));
        let next = state
            .timeline
            .range((Bound::Excluded(key), Bound::Unbounded))
            .next()
            .map(|(_, id)| self.title_of(id));

        NoteContext {
            title: self.title_of(&record.id),
            author: self.titles.get(&record.pubkey),
            previous,
            next,
            incoming: state.incoming.get(&record.id).cloned().unwrap_or_default(),
        }
    }

    async fn write_note(&self, record: &NoteRecord) -> Result<()> {
        let ctx = self.context(record);
        let path = DocumentPath::new(&self.dir, &ctx.title);
        let existing = self.store.read(&path).await?;
        let doc = self.renderer.render(record, &ctx, existing.as_deref()).await;
        self.store
            .write(&path, &doc)
            .await
            .with_context(|| format!("Failed to write note {}", path))
    }

    /// Update the indexes and queue the note, plus every known note whose
    /// timeline or backlinks it changes, for the next cleanup.
    fn track(&self, record: &NoteRecord) {
        let mut state = self.state.lock();
        let mut affected = vec![record.id.clone()];

        for reference in &record.references {
            if reference.ref_type == ReferenceType::Topic || reference.target_id == record.id {
                continue;
            }
            let backlinks = state
                .incoming
                .entry(reference.target_id.clone())
                .or_default();
            let known = backlinks
                .iter()
                .any(|r| r.target_id == record.id && r.ref_type == reference.ref_type);
            if !known {
                backlinks.push(TagReference::new(reference.ref_type, record.id.clone()));
            }
            affected.push(reference.target_id.clone());
        }

        let key = (record.created_at, record.id.clone());
        state.timeline.insert(key.clone());
        let previous = state.timeline.range(..key.clone()).next_back().cloned();
        let next = state
            .timeline
            .range((Bound::Excluded(key), Bound::Unbounded))
            .next()
            .cloned();
        affected.extend(previous.into_iter().chain(next).map(|(_, id)| id));

        state.records.insert(record.id.clone(), record.clone());
        for id in affected {
            if state.records.contains_key(&id) && state.queued.insert(id.clone()) {
                state.pending.push(id);
            }
        }
    }
}

#[async_trait]
impl EventHandler for NoteHandler {
    fn kind(&self) -> u16 {
        KIND_TEXT_NOTE
    }

    fn priority(&self) -> i32 {
        Self::PRIORITY
    }

    fn validate(&self, event: &Event) -> bool {
        event.kind == KIND_TEXT_NOTE && !event.id.is_empty() && !event.pubkey.is_empty()
    }

    async fn process(&self, event: &Event) -> Result<()> {
        let record = NoteRecord::from_event(event);
        let title = self
            .titles
            .register_unique(&record.id, &sanitize_file_name(&record.suggested_title()));
        self.track(&record);
        self.write_note(&record).await?;
        debug!("Note {} -> {}", event.short_id(), title);
        Ok(())
    }

    async fn cleanup(&self) -> Result<()> {
        let records: Vec<NoteRecord> = {
            let mut state = self.state.lock();
            let pending = std::mem::take(&mut state.pending);
            state.queued.clear();
            pending
                .into_iter()
                .filter_map(|id| state.records.get(&id).cloned())
                .collect()
        };
        if records.is_empty() {
            return Ok(());
        }
        for record in &records {
            self.write_note(record).await?;
        }
        info!("Re-rendered {} notes with timeline and backlinks", records.len());
        Ok(())
    }

    fn name(&self) -> &str {
        "note"
    }
}
