//! Wiring of store, title index, handlers and dispatcher.

use anyhow::Result;
use nostr_core::{BatchOutcome, Event, EventDedup, EventDispatcher};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use vault_frontmatter::{FrontmatterCodec, Notifier};

use crate::config::Config;
use crate::handlers::{NoteHandler, ProfileHandler};
use crate::input::InputItem;
use crate::store::DocumentStore;
use crate::titles::TitleIndex;

/// Ids remembered for duplicate suppression within one run.
const DEDUP_CAPACITY: usize = 100_000;

#[derive(Debug, Clone, Copy, Default)]
pub struct IngestOptions {
    /// Drop events whose id or signature does not check out.
    pub verify: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub received: usize,
    pub duplicates: usize,
    pub rejected: usize,
    pub delivered: usize,
    pub cancelled: bool,
}

pub struct Vault {
    dispatcher: EventDispatcher,
    titles: Arc<TitleIndex>,
    batch_size: usize,
    batch_delay: Option<Duration>,
}

impl Vault {
    /// Build the handlers over `store`, seeding titles from documents that
    /// are already there.
    pub async fn open(
        config: &Config,
        store: Arc<dyn DocumentStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let codec = FrontmatterCodec::new(notifier);
        let titles = Arc::new(TitleIndex::new());
        let profiles = titles
            .seed_from_store(store.as_ref(), &codec, &config.vault.profiles_dir, "pubkey")
            .await?;
        let notes = titles
            .seed_from_store(store.as_ref(), &codec, &config.vault.notes_dir, "id")
            .await?;
        info!("Indexed {} existing profiles and {} notes", profiles, notes);

        let mut dispatcher = EventDispatcher::new();
        dispatcher.try_register_handler(Arc::new(ProfileHandler::new(
            store.clone(),
            titles.clone(),
            codec.clone(),
            config.vault.profiles_dir.clone(),
            config.render.profile_reference_sections,
        )))?;
        dispatcher.try_register_handler(Arc::new(NoteHandler::new(
            store,
            titles.clone(),
            codec,
            config.vault.notes_dir.clone(),
        )))?;

        Ok(Self {
            dispatcher,
            titles,
            batch_size: config.ingest.batch_size,
            batch_delay: config.batch_delay(),
        })
    }

    pub fn titles(&self) -> &Arc<TitleIndex> {
        &self.titles
    }

    /// Deliver events in configured batches.
    pub async fn ingest(&self, events: &[Event], cancel: &CancellationToken) -> Result<BatchOutcome> {
        self.dispatcher
            .process_batch_cancellable(events, self.batch_size, self.batch_delay, cancel)
            .await
    }

    pub async fn end_of_stored_events(&self) -> Result<()> {
        self.dispatcher.handle_eose().await
    }

    /// Process decoded input. Events are buffered until an EOSE marker or
    /// the end of input, then delivered as one batched run followed by
    /// cleanup. Cleanup also runs after cancellation so written documents
    /// are left consistent.
    pub async fn run(
        &self,
        items: Vec<InputItem>,
        options: IngestOptions,
        cancel: &CancellationToken,
    ) -> Result<IngestSummary> {
        let mut summary = IngestSummary::default();
        let mut dedup = EventDedup::new(DEDUP_CAPACITY);
        let mut pending = Vec::new();

        for item in items {
            match item {
                InputItem::Event(event) => {
                    summary.received += 1;
                    if !dedup.check_and_insert(&event.id) {
                        summary.duplicates += 1;
                        continue;
                    }
                    if options.verify {
                        if let Err(e) = event.verify_signature() {
                            warn!("Dropping event: {}", e);
                            summary.rejected += 1;
                            continue;
                        }
                    }
                    pending.push(event);
                }
                InputItem::EndOfStoredEvents => {
                    if !self.flush(&mut pending, &mut summary, cancel).await? {
                        break;
                    }
                }
            }
        }

        if !summary.cancelled {
            self.flush(&mut pending, &mut summary, cancel).await?;
        }
        if summary.cancelled {
            self.end_of_stored_events().await?;
        }
        Ok(summary)
    }

    /// Deliver and clean up. Returns false once cancelled.
    async fn flush(
        &self,
        pending: &mut Vec<Event>,
        summary: &mut IngestSummary,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let events = std::mem::take(pending);
        let outcome = self.ingest(&events, cancel).await?;
        summary.delivered += outcome.delivered;
        if outcome.cancelled {
            summary.cancelled = true;
            return Ok(false);
        }
        self.end_of_stored_events().await?;
        Ok(true)
    }
}
