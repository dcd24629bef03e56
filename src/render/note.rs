use chrono::{DateTime, SecondsFormat, Utc};
use nostr_core::{
    clean_content, derive_title, extract_references, group_references, topic_tags, wiki_link,
    Event, GroupedReferences, ReferenceType, Tag, TagReference,
};
use serde_json::{json, Value};
use std::sync::Arc;
use vault_frontmatter::{Frontmatter, FrontmatterCodec};

use super::{assemble, bullet_block, existing_frontmatter, section};
use crate::titles::TitleLookup;

/// The parts of a text note a document is built from.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteRecord {
    pub id: String,
    pub pubkey: String,
    pub created_at: u64,
    pub kind: u16,
    pub content: String,
    /// Raw tags, verbatim.
    pub tags: Vec<Tag>,
    /// Outgoing references in tag order.
    pub references: Vec<TagReference>,
    /// `t` tags plus content hashtags, lowercased and deduped.
    pub topics: Vec<String>,
}

impl NoteRecord {
    pub fn from_event(event: &Event) -> Self {
        Self {
            id: event.id.clone(),
            pubkey: event.pubkey.clone(),
            created_at: event.created_at,
            kind: event.kind,
            content: event.content.clone(),
            tags: event.tags.clone(),
            references: extract_references(&event.tags),
            topics: topic_tags(&event.tags, &event.content),
        }
    }

    pub fn suggested_title(&self) -> String {
        derive_title(&self.content, &self.id)
    }

    pub fn outgoing(&self) -> GroupedReferences {
        group_references(&self.references)
    }
}

/// Everything about a note that depends on other notes.
#[derive(Debug, Clone, Default)]
pub struct NoteContext {
    pub title: String,
    /// Title of the author's profile document, if known.
    pub author: Option<String>,
    pub previous: Option<String>,
    pub next: Option<String>,
    /// References other notes make to this one; `target_id` is the
    /// referring note.
    pub incoming: Vec<TagReference>,
}

pub struct NoteRenderer {
    codec: FrontmatterCodec,
    titles: Arc<dyn TitleLookup>,
}

impl NoteRenderer {
    pub fn new(codec: FrontmatterCodec, titles: Arc<dyn TitleLookup>) -> Self {
        Self { codec, titles }
    }

    async fn resolve(&self, id: &str) -> String {
        self.titles
            .title_by_id(id)
            .await
            .unwrap_or_else(|| id.to_string())
    }

    async fn links(&self, refs: &[TagReference]) -> Vec<String> {
        let mut links = Vec::with_capacity(refs.len());
        for reference in refs {
            links.push(wiki_link(&self.resolve(&reference.target_id).await));
        }
        links
    }

    /// Keys this renderer owns. They overwrite whatever the document had.
    pub async fn required_frontmatter(&self, record: &NoteRecord, ctx: &NoteContext) -> Frontmatter {
        let outgoing = record.outgoing();
        let mut fm = Frontmatter::new();

        fm.insert("title".into(), json!(ctx.title));
        fm.insert("id".into(), json!(record.id));
        fm.insert("pubkey".into(), json!(record.pubkey));
        if let Some(author) = &ctx.author {
            fm.insert("author".into(), json!(author));
        }
        fm.insert("created_at".into(), json!(record.created_at));
        if let Some(date) = rfc3339(record.created_at) {
            fm.insert("date".into(), Value::String(date));
        }
        fm.insert("kind".into(), json!(record.kind));
        fm.insert("tags".into(), json!(record.topics));
        if let Some(root) = outgoing.first(ReferenceType::Root) {
            fm.insert("root".into(), json!(self.resolve(&root.target_id).await));
        }
        if let Some(reply) = outgoing.first(ReferenceType::Reply) {
            fm.insert("reply_to".into(), json!(self.resolve(&reply.target_id).await));
        }
        fm.insert("mentions".into(), json!(outgoing.targets(ReferenceType::Mention)));
        fm.insert("topics".into(), json!(outgoing.targets(ReferenceType::Topic)));
        fm.insert("nostr_tags".into(), json!(record.tags));
        fm
    }

    /// Render the full document, merged onto `existing` if given.
    pub async fn render(&self, record: &NoteRecord, ctx: &NoteContext, existing: Option<&str>) -> String {
        let required = self.required_frontmatter(record, ctx).await;
        let merged = self
            .codec
            .merge(&existing_frontmatter(&self.codec, existing), &required);

        let outgoing = record.outgoing();
        let incoming = group_references(&ctx.incoming);

        let mut timeline = Vec::new();
        if let Some(previous) = &ctx.previous {
            timeline.push(format!("- Previous: {}", wiki_link(previous)));
        }
        if let Some(next) = &ctx.next {
            timeline.push(format!("- Next: {}", wiki_link(next)));
        }
        let timeline = (!timeline.is_empty())
            .then(|| format!("## Timeline\n\n{}", timeline.join("\n")));

        let topics: Vec<String> = outgoing
            .get(ReferenceType::Topic)
            .iter()
            .map(|t| format!("#{}", t.target_id))
            .collect();
        let references = section(
            "References",
            vec![
                bullet_block("Thread Root", &self.links(outgoing.get(ReferenceType::Root)).await),
                bullet_block("Replying To", &self.links(outgoing.get(ReferenceType::Reply)).await),
                bullet_block("Mentions", &self.links(outgoing.get(ReferenceType::Mention)).await),
                bullet_block("Topics", &topics),
            ],
        );

        // A note naming this one as thread root is a reply too.
        let mut replies = incoming.reply.clone();
        for root_ref in &incoming.root {
            if !replies.iter().any(|r| r.target_id == root_ref.target_id) {
                replies.push(root_ref.clone());
            }
        }
        let backlinks = section(
            "Backlinks",
            vec![
                bullet_block("Replies", &self.links(&replies).await),
                bullet_block("Mentioned In", &self.links(incoming.get(ReferenceType::Mention)).await),
            ],
        );

        assemble(vec![
            format!("# {}", ctx.title),
            self.codec.stringify(&merged),
            clean_content(&record.content),
            timeline.unwrap_or_default(),
            references.unwrap_or_default(),
            backlinks.unwrap_or_default(),
        ])
    }
}

fn rfc3339(created_at: u64) -> Option<String> {
    let secs = i64::try_from(created_at).ok()?;
    DateTime::<Utc>::from_timestamp(secs, 0).map(|d| d.to_rfc3339_opts(SecondsFormat::Secs, true))
}
