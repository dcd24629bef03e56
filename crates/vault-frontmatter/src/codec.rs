//! Error-containing boundary around the parser and serializer.

use std::sync::Arc;

use tracing::warn;

use crate::merge::merge_frontmatter;
use crate::notice::Notifier;
use crate::parse::{parse_document, DELIMITER};
use crate::serialize::serialize_frontmatter;
use crate::{Frontmatter, ParsedDocument};

/// Parses, serializes and merges frontmatter without ever failing.
///
/// Errors are logged, reported once through the notifier and answered
/// with a fallback so a single bad document cannot stall ingestion.
#[derive(Clone)]
pub struct FrontmatterCodec {
    notifier: Arc<dyn Notifier>,
}

impl FrontmatterCodec {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    /// Parse a document. On error: empty frontmatter, whole text as body.
    pub fn parse(&self, text: &str) -> ParsedDocument {
        match parse_document(text) {
            Ok(doc) => doc,
            Err(e) => {
                warn!("Failed to parse frontmatter: {e}");
                self.notifier
                    .notice(&format!("Could not read document properties: {e}"));
                ParsedDocument {
                    frontmatter: Frontmatter::new(),
                    body: text.to_string(),
                }
            }
        }
    }

    /// Serialize to `"---\n<block>\n---"`. On error: `"---\n---"`.
    pub fn stringify(&self, frontmatter: &Frontmatter) -> String {
        match serialize_frontmatter(frontmatter) {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to serialize frontmatter: {e}");
                self.notifier
                    .notice(&format!("Could not write document properties: {e}"));
                format!("{DELIMITER}\n{DELIMITER}")
            }
        }
    }

    pub fn merge(&self, existing: &Frontmatter, required: &Frontmatter) -> Frontmatter {
        merge_frontmatter(existing, required)
    }
}

impl std::fmt::Debug for FrontmatterCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrontmatterCodec").finish_non_exhaustive()
    }
}
