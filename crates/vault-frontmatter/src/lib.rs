//! Frontmatter for vault documents.
//!
//! A small hand-rolled grammar rather than YAML: documents written by
//! earlier versions must keep reading back exactly, including the rule
//! that top-level scalars are kept as raw strings while list elements are
//! coerced.

mod codec;
mod error;
mod merge;
mod notice;
mod parse;
mod serialize;

pub use codec::FrontmatterCodec;
pub use error::FrontmatterError;
pub use merge::merge_frontmatter;
pub use notice::{Notifier, RecordingNotifier, TracingNotifier};
pub use parse::{parse_block, parse_document};
pub use serialize::{is_plain_scalar, serialize_block, serialize_frontmatter};

/// Insertion-ordered key/value block.
pub type Frontmatter = serde_json::Map<String, serde_json::Value>;

/// A document split into its frontmatter and the text after it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedDocument {
    pub frontmatter: Frontmatter,
    pub body: String,
}
