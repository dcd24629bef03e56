//! Turning records into Markdown documents.
//!
//! Every document is `# <title>`, the frontmatter block, the body, then any
//! non-empty sections, separated by blank lines.

pub mod note;
pub mod profile;

pub use note::{NoteContext, NoteRecord, NoteRenderer};
pub use profile::{profile_display_name, ProfileMetadata, ProfileRenderer};

use vault_frontmatter::{Frontmatter, FrontmatterCodec};

/// Frontmatter of a previously written document, empty if there is none.
pub(crate) fn existing_frontmatter(codec: &FrontmatterCodec, existing: Option<&str>) -> Frontmatter {
    existing
        .map(|text| codec.parse(text).frontmatter)
        .unwrap_or_default()
}

/// Join non-empty parts with a blank line and end with a newline.
pub(crate) fn assemble(parts: Vec<String>) -> String {
    let mut doc = parts
        .into_iter()
        .filter(|part| !part.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");
    doc.push('\n');
    doc
}

/// `### heading` followed by one `- item` line per entry.
pub(crate) fn bullet_block(heading: &str, items: &[String]) -> Option<String> {
    if items.is_empty() {
        return None;
    }
    let mut block = format!("### {heading}");
    for item in items {
        block.push_str("\n- ");
        block.push_str(item);
    }
    Some(block)
}

/// `## title` followed by the present sub-blocks, or `None` if all are empty.
pub(crate) fn section(title: &str, blocks: Vec<Option<String>>) -> Option<String> {
    let blocks: Vec<String> = blocks.into_iter().flatten().collect();
    if blocks.is_empty() {
        return None;
    }
    Some(format!("## {title}\n\n{}", blocks.join("\n\n")))
}
