//! Shared Nostr protocol functionality for nostr-vault
//!
//! This crate provides the event envelope, relay message parsing, typed
//! tag references, and the dispatcher that delivers events to per-kind
//! handlers in priority order.

pub mod dispatch;
pub mod event;
pub mod references;
pub mod relay;
pub mod text;

// Re-export commonly used types
pub use dispatch::{BatchOutcome, DispatchError, EventDispatcher, EventHandler};
pub use event::{Event, EventError, Tag, KIND_METADATA, KIND_TEXT_NOTE};
pub use references::{
    extract_references, group_references, scan_hashtags, topic_tags, GroupedReferences,
    ReferenceType, TagReference,
};
pub use relay::{parse_relay_message, EventDedup, RelayMessage};
pub use text::{
    clean_content, derive_title, sanitize_file_name, short_hex, single_line, truncate_chars,
    wiki_link,
};

// Re-export nostr-sdk for convenience
pub use nostr_sdk;
