//! nostr-vault: turns streams of Nostr events into cross-linked Markdown
//! documents.
//!
//! Events flow through [`nostr_core::EventDispatcher`] to the kind-specific
//! [`handlers`], which render documents with [`render`] and persist them
//! through a [`store::DocumentStore`]. Re-running over the same vault keeps
//! frontmatter keys users added by hand.

pub mod config;
pub mod handlers;
pub mod input;
pub mod render;
pub mod store;
pub mod titles;
pub mod vault;

pub use config::Config;
pub use input::{parse_input, InputItem};
pub use store::{DocumentPath, DocumentStore, FsDocumentStore, MemoryDocumentStore};
pub use titles::{TitleIndex, TitleLookup};
pub use vault::{IngestOptions, IngestSummary, Vault};
