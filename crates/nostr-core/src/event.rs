//! The protocol event envelope handed to the dispatcher.
//!
//! This is a plain, serde-friendly mirror of the NIP-01 wire shape rather
//! than `nostr_sdk::Event`, so handlers and tests can build events without
//! signing them. Conversion from the nostr-sdk type is provided for callers
//! that receive events from a relay pool.

use nostr_sdk::JsonUtil;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind 0: user metadata (profile).
pub const KIND_METADATA: u16 = 0;
/// Kind 1: short text note.
pub const KIND_TEXT_NOTE: u16 = 1;

/// A raw tag: ordered strings, the first being the discriminator.
pub type Tag = Vec<String>;

/// Errors from decoding or verifying an event.
#[derive(Debug, Error)]
pub enum EventError {
    #[error("invalid event json: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("invalid signature for event {id}: {reason}")]
    InvalidSignature { id: String, reason: String },
}

/// Immutable signed protocol event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub pubkey: String,
    /// Unix seconds.
    pub created_at: u64,
    pub kind: u16,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub sig: String,
}

impl Event {
    pub fn from_json(json: &str) -> Result<Self, EventError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_value(value: &serde_json::Value) -> Result<Self, EventError> {
        Ok(Self::deserialize(value)?)
    }

    /// Values (second element) of every tag with the given discriminator.
    pub fn tag_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.tags
            .iter()
            .filter(move |tag| tag.first().map(String::as_str) == Some(name))
            .filter_map(|tag| tag.get(1).map(String::as_str))
    }

    /// First 8 chars of the id, for log lines.
    pub fn short_id(&self) -> &str {
        crate::text::short_hex(&self.id)
    }

    /// Check id and schnorr signature using nostr-sdk.
    pub fn verify_signature(&self) -> Result<(), EventError> {
        let json = serde_json::to_string(self)?;
        let invalid = |reason: String| EventError::InvalidSignature {
            id: self.id.clone(),
            reason,
        };
        let event = nostr_sdk::Event::from_json(json).map_err(|e| invalid(e.to_string()))?;
        event.verify().map_err(|e| invalid(e.to_string()))
    }
}

impl From<&nostr_sdk::Event> for Event {
    fn from(event: &nostr_sdk::Event) -> Self {
        Self {
            id: event.id.to_hex(),
            pubkey: event.pubkey.to_hex(),
            created_at: event.created_at.as_u64(),
            kind: event.kind.as_u16(),
            tags: event
                .tags
                .iter()
                .map(|tag| tag.as_slice().to_vec())
                .collect(),
            content: event.content.clone(),
            sig: event.sig.to_string(),
        }
    }
}
