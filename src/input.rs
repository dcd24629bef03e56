//! Decoding of ingest input.
//!
//! Accepted shapes: a JSON array of events, or one item per line where an
//! item is either a bare event object or a relay wire message.

use nostr_core::{parse_relay_message, Event, RelayMessage};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum InputItem {
    Event(Event),
    /// The relay finished sending stored events.
    EndOfStoredEvents,
}

pub fn parse_input(text: &str) -> Vec<InputItem> {
    if text.trim_start().starts_with('[') {
        if let Ok(events) = serde_json::from_str::<Vec<Event>>(text) {
            return events.into_iter().map(InputItem::Event).collect();
        }
    }

    let mut items = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with('{') {
            match Event::from_json(line) {
                Ok(event) => items.push(InputItem::Event(event)),
                Err(e) => warn!("Line {}: {}", idx + 1, e),
            }
            continue;
        }
        match parse_relay_message(line) {
            RelayMessage::Event { event, .. } => items.push(InputItem::Event(event)),
            RelayMessage::EndOfStoredEvents { sub_id } => {
                debug!("EOSE for subscription {}", sub_id);
                items.push(InputItem::EndOfStoredEvents);
            }
            RelayMessage::Notice { message } => info!("Relay notice: {}", message),
            RelayMessage::Ok { event_id, accepted, message } => {
                debug!("OK {} accepted={} {}", event_id, accepted, message)
            }
            RelayMessage::Unknown(_) => warn!("Line {}: unrecognised input, skipped", idx + 1),
        }
    }
    items
}
