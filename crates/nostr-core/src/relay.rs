//! Parsing of relay wire messages.
//!
//! The transport itself lives with the caller; this only turns the JSON
//! arrays a relay sends into typed messages:
//! - `["EVENT", <sub_id>, <event>]`
//! - `["EOSE", <sub_id>]`
//! - `["NOTICE", <message>]`
//! - `["OK", <event_id>, <accepted>, <message>]`

use std::collections::{HashSet, VecDeque};

use crate::event::Event;

/// Parsed relay message types.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayMessage {
    Event { sub_id: String, event: Event },
    /// End of stored events; real-time events follow.
    EndOfStoredEvents { sub_id: String },
    Notice { message: String },
    Ok {
        event_id: String,
        accepted: bool,
        message: String,
    },
    /// Unparseable or unsupported message, kept verbatim.
    Unknown(String),
}

/// Parse one relay message.
pub fn parse_relay_message(msg: &str) -> RelayMessage {
    let parsed: serde_json::Value = match serde_json::from_str(msg) {
        Ok(v) => v,
        Err(_) => return RelayMessage::Unknown(msg.to_string()),
    };

    let Some(arr) = parsed.as_array() else {
        return RelayMessage::Unknown(msg.to_string());
    };
    let str_at = |idx: usize| {
        arr.get(idx)
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string()
    };

    match arr.first().and_then(|v| v.as_str()) {
        Some("EVENT") => {
            let Some(raw) = arr.get(2) else {
                return RelayMessage::Unknown(msg.to_string());
            };
            match Event::from_value(raw) {
                Ok(event) => RelayMessage::Event {
                    sub_id: str_at(1),
                    event,
                },
                Err(_) => RelayMessage::Unknown(msg.to_string()),
            }
        }
        Some("EOSE") => RelayMessage::EndOfStoredEvents { sub_id: str_at(1) },
        Some("NOTICE") => RelayMessage::Notice { message: str_at(1) },
        Some("OK") => RelayMessage::Ok {
            event_id: str_at(1),
            accepted: arr.get(2).and_then(|v| v.as_bool()).unwrap_or(false),
            message: str_at(3),
        },
        _ => RelayMessage::Unknown(msg.to_string()),
    }
}

/// Tracks seen event ids so a stream replayed from several relays is
/// only delivered once. Oldest ids are forgotten first at capacity.
pub struct EventDedup {
    seen: HashSet<String>,
    order: VecDeque<String>,
    max_size: usize,
}

impl EventDedup {
    pub fn new(max_size: usize) -> Self {
        Self {
            seen: HashSet::new(),
            order: VecDeque::new(),
            max_size: max_size.max(1),
        }
    }

    /// Returns true if the event is new (not seen before).
    pub fn check_and_insert(&mut self, event_id: &str) -> bool {
        if self.seen.contains(event_id) {
            return false;
        }
        while self.seen.len() >= self.max_size {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.seen.remove(&oldest);
                }
                None => break,
            }
        }
        self.seen.insert(event_id.to_string());
        self.order.push_back(event_id.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
