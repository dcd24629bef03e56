//! Side channel for user-facing notices.

use parking_lot::Mutex;

/// Fire-and-forget sink for short user-facing messages.
pub trait Notifier: Send + Sync {
    fn notice(&self, message: &str);
}

/// Production notifier: notices become `warn` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notice(&self, message: &str) {
        tracing::warn!(target: "notice", "{message}");
    }
}

/// Collects notices in memory for assertions.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }
}

impl Notifier for RecordingNotifier {
    fn notice(&self, message: &str) {
        self.messages.lock().push(message.to_string());
    }
}
