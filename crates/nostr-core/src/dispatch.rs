//! Ordered, batched delivery of events to kind-specific handlers.
//!
//! Delivery is strictly sequential: every `process` call is awaited before
//! the next event is touched, so a handler with a higher `priority` number
//! can rely on every lower-number handler having seen the events that
//! share its call (profiles before notes, for example).
//!
//! Ordering is computed from a snapshot of the registry taken when a
//! delivery call starts. Events whose kind has no handler sort last, and
//! ties keep input order.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::event::Event;

/// Capability implemented by every per-kind processor.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Event kind this handler owns.
    fn kind(&self) -> u16;

    /// Lower numbers are delivered first.
    fn priority(&self) -> i32;

    /// Shape check. Returning false drops the event silently.
    fn validate(&self, event: &Event) -> bool;

    async fn process(&self, event: &Event) -> Result<()>;

    /// Called once per end-of-stored-events.
    async fn cleanup(&self) -> Result<()> {
        Ok(())
    }

    /// Name used in log lines.
    fn name(&self) -> &str {
        "handler"
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("a handler for kind {0} is already registered")]
    DuplicateKind(u16),
}

/// Result of a cancellable batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub chunks_total: usize,
    pub chunks_processed: usize,
    /// Events that reached a handler's `process`.
    pub delivered: usize,
    pub cancelled: bool,
}

/// Registry of one handler per kind plus the delivery loops.
#[derive(Default)]
pub struct EventDispatcher {
    // Registration order is the tie-breaker for equal priorities.
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any handler for the same kind.
    /// The replaced handler keeps its registration slot and is returned.
    pub fn register_handler(
        &mut self,
        handler: Arc<dyn EventHandler>,
    ) -> Option<Arc<dyn EventHandler>> {
        let kind = handler.kind();
        match self.handlers.iter_mut().find(|h| h.kind() == kind) {
            Some(slot) => {
                warn!(
                    "Replacing handler '{}' for kind {} with '{}'",
                    slot.name(),
                    kind,
                    handler.name()
                );
                Some(std::mem::replace(slot, handler))
            }
            None => {
                debug!("Registered handler '{}' for kind {}", handler.name(), kind);
                self.handlers.push(handler);
                None
            }
        }
    }

    /// Register a handler, refusing to replace an existing one.
    pub fn try_register_handler(
        &mut self,
        handler: Arc<dyn EventHandler>,
    ) -> std::result::Result<(), DispatchError> {
        if self.has_handler(handler.kind()) {
            return Err(DispatchError::DuplicateKind(handler.kind()));
        }
        self.register_handler(handler);
        Ok(())
    }

    pub fn has_handler(&self, kind: u16) -> bool {
        self.handlers.iter().any(|h| h.kind() == kind)
    }

    pub fn get_handler(&self, kind: u16) -> Option<Arc<dyn EventHandler>> {
        self.handlers.iter().find(|h| h.kind() == kind).cloned()
    }

    /// Handlers by ascending priority, ties in registration order.
    pub fn ordered_handlers(&self) -> Vec<Arc<dyn EventHandler>> {
        let mut ordered = self.handlers.clone();
        ordered.sort_by_key(|h| h.priority());
        ordered
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Drop every registered handler.
    pub fn reset(&mut self) {
        self.handlers.clear();
    }

    /// Deliver one event if a handler exists and accepts it.
    /// Returns whether the handler's `process` ran.
    pub async fn process_event(&self, event: &Event) -> Result<bool> {
        let Some(handler) = self.handlers.iter().find(|h| h.kind() == event.kind) else {
            debug!("No handler for kind {}, skipping {}", event.kind, event.short_id());
            return Ok(false);
        };
        if !handler.validate(event) {
            debug!(
                "Handler '{}' rejected event {}",
                handler.name(),
                event.short_id()
            );
            return Ok(false);
        }
        handler.process(event).await?;
        Ok(true)
    }

    /// Order a slice by the current priority snapshot.
    pub fn order_events<'a>(&self, events: &'a [Event]) -> Vec<&'a Event> {
        let snapshot: HashMap<u16, i32> = self
            .handlers
            .iter()
            .map(|h| (h.kind(), h.priority()))
            .collect();

        let mut ordered: Vec<&Event> = events.iter().collect();
        // Stable: ties keep input order.
        ordered.sort_by_key(|e| match snapshot.get(&e.kind) {
            Some(priority) => (false, *priority),
            None => (true, 0),
        });
        ordered
    }

    /// Deliver events sequentially in priority order.
    /// Returns how many events reached a handler.
    pub async fn process_events(&self, events: &[Event]) -> Result<usize> {
        let mut delivered = 0;
        for event in self.order_events(events) {
            if self.process_event(event).await? {
                delivered += 1;
            }
        }
        Ok(delivered)
    }

    /// Deliver events in fixed-size chunks, ordering each chunk on its own.
    /// `delay` pauses after each chunk. A `batch_size` of zero means one chunk.
    pub async fn process_batch(
        &self,
        events: &[Event],
        batch_size: usize,
        delay: Option<Duration>,
    ) -> Result<usize> {
        let outcome = self.run_batch(events, batch_size, delay, None).await?;
        Ok(outcome.delivered)
    }

    /// Like [`process_batch`](Self::process_batch) but stops before the next
    /// chunk once `cancel` fires, including mid-pause. A chunk that has
    /// started always runs to completion.
    pub async fn process_batch_cancellable(
        &self,
        events: &[Event],
        batch_size: usize,
        delay: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<BatchOutcome> {
        self.run_batch(events, batch_size, delay, Some(cancel)).await
    }

    async fn run_batch(
        &self,
        events: &[Event],
        batch_size: usize,
        delay: Option<Duration>,
        cancel: Option<&CancellationToken>,
    ) -> Result<BatchOutcome> {
        let size = if batch_size == 0 {
            events.len().max(1)
        } else {
            batch_size
        };
        let mut outcome = BatchOutcome {
            chunks_total: events.len().div_ceil(size),
            ..Default::default()
        };

        for (idx, chunk) in events.chunks(size).enumerate() {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                outcome.cancelled = true;
                break;
            }

            outcome.delivered += self.process_events(chunk).await?;
            outcome.chunks_processed += 1;
            debug!(
                "Chunk {}/{} done ({} events)",
                idx + 1,
                outcome.chunks_total,
                chunk.len()
            );

            // Every chunk, the last included, is followed by the pause.
            if let Some(pause) = delay {
                match cancel {
                    Some(token) => {
                        tokio::select! {
                            _ = token.cancelled() => {
                                // Nothing left to skip after the last chunk.
                                outcome.cancelled = idx + 1 < outcome.chunks_total;
                                break;
                            }
                            _ = tokio::time::sleep(pause) => {}
                        }
                    }
                    None => tokio::time::sleep(pause).await,
                }
            }
        }

        if outcome.cancelled {
            info!(
                "Batch cancelled after {}/{} chunks",
                outcome.chunks_processed, outcome.chunks_total
            );
        }
        Ok(outcome)
    }

    /// End of stored events: run every handler's cleanup, one at a time.
    pub async fn handle_eose(&self) -> Result<()> {
        for handler in &self.handlers {
            debug!("Running cleanup for '{}'", handler.name());
            handler.cleanup().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    struct RecordingHandler {
        label: &'static str,
        kind: u16,
        priority: i32,
        accept: bool,
        fail_on: Option<&'static str>,
        log: Log,
    }

    impl RecordingHandler {
        fn new(label: &'static str, kind: u16, priority: i32, log: &Log) -> Self {
            Self {
                label,
                kind,
                priority,
                accept: true,
                fail_on: None,
                log: log.clone(),
            }
        }
    }

    #[async_trait]
    impl EventHandler for RecordingHandler {
        fn kind(&self) -> u16 {
            self.kind
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn validate(&self, _event: &Event) -> bool {
            self.accept
        }

        async fn process(&self, event: &Event) -> Result<()> {
            if self.fail_on == Some(event.id.as_str()) {
                anyhow::bail!("boom on {}", event.id);
            }
            self.log.lock().push(format!("{}:{}", self.label, event.id));
            Ok(())
        }

        async fn cleanup(&self) -> Result<()> {
            self.log.lock().push(format!("cleanup:{}", self.label));
            Ok(())
        }

        fn name(&self) -> &str {
            self.label
        }
    }

    fn event(id: &str, kind: u16) -> Event {
        Event {
            id: id.to_string(),
            pubkey: "pk".to_string(),
            created_at: 0,
            kind,
            tags: vec![],
            content: String::new(),
            sig: String::new(),
        }
    }

    fn dispatcher_with_profile_and_note(log: &Log) -> EventDispatcher {
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register_handler(Arc::new(RecordingHandler::new("note", 1, 10, log)));
        dispatcher.register_handler(Arc::new(RecordingHandler::new("profile", 0, 0, log)));
        dispatcher
    }

    #[tokio::test]
    async fn orders_by_priority_with_unknown_last_and_stable_ties() {
        let log: Log = Arc::default();
        let dispatcher = dispatcher_with_profile_and_note(&log);
        let events = vec![
            event("n1", 1),
            event("x1", 7),
            event("p1", 0),
            event("n2", 1),
            event("p2", 0),
        ];

        let ordered: Vec<_> = dispatcher
            .order_events(&events)
            .iter()
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(ordered, vec!["p1", "p2", "n1", "n2", "x1"]);

        let delivered = dispatcher.process_events(&events).await.unwrap();
        assert_eq!(delivered, 4);
        assert_eq!(
            *log.lock(),
            vec!["profile:p1", "profile:p2", "note:n1", "note:n2"]
        );
    }

    #[tokio::test]
    async fn rejected_events_are_skipped_silently() {
        let log: Log = Arc::default();
        let mut dispatcher = EventDispatcher::new();
        let mut picky = RecordingHandler::new("picky", 1, 0, &log);
        picky.accept = false;
        dispatcher.register_handler(Arc::new(picky));

        assert!(!dispatcher.process_event(&event("a", 1)).await.unwrap());
        assert!(!dispatcher.process_event(&event("b", 2)).await.unwrap());
        assert!(log.lock().is_empty());
    }

    #[tokio::test]
    async fn batch_ordering_is_local_to_each_chunk() {
        let events = vec![event("note", 1), event("profile", 0)];

        let log: Log = Arc::default();
        let dispatcher = dispatcher_with_profile_and_note(&log);
        dispatcher.process_batch(&events, 1, None).await.unwrap();
        assert_eq!(*log.lock(), vec!["note:note", "profile:profile"]);

        let log: Log = Arc::default();
        let dispatcher = dispatcher_with_profile_and_note(&log);
        dispatcher.process_batch(&events, 2, None).await.unwrap();
        assert_eq!(*log.lock(), vec!["profile:profile", "note:note"]);
    }

    #[tokio::test]
    async fn zero_batch_size_is_one_chunk() {
        let log: Log = Arc::default();
        let dispatcher = dispatcher_with_profile_and_note(&log);
        let events = vec![event("note", 1), event("profile", 0)];
        let delivered = dispatcher.process_batch(&events, 0, None).await.unwrap();
        assert_eq!(delivered, 2);
        assert_eq!(*log.lock(), vec!["profile:profile", "note:note"]);
    }

    #[tokio::test(start_paused = true)]
    async fn batch_pauses_after_each_chunk() {
        let log: Log = Arc::default();
        let dispatcher = dispatcher_with_profile_and_note(&log);
        let events = vec![event("a", 1), event("b", 1), event("c", 1)];

        let started = tokio::time::Instant::now();
        dispatcher
            .process_batch(&events, 1, Some(Duration::from_millis(500)))
            .await
            .unwrap();
        // One pause per chunk, the final one included.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(1500));
        assert!(elapsed < Duration::from_millis(2000));
        assert_eq!(log.lock().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_final_pause_is_not_a_cancelled_batch() {
        let log: Log = Arc::default();
        let dispatcher = dispatcher_with_profile_and_note(&log);
        let events = vec![event("a", 1)];
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let started = tokio::time::Instant::now();
        let outcome = dispatcher
            .process_batch_cancellable(&events, 1, Some(Duration::from_secs(60)), &cancel)
            .await
            .unwrap();
        assert!(started.elapsed() < Duration::from_secs(60));
        assert!(!outcome.cancelled);
        assert_eq!(outcome.chunks_processed, 1);
        assert_eq!(outcome.delivered, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_before_next_chunk() {
        let log: Log = Arc::default();
        let dispatcher = dispatcher_with_profile_and_note(&log);
        let events = vec![event("a", 1), event("b", 1), event("c", 1)];
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let outcome = dispatcher
            .process_batch_cancellable(&events, 1, Some(Duration::from_secs(60)), &cancel)
            .await
            .unwrap();
        assert!(outcome.cancelled);
        assert_eq!(outcome.chunks_total, 3);
        assert_eq!(outcome.chunks_processed, 1);
        assert_eq!(outcome.delivered, 1);
        assert_eq!(*log.lock(), vec!["note:a"]);
    }

    #[tokio::test]
    async fn handler_errors_propagate_without_rollback() {
        let log: Log = Arc::default();
        let mut dispatcher = EventDispatcher::new();
        let mut failing = RecordingHandler::new("note", 1, 0, &log);
        failing.fail_on = Some("bad");
        dispatcher.register_handler(Arc::new(failing));

        let events = vec![event("ok1", 1), event("ok2", 1), event("bad", 1), event("never", 1)];
        let err = dispatcher.process_batch(&events, 2, None).await.unwrap_err();
        assert!(err.to_string().contains("boom on bad"));
        assert_eq!(*log.lock(), vec!["note:ok1", "note:ok2"]);
    }

    #[tokio::test]
    async fn eose_runs_every_cleanup() {
        let log: Log = Arc::default();
        let dispatcher = dispatcher_with_profile_and_note(&log);
        dispatcher.handle_eose().await.unwrap();
        let mut calls = log.lock().clone();
        calls.sort();
        assert_eq!(calls, vec!["cleanup:note", "cleanup:profile"]);
    }

    #[test]
    fn registration_replaces_and_reset_clears() {
        let log: Log = Arc::default();
        let mut dispatcher = dispatcher_with_profile_and_note(&log);
        assert_eq!(dispatcher.len(), 2);

        let replaced =
            dispatcher.register_handler(Arc::new(RecordingHandler::new("note2", 1, 5, &log)));
        assert_eq!(replaced.unwrap().name(), "note");
        assert_eq!(dispatcher.len(), 2);
        assert_eq!(dispatcher.get_handler(1).unwrap().name(), "note2");
        assert!(dispatcher.get_handler(3).is_none());

        let err = dispatcher
            .try_register_handler(Arc::new(RecordingHandler::new("dup", 0, 0, &log)))
            .unwrap_err();
        assert_eq!(err, DispatchError::DuplicateKind(0));

        dispatcher.reset();
        assert!(dispatcher.is_empty());
        assert!(!dispatcher.has_handler(0));
        assert!(!dispatcher.has_handler(1));
    }

    #[test]
    fn ordered_handlers_break_ties_by_registration() {
        let log: Log = Arc::default();
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register_handler(Arc::new(RecordingHandler::new("b", 2, 5, &log)));
        dispatcher.register_handler(Arc::new(RecordingHandler::new("a", 1, 5, &log)));
        dispatcher.register_handler(Arc::new(RecordingHandler::new("c", 3, 1, &log)));
        let names: Vec<_> = dispatcher
            .ordered_handlers()
            .iter()
            .map(|h| h.name().to_string())
            .collect();
        assert_eq!(names, vec!["c", "b", "a"]);
    }
}
