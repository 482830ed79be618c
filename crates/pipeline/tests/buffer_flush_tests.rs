//! Integration tests for the consumer-side outage path: events buffered
//! during a store outage and flushed once the store recovers, including the
//! accepted mid-flush loss window.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use casework_core::audit::action_types;
use casework_events::{AuditEvent, DomainEvent, EventSink, SinkError};
use casework_pipeline::{BufferFlushService, ConnectionStateTracker, EventBuffer};
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Test doubles and helpers
// ---------------------------------------------------------------------------

/// Sink that records saves and can be scripted to reject one position.
struct RecordingSink {
    saved: Mutex<Vec<DomainEvent>>,
    fail_on_nth: AtomicUsize,
    calls: AtomicUsize,
}

impl RecordingSink {
    fn new() -> Arc<Self> {
        Arc::new(RecordingSink {
            saved: Mutex::new(Vec::new()),
            fail_on_nth: AtomicUsize::new(usize::MAX),
            calls: AtomicUsize::new(0),
        })
    }

    /// Rejects the nth save (1-based) with a persistence error.
    fn failing_on(nth: usize) -> Arc<Self> {
        let sink = Self::new();
        sink.fail_on_nth.store(nth, Ordering::Relaxed);
        sink
    }

    fn saved(&self) -> Vec<DomainEvent> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn save(&self, event: &DomainEvent) -> Result<(), SinkError> {
        let call = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        if call == self.fail_on_nth.load(Ordering::Relaxed) {
            return Err(SinkError::Persistence("scripted rejection".to_string()));
        }
        self.saved.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Sink that marks the store unavailable after a number of saves, emulating
/// an outage that begins in the middle of a flush.
struct TrippingSink {
    saved: Mutex<Vec<DomainEvent>>,
    tracker: Arc<ConnectionStateTracker>,
    trip_after: usize,
    calls: AtomicUsize,
}

impl TrippingSink {
    fn new(tracker: Arc<ConnectionStateTracker>, trip_after: usize) -> Arc<Self> {
        Arc::new(TrippingSink {
            saved: Mutex::new(Vec::new()),
            tracker,
            trip_after,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl EventSink for TrippingSink {
    async fn save(&self, event: &DomainEvent) -> Result<(), SinkError> {
        self.saved.lock().unwrap().push(event.clone());
        let call = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        if call >= self.trip_after {
            self.tracker.set_store_available(false);
        }
        Ok(())
    }
}

fn audit_event(entity_id: i64) -> DomainEvent {
    DomainEvent::Audit(AuditEvent {
        actor_user_id: Some(7),
        actor_name: Some("Mara".to_string()),
        action: action_types::ENTITY_UPDATE.to_string(),
        entity_type: "project".to_string(),
        entity_id: Some(entity_id),
        old_values: None,
        new_values: Some(serde_json::json!({ "status": "ordered" })),
        timestamp: chrono::Utc::now(),
    })
}

fn entity_ids(events: &[DomainEvent]) -> Vec<i64> {
    events
        .iter()
        .map(|event| match event {
            DomainEvent::Audit(audit) => audit.entity_id.unwrap(),
            other => panic!("unexpected event: {other:?}"),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Test: outage, buffering, recovery, flush
// ---------------------------------------------------------------------------

/// While the store is marked unavailable nothing is flushed; after recovery
/// one pass persists the whole backlog in order.
#[tokio::test]
async fn store_outage_buffers_then_flushes_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let buffer = Arc::new(EventBuffer::open(dir.path(), 100).await.unwrap());
    let tracker = Arc::new(ConnectionStateTracker::new());
    let sink = RecordingSink::new();
    let flush = BufferFlushService::new(
        buffer.clone(),
        sink.clone() as Arc<dyn EventSink>,
        tracker.clone(),
    );

    tracker.set_store_available(false);
    for id in 1..=3 {
        buffer.enqueue(&audit_event(id)).await.unwrap();
    }

    // Store still down: the pass is a no-op and the backlog stays put.
    let outcome = flush.flush_once().await;
    assert_eq!(outcome, Default::default());
    assert_eq!(buffer.len(), 3);
    assert!(sink.saved().is_empty());

    tracker.set_store_available(true);
    let outcome = flush.flush_once().await;

    assert_eq!(outcome.persisted, 3);
    assert_eq!(outcome.failures, 0);
    assert!(buffer.is_empty());
    assert_eq!(entity_ids(&sink.saved()), [1, 2, 3]);
}

/// An empty buffer never touches the sink.
#[tokio::test]
async fn flush_is_a_noop_when_nothing_is_buffered() {
    let dir = tempfile::tempdir().unwrap();
    let buffer = Arc::new(EventBuffer::open(dir.path(), 100).await.unwrap());
    let tracker = Arc::new(ConnectionStateTracker::new());
    let sink = RecordingSink::new();
    let flush = BufferFlushService::new(
        buffer,
        sink.clone() as Arc<dyn EventSink>,
        tracker,
    );

    assert_eq!(flush.flush_once().await, Default::default());
    assert!(sink.saved().is_empty());
}

// ---------------------------------------------------------------------------
// Test: individual write failures
// ---------------------------------------------------------------------------

/// A rejected write drops only that event; the rest of the batch persists.
#[tokio::test]
async fn persistence_failure_drops_only_that_event() {
    let dir = tempfile::tempdir().unwrap();
    let buffer = Arc::new(EventBuffer::open(dir.path(), 100).await.unwrap());
    let tracker = Arc::new(ConnectionStateTracker::new());
    let sink = RecordingSink::failing_on(2);
    let flush = BufferFlushService::new(
        buffer.clone(),
        sink.clone() as Arc<dyn EventSink>,
        tracker,
    );

    for id in 1..=3 {
        buffer.enqueue(&audit_event(id)).await.unwrap();
    }
    let outcome = flush.flush_once().await;

    assert_eq!(outcome.persisted, 2);
    assert_eq!(outcome.failures, 1);
    assert_eq!(outcome.abandoned, 0);
    assert_eq!(entity_ids(&sink.saved()), [1, 3]);
    // The failed event is not re-queued.
    assert!(buffer.is_empty());
}

// ---------------------------------------------------------------------------
// Test: mid-flush outage (accepted loss window)
// ---------------------------------------------------------------------------

/// If the store goes away mid-batch the remainder of the drained batch is
/// abandoned, in memory and on disk. This pins the accepted trade-off; if
/// the drain design changes, this test should change with it.
#[tokio::test]
async fn mid_flush_outage_abandons_rest_of_drained_batch() {
    let dir = tempfile::tempdir().unwrap();
    let buffer = Arc::new(EventBuffer::open(dir.path(), 100).await.unwrap());
    let tracker = Arc::new(ConnectionStateTracker::new());
    let sink = TrippingSink::new(tracker.clone(), 1);
    let flush = BufferFlushService::new(
        buffer.clone(),
        sink.clone() as Arc<dyn EventSink>,
        tracker.clone(),
    );

    for id in 1..=3 {
        buffer.enqueue(&audit_event(id)).await.unwrap();
    }
    let outcome = flush.flush_once().await;

    assert_eq!(outcome.persisted, 1);
    assert_eq!(outcome.abandoned, 2);
    assert!(buffer.is_empty());

    // Nothing survives on disk either: a restart recovers zero events.
    drop(flush);
    drop(buffer);
    let reopened = EventBuffer::open(dir.path(), 100).await.unwrap();
    assert_eq!(reopened.recovered_events(), 0);
    assert!(reopened.is_empty());
}

// ---------------------------------------------------------------------------
// Test: restart continuity
// ---------------------------------------------------------------------------

/// Events buffered by a previous process flush normally after recovery.
#[tokio::test]
async fn flush_after_restart_persists_recovered_events() {
    let dir = tempfile::tempdir().unwrap();
    {
        let buffer = EventBuffer::open(dir.path(), 100).await.unwrap();
        buffer.enqueue(&audit_event(21)).await.unwrap();
        buffer.enqueue(&audit_event(22)).await.unwrap();
    }

    let buffer = Arc::new(EventBuffer::open(dir.path(), 100).await.unwrap());
    assert_eq!(buffer.recovered_events(), 2);

    let tracker = Arc::new(ConnectionStateTracker::new());
    let sink = RecordingSink::new();
    let flush = BufferFlushService::new(
        buffer.clone(),
        sink.clone() as Arc<dyn EventSink>,
        tracker,
    );
    let outcome = flush.flush_once().await;

    assert_eq!(outcome.persisted, 2);
    assert_eq!(entity_ids(&sink.saved()), [21, 22]);
    assert!(buffer.is_empty());
}

// ---------------------------------------------------------------------------
// Test: service loop
// ---------------------------------------------------------------------------

/// The background loop flushes on its poll interval without manual passes.
#[tokio::test]
async fn service_loop_flushes_on_poll() {
    let dir = tempfile::tempdir().unwrap();
    let buffer = Arc::new(EventBuffer::open(dir.path(), 100).await.unwrap());
    let tracker = Arc::new(ConnectionStateTracker::new());
    let sink = RecordingSink::new();
    let service = BufferFlushService::with_interval(
        buffer.clone(),
        sink.clone() as Arc<dyn EventSink>,
        tracker,
        Duration::from_millis(10),
    );

    buffer.enqueue(&audit_event(1)).await.unwrap();

    let cancel = CancellationToken::new();
    let run_cancel = cancel.clone();
    let handle = tokio::spawn(async move { service.run(run_cancel).await });

    tokio::time::sleep(Duration::from_millis(200)).await;
    cancel.cancel();
    handle.await.unwrap();

    assert_eq!(entity_ids(&sink.saved()), [1]);
    assert!(buffer.is_empty());
}
