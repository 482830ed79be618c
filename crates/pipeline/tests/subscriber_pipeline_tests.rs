//! End-to-end tests of the consuming side: resilient publisher into the
//! in-process broker, subscriber dispatch, and the buffer/flush handoff
//! during store outages.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use casework_core::audit::action_types;
use casework_events::{
    AuditEvent, DomainEvent, ErrorEvent, ErrorSeverity, EventKind, EventSink, InProcessBroker,
    MessageBroker, SessionLoginEvent, SinkError,
};
use casework_pipeline::{
    BufferFlushService, ConnectionStateTracker, EventBuffer, EventChannels, EventPublisher,
    EventSubscriber, ResilientEventPublisher,
};
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Test doubles and helpers
// ---------------------------------------------------------------------------

struct RecordingSink {
    saved: Mutex<Vec<DomainEvent>>,
}

impl RecordingSink {
    fn new() -> Arc<Self> {
        Arc::new(RecordingSink {
            saved: Mutex::new(Vec::new()),
        })
    }

    fn saved(&self) -> Vec<DomainEvent> {
        self.saved.lock().unwrap().clone()
    }

    fn count(&self) -> usize {
        self.saved.lock().unwrap().len()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn save(&self, event: &DomainEvent) -> Result<(), SinkError> {
        self.saved.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Everything a consuming-side test needs, wired the way the worker wires it.
struct Pipeline {
    broker: Arc<InProcessBroker>,
    tracker: Arc<ConnectionStateTracker>,
    sink: Arc<RecordingSink>,
    buffer: Arc<EventBuffer>,
    publisher: ResilientEventPublisher,
    cancel: CancellationToken,
    subscriber_handle: tokio::task::JoinHandle<()>,
}

impl Pipeline {
    async fn start(dir: &tempfile::TempDir) -> Pipeline {
        let broker = Arc::new(InProcessBroker::new());
        let tracker = Arc::new(ConnectionStateTracker::new());
        let sink = RecordingSink::new();
        let buffer = Arc::new(EventBuffer::open(dir.path(), 100).await.unwrap());

        let subscriber = EventSubscriber::new(
            broker.clone() as Arc<dyn MessageBroker>,
            sink.clone() as Arc<dyn EventSink>,
            buffer.clone(),
            tracker.clone(),
            EventChannels::default(),
        );
        let cancel = CancellationToken::new();
        let run_cancel = cancel.clone();
        let subscriber_handle = tokio::spawn(async move { subscriber.run(run_cancel).await });
        // Give the subscriber a beat to establish its subscriptions.
        tokio::time::sleep(Duration::from_millis(100)).await;

        let publisher = ResilientEventPublisher::new(
            broker.clone() as Arc<dyn MessageBroker>,
            tracker.clone(),
            None,
        );

        Pipeline {
            broker,
            tracker,
            sink,
            buffer,
            publisher,
            cancel,
            subscriber_handle,
        }
    }

    async fn shutdown(self) {
        self.cancel.cancel();
        self.subscriber_handle.await.unwrap();
    }
}

async fn wait_until(what: &str, mut check: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !check() {
        if Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn audit_event() -> DomainEvent {
    DomainEvent::Audit(AuditEvent {
        actor_user_id: Some(3),
        actor_name: Some("Jonas".to_string()),
        action: action_types::ENTITY_CREATE.to_string(),
        entity_type: "cabinet".to_string(),
        entity_id: Some(77),
        old_values: None,
        new_values: Some(serde_json::json!({ "width_mm": 450 })),
        timestamp: chrono::Utc::now(),
    })
}

fn login_event() -> DomainEvent {
    DomainEvent::SessionLogin(SessionLoginEvent {
        user_id: 12,
        username: "mara".to_string(),
        ip_address: Some("10.0.0.9".to_string()),
        user_agent: Some("Mozilla/5.0".to_string()),
        timestamp: chrono::Utc::now(),
    })
}

fn error_event() -> DomainEvent {
    DomainEvent::Error(ErrorEvent {
        source: "pricing".to_string(),
        message: "missing material price".to_string(),
        severity: ErrorSeverity::Error,
        context: None,
        stack_trace: None,
        timestamp: chrono::Utc::now(),
    })
}

// ---------------------------------------------------------------------------
// Test: happy path across all channels
// ---------------------------------------------------------------------------

/// Events published to each channel arrive in the store with their types
/// intact.
#[tokio::test]
async fn published_events_reach_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::start(&dir).await;

    pipeline.publisher.publish("audit_events", &audit_event()).await;
    pipeline.publisher.publish("session_events", &login_event()).await;
    pipeline.publisher.publish("error_events", &error_event()).await;

    wait_until("three events persisted", || pipeline.sink.count() == 3).await;

    let kinds: Vec<EventKind> = pipeline.sink.saved().iter().map(|e| e.kind()).collect();
    assert!(kinds.contains(&EventKind::Audit));
    assert!(kinds.contains(&EventKind::SessionLogin));
    assert!(kinds.contains(&EventKind::Error));
    assert!(pipeline.buffer.is_empty());

    pipeline.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: store outage reroutes into the buffer
// ---------------------------------------------------------------------------

/// With the store marked unavailable, consumed events land in the buffer;
/// a flush pass after recovery persists them.
#[tokio::test]
async fn store_outage_reroutes_events_into_buffer() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::start(&dir).await;

    pipeline.tracker.set_store_available(false);
    pipeline.publisher.publish("audit_events", &audit_event()).await;
    pipeline.publisher.publish("session_events", &login_event()).await;

    wait_until("two events buffered", || pipeline.buffer.len() == 2).await;
    assert_eq!(pipeline.sink.count(), 0);

    pipeline.tracker.set_store_available(true);
    let flush = BufferFlushService::new(
        pipeline.buffer.clone(),
        pipeline.sink.clone() as Arc<dyn EventSink>,
        pipeline.tracker.clone(),
    );
    let outcome = flush.flush_once().await;

    assert_eq!(outcome.persisted, 2);
    assert_eq!(pipeline.sink.count(), 2);
    assert!(pipeline.buffer.is_empty());

    pipeline.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: malformed traffic
// ---------------------------------------------------------------------------

/// Garbage on a channel is dropped without wedging the dispatcher; the next
/// valid event still gets through.
#[tokio::test]
async fn malformed_messages_are_dropped_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::start(&dir).await;

    pipeline
        .broker
        .publish("audit_events", "this is not an envelope")
        .await
        .unwrap();
    pipeline
        .broker
        .publish("audit_events", r#"{"eventType":"mystery","payload":"{}"}"#)
        .await
        .unwrap();
    pipeline.publisher.publish("audit_events", &audit_event()).await;

    wait_until("the valid event persisted", || pipeline.sink.count() == 1).await;
    assert_eq!(pipeline.sink.saved()[0].kind(), EventKind::Audit);

    pipeline.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: subscription failure and shutdown
// ---------------------------------------------------------------------------

/// If subscriptions cannot be established the subscriber gives up rather
/// than spinning; consumption stays off until restart.
#[tokio::test]
async fn subscription_failure_disables_consumption() {
    let dir = tempfile::tempdir().unwrap();
    let broker = Arc::new(InProcessBroker::new());
    broker.set_connected(false);

    let sink = RecordingSink::new();
    let buffer = Arc::new(EventBuffer::open(dir.path(), 100).await.unwrap());
    let subscriber = EventSubscriber::new(
        broker as Arc<dyn MessageBroker>,
        sink as Arc<dyn EventSink>,
        buffer,
        Arc::new(ConnectionStateTracker::new()),
        EventChannels::default(),
    );

    // run() must return promptly instead of retrying forever.
    tokio::time::timeout(
        Duration::from_secs(1),
        subscriber.run(CancellationToken::new()),
    )
    .await
    .unwrap();
}

/// Cancellation stops the dispatcher and its forwarders.
#[tokio::test]
async fn cancelled_subscriber_stops() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::start(&dir).await;

    pipeline.cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), pipeline.subscriber_handle)
        .await
        .unwrap()
        .unwrap();
}
