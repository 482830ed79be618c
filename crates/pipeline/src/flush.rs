//! Periodic draining of the event buffer into the store.
//!
//! Every poll tick, if the store is marked available and the buffer holds
//! anything, the whole buffer is drained and written event by event. The
//! drain clears the buffer's journal up front, so a store failure in the
//! middle of a batch drops whatever was not yet written; that window was
//! accepted to keep the journal a simple append/rotate file instead of a
//! per-event acknowledged log. An integration test pins the behavior so the
//! window cannot widen unnoticed.

use std::sync::Arc;
use std::time::Duration;

use casework_events::EventSink;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::buffer::EventBuffer;
use crate::state::ConnectionStateTracker;

pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5);

/// Counters from one flush pass, for logging and tests.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FlushOutcome {
    /// Events written to the store.
    pub persisted: usize,
    /// Events the store rejected; logged and dropped.
    pub failures: usize,
    /// Events dropped because the store went away mid-batch.
    pub abandoned: usize,
    /// Buffered records that no longer decoded; logged and dropped.
    pub undecodable: usize,
}

impl FlushOutcome {
    fn is_noteworthy(&self) -> bool {
        self.persisted > 0 || self.failures > 0 || self.abandoned > 0 || self.undecodable > 0
    }
}

/// Moves buffered events into the store once it recovers.
pub struct BufferFlushService {
    buffer: Arc<EventBuffer>,
    sink: Arc<dyn EventSink>,
    tracker: Arc<ConnectionStateTracker>,
    poll_interval: Duration,
}

impl BufferFlushService {
    pub fn new(
        buffer: Arc<EventBuffer>,
        sink: Arc<dyn EventSink>,
        tracker: Arc<ConnectionStateTracker>,
    ) -> Self {
        Self::with_interval(buffer, sink, tracker, DEFAULT_FLUSH_INTERVAL)
    }

    pub fn with_interval(
        buffer: Arc<EventBuffer>,
        sink: Arc<dyn EventSink>,
        tracker: Arc<ConnectionStateTracker>,
        poll_interval: Duration,
    ) -> Self {
        BufferFlushService {
            buffer,
            sink,
            tracker,
            poll_interval,
        }
    }

    pub async fn run(&self, cancel: CancellationToken) {
        let mut poll = tokio::time::interval(self.poll_interval);

        info!(
            poll_interval_secs = self.poll_interval.as_secs(),
            "Buffer flush service started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Buffer flush service stopping");
                    break;
                }
                _ = poll.tick() => {
                    let outcome = self.flush_once().await;
                    if outcome.is_noteworthy() {
                        info!(
                            persisted = outcome.persisted,
                            failures = outcome.failures,
                            abandoned = outcome.abandoned,
                            undecodable = outcome.undecodable,
                            remaining = self.buffer.len(),
                            "Buffer flush finished",
                        );
                    }
                }
            }
        }
    }

    /// Runs one flush pass. Public so tests and shutdown paths can force a
    /// flush without waiting for the poll interval.
    pub async fn flush_once(&self) -> FlushOutcome {
        let mut outcome = FlushOutcome::default();

        if !self.tracker.is_store_available() || self.buffer.is_empty() {
            return outcome;
        }

        let batch = match self.buffer.dequeue_all().await {
            Ok(batch) => batch,
            Err(e) => {
                error!(error = %e, "Could not drain event buffer");
                return outcome;
            }
        };
        let total = batch.len();
        debug!(batch = total, "Flushing buffered events");

        for (index, record) in batch.into_iter().enumerate() {
            if !self.tracker.is_store_available() {
                // The batch was already removed from the journal; what is
                // left of it is gone. Counted and logged, not re-queued.
                outcome.abandoned = total - index;
                warn!(
                    abandoned = outcome.abandoned,
                    "Store lost mid-flush; abandoning rest of drained batch",
                );
                break;
            }

            let event = match record.decode() {
                Ok(event) => event,
                Err(e) => {
                    outcome.undecodable += 1;
                    warn!(
                        event_type = %record.event_type,
                        error = %e,
                        "Skipping buffered record that no longer decodes",
                    );
                    continue;
                }
            };

            match self.sink.save(&event).await {
                Ok(()) => outcome.persisted += 1,
                Err(e) => {
                    outcome.failures += 1;
                    error!(
                        event_type = %record.event_type,
                        error = %e,
                        "Failed to persist buffered event",
                    );
                }
            }
        }

        outcome
    }
}
