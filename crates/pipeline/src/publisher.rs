//! Event publishing variants.
//!
//! Producers call [`EventPublisher::publish`] and never learn whether the
//! event went to the broker, the fallback store, or nowhere; publishing is
//! fire-and-forget by contract so a broker outage can never fail a user
//! request. Three implementations:
//!
//! - [`DirectEventPublisher`]: straight to the broker, failures are logged
//!   and the event is gone. For tooling and tests.
//! - [`NoopEventPublisher`]: discards everything. For deployments that
//!   switch event capture off.
//! - [`ResilientEventPublisher`]: consults the availability flag first and
//!   diverts to the fallback store during broker outages.

use std::sync::Arc;

use async_trait::async_trait;
use casework_events::{BrokerError, DomainEvent, EventEnvelope, MessageBroker};
use tracing::{debug, error, trace, warn};

use crate::fallback::FallbackEventStore;
use crate::state::ConnectionStateTracker;

/// Fire-and-forget event publishing. Implementations must not block the
/// caller beyond the publish attempt itself and must never panic on failure.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, channel: &str, event: &DomainEvent);
}

// -----------------------------------------------------------------------------
// Direct
// -----------------------------------------------------------------------------

/// Publishes straight to the broker with no outage handling.
pub struct DirectEventPublisher {
    broker: Arc<dyn MessageBroker>,
}

impl DirectEventPublisher {
    pub fn new(broker: Arc<dyn MessageBroker>) -> Self {
        DirectEventPublisher { broker }
    }
}

#[async_trait]
impl EventPublisher for DirectEventPublisher {
    async fn publish(&self, channel: &str, event: &DomainEvent) {
        let message = match EventEnvelope::encode(event) {
            Ok(message) => message,
            Err(e) => {
                error!(channel, event_type = %event.kind(), error = %e, "Event encoding failed");
                return;
            }
        };
        if let Err(e) = self.broker.publish(channel, &message).await {
            error!(channel, event_type = %event.kind(), error = %e, "Event publish failed");
        }
    }
}

// -----------------------------------------------------------------------------
// Noop
// -----------------------------------------------------------------------------

/// Discards every event. Used when event capture is disabled by
/// configuration; the publish sites stay unchanged.
pub struct NoopEventPublisher;

#[async_trait]
impl EventPublisher for NoopEventPublisher {
    async fn publish(&self, channel: &str, event: &DomainEvent) {
        debug!(channel, event_type = %event.kind(), "Event capture disabled; dropping event");
    }
}

// -----------------------------------------------------------------------------
// Resilient
// -----------------------------------------------------------------------------

/// Publisher that survives broker outages.
///
/// While the broker is marked unavailable the publish attempt is skipped
/// entirely and the encoded message goes to the fallback store. A publish
/// that fails with a connection error flips the availability flag itself,
/// so the very next event diverts without waiting for the health monitor.
/// Without a fallback store the event is dropped with a warning; durability
/// during outages comes from the store, not from this type alone.
pub struct ResilientEventPublisher {
    broker: Arc<dyn MessageBroker>,
    tracker: Arc<ConnectionStateTracker>,
    fallback: Option<Arc<FallbackEventStore>>,
}

impl ResilientEventPublisher {
    pub fn new(
        broker: Arc<dyn MessageBroker>,
        tracker: Arc<ConnectionStateTracker>,
        fallback: Option<Arc<FallbackEventStore>>,
    ) -> Self {
        ResilientEventPublisher {
            broker,
            tracker,
            fallback,
        }
    }

    async fn divert(&self, channel: &str, message: String, reason: &'static str) {
        match &self.fallback {
            Some(store) => match store.store_event(channel, &message).await {
                Ok(()) => debug!(channel, reason, "Event diverted to fallback store"),
                Err(e) => {
                    error!(channel, reason, error = %e, "Fallback store rejected event; event lost")
                }
            },
            None => {
                warn!(channel, reason, "Broker unavailable and no fallback store; event lost")
            }
        }
    }
}

#[async_trait]
impl EventPublisher for ResilientEventPublisher {
    async fn publish(&self, channel: &str, event: &DomainEvent) {
        let message = match EventEnvelope::encode(event) {
            Ok(message) => message,
            Err(e) => {
                error!(channel, event_type = %event.kind(), error = %e, "Event encoding failed");
                return;
            }
        };

        if !self.tracker.is_broker_available() {
            self.divert(channel, message, "broker marked unavailable").await;
            return;
        }

        match self.broker.publish(channel, &message).await {
            Ok(()) => trace!(channel, event_type = %event.kind(), "Event published"),
            Err(e) if e.is_connection_error() => {
                if self.tracker.set_broker_available(false) {
                    warn!(channel, error = %e, "Broker connection lost; marking unavailable");
                }
                self.divert(channel, message, "publish connection failure").await;
            }
            Err(BrokerError::Timeout(elapsed)) => {
                // A timeout says nothing about the connection; leave the flag
                // to the health monitor. The event is not retried.
                warn!(
                    channel,
                    event_type = %event.kind(),
                    timeout_ms = elapsed.as_millis() as u64,
                    "Event publish timed out; event dropped",
                );
            }
            Err(e) => {
                error!(channel, event_type = %event.kind(), error = %e, "Event publish failed");
            }
        }
    }
}
