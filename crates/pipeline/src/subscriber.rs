//! Broker subscription and persistence dispatch.
//!
//! One forwarder task per channel copies incoming messages into a single
//! dispatch queue; one dispatcher loop decodes and routes them. Persistence
//! is therefore strictly sequential, which keeps store write pressure flat
//! during bursts, while the per-channel forwarders stop a stalled channel
//! from starving the others on the receive side.
//!
//! Routing per message: store available → write through the sink; store
//! unavailable → park in the event buffer for the flush service. A sink
//! failure is logged and the event dropped; the buffer is only for known
//! outages, not for individual write failures.

use std::sync::Arc;

use casework_events::{BrokerSubscription, EventEnvelope, EventSink, MessageBroker};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::buffer::EventBuffer;
use crate::config::EventChannels;
use crate::state::ConnectionStateTracker;

/// Depth of the shared dispatch queue between forwarders and dispatcher.
const DISPATCH_QUEUE_CAPACITY: usize = 256;

/// Consumes the event channels and persists or buffers each message.
pub struct EventSubscriber {
    broker: Arc<dyn MessageBroker>,
    sink: Arc<dyn EventSink>,
    buffer: Arc<EventBuffer>,
    tracker: Arc<ConnectionStateTracker>,
    channels: EventChannels,
}

impl EventSubscriber {
    pub fn new(
        broker: Arc<dyn MessageBroker>,
        sink: Arc<dyn EventSink>,
        buffer: Arc<EventBuffer>,
        tracker: Arc<ConnectionStateTracker>,
        channels: EventChannels,
    ) -> Self {
        EventSubscriber {
            broker,
            sink,
            buffer,
            tracker,
            channels,
        }
    }

    /// Subscribes to all channels and dispatches until cancelled.
    ///
    /// If any subscription cannot be established the subscriber logs and
    /// returns: consumption stays disabled until the process restarts.
    /// Producers keep publishing into the broker's retained backlog and the
    /// fallback store, so a restart picks events back up.
    pub async fn run(&self, cancel: CancellationToken) {
        let forwarder_cancel = cancel.child_token();
        let (tx, mut rx) = mpsc::channel::<(String, String)>(DISPATCH_QUEUE_CAPACITY);

        for channel in self.channels.all() {
            match self.broker.subscribe(&channel).await {
                Ok(subscription) => {
                    tokio::spawn(forward_channel(
                        subscription,
                        tx.clone(),
                        forwarder_cancel.clone(),
                    ));
                }
                Err(e) => {
                    error!(
                        channel = %channel,
                        error = %e,
                        "Broker subscription failed; event consumption disabled until restart",
                    );
                    forwarder_cancel.cancel();
                    return;
                }
            }
        }
        // The dispatcher holds no sender; rx returning None means every
        // forwarder is gone.
        drop(tx);

        info!(
            audit = %self.channels.audit,
            session = %self.channels.session,
            error = %self.channels.error,
            "Event subscriber started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Event subscriber stopping");
                    break;
                }
                received = rx.recv() => match received {
                    Some((channel, message)) => {
                        self.dispatch(&channel, &message).await;
                    }
                    None => {
                        warn!("All channel forwarders stopped; event subscriber exiting");
                        break;
                    }
                }
            }
        }
    }

    async fn dispatch(&self, channel: &str, message: &str) {
        let event = match EventEnvelope::decode_str(message) {
            Ok(event) => event,
            Err(e) => {
                // Warn, not error: an error report would itself be published
                // as an event, and a poison message must not loop forever.
                warn!(channel, error = %e, "Dropping malformed event message");
                return;
            }
        };

        if self.tracker.is_store_available() {
            if let Err(e) = self.sink.save(&event).await {
                error!(
                    channel,
                    event_type = %event.kind(),
                    error = %e,
                    "Failed to persist event; event dropped",
                );
            }
        } else if let Err(e) = self.buffer.enqueue(&event).await {
            error!(
                channel,
                event_type = %event.kind(),
                error = %e,
                "Failed to buffer event during store outage; event dropped",
            );
        }
    }
}

/// Copies messages from one channel subscription into the dispatch queue.
async fn forward_channel(
    mut subscription: BrokerSubscription,
    tx: mpsc::Sender<(String, String)>,
    cancel: CancellationToken,
) {
    let channel = subscription.channel().to_string();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            received = subscription.next() => match received {
                Some(message) => {
                    if tx.send((channel.clone(), message)).await.is_err() {
                        // Dispatcher is gone; nothing left to forward to.
                        break;
                    }
                }
                None => {
                    info!(channel = %channel, "Channel subscription closed");
                    break;
                }
            }
        }
    }
}
