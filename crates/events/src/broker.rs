//! Message broker contract and the in-process implementation.
//!
//! The pipeline only ever talks to [`MessageBroker`], so the transport can be
//! swapped (in-process fan-out today, an external broker behind the same trait
//! later) without touching publishers or the subscriber.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, RwLock};

/// Per-subscription delivery queue depth. A subscriber that falls further
/// behind than this starts losing messages, which is logged as lag.
pub const SUBSCRIPTION_BUFFER: usize = 256;

/// Default retained backlog per channel in the in-process broker.
pub const DEFAULT_TOPIC_CAPACITY: usize = 1024;

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// The broker connection is gone or was never established. Publishers and
    /// the replay service treat this as "stop sending, mark unavailable".
    #[error("Broker connection lost: {0}")]
    ConnectionLost(String),

    /// The publish did not complete in time. The connection may still be
    /// healthy, so this does not flip availability.
    #[error("Broker publish timed out after {0:?}")]
    Timeout(Duration),

    /// A channel subscription could not be established.
    #[error("Subscribing to channel '{channel}' failed: {reason}")]
    Subscribe { channel: String, reason: String },
}

impl BrokerError {
    /// True when the error means the connection itself is unusable, as
    /// opposed to a single operation failing.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            BrokerError::ConnectionLost(_) | BrokerError::Subscribe { .. }
        )
    }
}

/// Pub/sub transport used by every producer and the subscriber.
#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Publishes an already-encoded message to a channel. Delivery to zero
    /// subscribers is a success.
    async fn publish(&self, channel: &str, message: &str) -> Result<(), BrokerError>;

    /// Opens a subscription delivering every message published to `channel`
    /// after this call returns.
    async fn subscribe(&self, channel: &str) -> Result<BrokerSubscription, BrokerError>;

    /// Cheap, non-blocking connectivity hint used by health probes.
    fn is_connected(&self) -> bool;
}

/// A live channel subscription handed out by [`MessageBroker::subscribe`].
#[derive(Debug)]
pub struct BrokerSubscription {
    channel: String,
    receiver: mpsc::Receiver<String>,
}

impl BrokerSubscription {
    pub fn new(channel: impl Into<String>, receiver: mpsc::Receiver<String>) -> Self {
        BrokerSubscription {
            channel: channel.into(),
            receiver,
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Waits for the next message. `None` means the subscription ended and no
    /// further messages will arrive.
    pub async fn next(&mut self) -> Option<String> {
        self.receiver.recv().await
    }
}

// -----------------------------------------------------------------------------
// In-process broker
// -----------------------------------------------------------------------------

/// Broadcast-backed broker for single-node deployments and tests.
///
/// Each channel is a lazily created `broadcast` topic; subscriptions get a
/// bridging task that copies messages into their own bounded queue so a slow
/// subscriber cannot stall the topic. [`set_connected`] simulates broker
/// outages for the resilience paths.
///
/// [`set_connected`]: InProcessBroker::set_connected
pub struct InProcessBroker {
    topics: RwLock<HashMap<String, broadcast::Sender<String>>>,
    connected: AtomicBool,
    topic_capacity: usize,
}

impl InProcessBroker {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TOPIC_CAPACITY)
    }

    pub fn with_capacity(topic_capacity: usize) -> Self {
        InProcessBroker {
            topics: RwLock::new(HashMap::new()),
            connected: AtomicBool::new(true),
            topic_capacity,
        }
    }

    /// Flips the simulated connection state. While disconnected, publishes
    /// and subscribes fail with connection errors.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Relaxed);
    }

    async fn topic_sender(&self, channel: &str) -> broadcast::Sender<String> {
        {
            let topics = self.topics.read().await;
            if let Some(sender) = topics.get(channel) {
                return sender.clone();
            }
        }
        let mut topics = self.topics.write().await;
        topics
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.topic_capacity).0)
            .clone()
    }
}

impl Default for InProcessBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageBroker for InProcessBroker {
    async fn publish(&self, channel: &str, message: &str) -> Result<(), BrokerError> {
        if !self.is_connected() {
            return Err(BrokerError::ConnectionLost(
                "in-process broker is offline".to_string(),
            ));
        }
        let sender = self.topic_sender(channel).await;
        // A send error only means there are no subscribers right now, which
        // is a valid state for any pub/sub channel.
        let _ = sender.send(message.to_string());
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<BrokerSubscription, BrokerError> {
        if !self.is_connected() {
            return Err(BrokerError::Subscribe {
                channel: channel.to_string(),
                reason: "in-process broker is offline".to_string(),
            });
        }
        let mut topic_rx = self.topic_sender(channel).await.subscribe();
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let channel_name = channel.to_string();
        tokio::spawn(async move {
            loop {
                match topic_rx.recv().await {
                    Ok(message) => {
                        if tx.send(message).await.is_err() {
                            // Subscription handle dropped.
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            channel = %channel_name,
                            skipped,
                            "Subscription lagged; dropping oldest messages"
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Ok(BrokerSubscription::new(channel, rx))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}
