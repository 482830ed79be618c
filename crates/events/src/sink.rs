//! Destination contract for persisted events.

use async_trait::async_trait;

use crate::model::DomainEvent;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The store cannot be reached at all. Connectivity recovery is the
    /// health monitor's job; callers just log and move on.
    #[error("Event store unavailable: {0}")]
    Unavailable(String),

    /// The store was reachable but rejected or failed the write.
    #[error("Event persistence failed: {0}")]
    Persistence(String),
}

impl SinkError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, SinkError::Unavailable(_))
    }
}

/// Writes events to durable storage. Implementations must be safe to call
/// concurrently; each `save` is an independent write with no ordering
/// guarantee across events.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn save(&self, event: &DomainEvent) -> Result<(), SinkError>;
}
