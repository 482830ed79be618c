//! The durable line-record shared by both on-disk queues.
//!
//! One JSON object per line. The two queues reuse the same shape with
//! different field meanings:
//!
//! - the consumer-side event buffer stores the event *kind* tag in
//!   `event_type` and the typed body in `payload` ([`BufferedEvent::from_event`]),
//! - the producer-side fallback store records the *channel* an undeliverable
//!   message was bound for in `event_type` and the full envelope message in
//!   `payload` ([`BufferedEvent::for_channel`]).
//!
//! `timestamp` records when the record was buffered, not when the event
//! occurred; the event body carries its own occurrence time.

use casework_core::types::Timestamp;
use serde::{Deserialize, Serialize};

use crate::envelope::DecodeError;
use crate::model::{DomainEvent, EventKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferedEvent {
    pub event_type: String,
    pub payload: String,
    pub timestamp: Timestamp,
}

impl BufferedEvent {
    /// Builds a buffer record holding a typed event body, tagged with the
    /// event kind.
    pub fn from_event(event: &DomainEvent) -> Result<BufferedEvent, serde_json::Error> {
        Ok(BufferedEvent {
            event_type: event.kind().as_str().to_string(),
            payload: event.encode_payload()?,
            timestamp: chrono::Utc::now(),
        })
    }

    /// Builds a fallback record holding an already-encoded broker message,
    /// tagged with the channel it could not be delivered to.
    pub fn for_channel(channel: &str, message: String) -> BufferedEvent {
        BufferedEvent {
            event_type: channel.to_string(),
            payload: message,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Decodes a record produced by [`from_event`] back into the typed event.
    ///
    /// [`from_event`]: BufferedEvent::from_event
    pub fn decode(&self) -> Result<DomainEvent, DecodeError> {
        let kind = EventKind::parse(&self.event_type)
            .ok_or_else(|| DecodeError::UnknownTag(self.event_type.clone()))?;
        DomainEvent::decode(kind, &self.payload).map_err(|source| DecodeError::Payload {
            kind: kind.as_str(),
            source,
        })
    }
}
