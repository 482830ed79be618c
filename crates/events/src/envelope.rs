//! The tagged wire envelope.
//!
//! Every message on the broker is a JSON object with exactly two fields:
//!
//! ```json
//! {"eventType": "session_login", "payload": "{\"user_id\":42,...}"}
//! ```
//!
//! The payload is a JSON *string* containing the serialized event body, not an
//! inline object. Consumers written against this double-encoded shape already
//! exist, so both the `eventType` spelling and the string payload are frozen.

use serde::{Deserialize, Serialize};

use crate::model::{DomainEvent, EventKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    #[serde(rename = "eventType")]
    pub event_type: String,
    pub payload: String,
}

impl EventEnvelope {
    /// Wraps an event in an envelope and serializes the whole message.
    pub fn encode(event: &DomainEvent) -> Result<String, serde_json::Error> {
        let envelope = EventEnvelope {
            event_type: event.kind().as_str().to_string(),
            payload: event.encode_payload()?,
        };
        serde_json::to_string(&envelope)
    }

    /// Parses a broker message back into a typed event.
    pub fn decode_str(message: &str) -> Result<DomainEvent, DecodeError> {
        let envelope: EventEnvelope =
            serde_json::from_str(message).map_err(DecodeError::Envelope)?;
        let kind = EventKind::parse(&envelope.event_type)
            .ok_or_else(|| DecodeError::UnknownTag(envelope.event_type.clone()))?;
        DomainEvent::decode(kind, &envelope.payload).map_err(|source| DecodeError::Payload {
            kind: kind.as_str(),
            source,
        })
    }
}

/// Why a broker message could not be turned into a [`DomainEvent`].
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Message is not a valid event envelope: {0}")]
    Envelope(#[source] serde_json::Error),

    #[error("Unknown event type tag '{0}'")]
    UnknownTag(String),

    #[error("Payload for '{kind}' event failed to decode: {source}")]
    Payload {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}
