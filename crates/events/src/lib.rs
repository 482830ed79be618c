//! Event model and collaborator contracts for the Casework event pipeline.
//!
//! The pipeline crates depend on this one for:
//! - the typed domain events and the closed [`DomainEvent`] union,
//! - the tagged wire envelope ([`EventEnvelope`]) shared by every producer
//!   and consumer,
//! - the durable line-record ([`BufferedEvent`]) both on-disk queues write,
//! - the [`MessageBroker`], [`EventSink`] and [`HealthProbe`] traits that
//!   decouple the pipeline from concrete transports and stores,
//! - [`InProcessBroker`], a broadcast-backed broker used by single-node
//!   deployments and tests.

pub mod broker;
pub mod buffered;
pub mod envelope;
pub mod model;
pub mod probe;
pub mod sink;

pub use broker::{BrokerError, BrokerSubscription, InProcessBroker, MessageBroker};
pub use buffered::BufferedEvent;
pub use envelope::{DecodeError, EventEnvelope};
pub use model::{
    AuditEvent, DomainEvent, ErrorEvent, ErrorSeverity, EventKind, SessionLoginEvent,
    SessionLogoutEvent,
};
pub use probe::HealthProbe;
pub use sink::{EventSink, SinkError};
