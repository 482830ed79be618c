//! Resilient event delivery for the Casework platform.
//!
//! Events travel producer → broker → subscriber → store, and every stage is
//! allowed to fail without losing more than this crate explicitly documents:
//!
//! - [`state::ConnectionStateTracker`] holds the shared availability flags
//!   for the broker and the store,
//! - [`health::HealthMonitor`] probes each dependency and drives the flags,
//!   backing off exponentially while a dependency is down,
//! - [`publisher`] offers the publishing variants, including the resilient
//!   one that diverts to the fallback store during broker outages,
//! - [`fallback::FallbackEventStore`] and [`replay::FallbackReplayService`]
//!   are the durable producer-side queue and its drain,
//! - [`subscriber::EventSubscriber`] consumes the channels and persists or
//!   buffers each event depending on store availability,
//! - [`buffer::EventBuffer`] and [`flush::BufferFlushService`] are the
//!   bounded consumer-side queue and its drain.
//!
//! Delivery is at-least-once end to end; consumers deduplicate if they care.

pub mod buffer;
pub mod config;
pub mod fallback;
pub mod flush;
pub mod health;
pub mod publisher;
pub mod replay;
pub mod state;
pub mod subscriber;

pub use buffer::{BufferError, EventBuffer, DEFAULT_BUFFER_CAPACITY};
pub use config::{EventChannels, PipelineConfig};
pub use fallback::{FallbackEventStore, FallbackStoreError, DEFAULT_RETENTION_DAYS};
pub use flush::{BufferFlushService, FlushOutcome, DEFAULT_FLUSH_INTERVAL};
pub use health::{BackoffConfig, BrokerHealthProbe, HealthMonitor, MonitorConfig};
pub use publisher::{
    DirectEventPublisher, EventPublisher, NoopEventPublisher, ResilientEventPublisher,
};
pub use replay::{FallbackReplayService, ReplayConfig, ReplayOutcome};
pub use state::{ConnectionStateTracker, Dependency};
pub use subscriber::EventSubscriber;
