//! Shared availability flags for the external dependencies.
//!
//! One tracker instance is shared by everything in the process: health
//! monitors write the flags, publishers and the background services read
//! them before deciding where an event goes. Reads are lock-free atomics on
//! hot paths.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use casework_core::types::Timestamp;
use chrono::TimeZone;

/// The two external dependencies whose availability is tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dependency {
    /// The event store (PostgreSQL).
    Store,
    /// The pub/sub message broker.
    Broker,
}

impl Dependency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dependency::Store => "store",
            Dependency::Broker => "broker",
        }
    }
}

impl std::fmt::Display for Dependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process-wide availability flags, independent per dependency.
///
/// Both flags start optimistic (`true`): the monitors probe immediately at
/// startup and correct within one cycle, and an actual connection failure on
/// the hot path flips the broker flag without waiting for a probe.
pub struct ConnectionStateTracker {
    store_available: AtomicBool,
    broker_available: AtomicBool,
    store_changed_at_ms: AtomicI64,
    broker_changed_at_ms: AtomicI64,
}

impl ConnectionStateTracker {
    pub fn new() -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        ConnectionStateTracker {
            store_available: AtomicBool::new(true),
            broker_available: AtomicBool::new(true),
            store_changed_at_ms: AtomicI64::new(now),
            broker_changed_at_ms: AtomicI64::new(now),
        }
    }

    pub fn is_store_available(&self) -> bool {
        self.store_available.load(Ordering::Relaxed)
    }

    pub fn is_broker_available(&self) -> bool {
        self.broker_available.load(Ordering::Relaxed)
    }

    /// Sets the store flag. Returns `true` only when this call changed the
    /// value, so callers can log transitions exactly once.
    pub fn set_store_available(&self, available: bool) -> bool {
        let previous = self.store_available.swap(available, Ordering::Relaxed);
        let changed = previous != available;
        if changed {
            self.store_changed_at_ms
                .store(chrono::Utc::now().timestamp_millis(), Ordering::Relaxed);
        }
        changed
    }

    /// Sets the broker flag. Returns `true` only on an actual transition.
    pub fn set_broker_available(&self, available: bool) -> bool {
        let previous = self.broker_available.swap(available, Ordering::Relaxed);
        let changed = previous != available;
        if changed {
            self.broker_changed_at_ms
                .store(chrono::Utc::now().timestamp_millis(), Ordering::Relaxed);
        }
        changed
    }

    pub fn is_available(&self, dependency: Dependency) -> bool {
        match dependency {
            Dependency::Store => self.is_store_available(),
            Dependency::Broker => self.is_broker_available(),
        }
    }

    pub fn set_available(&self, dependency: Dependency, available: bool) -> bool {
        match dependency {
            Dependency::Store => self.set_store_available(available),
            Dependency::Broker => self.set_broker_available(available),
        }
    }

    /// When the given dependency's flag last changed. Diagnostic only.
    pub fn changed_at(&self, dependency: Dependency) -> Timestamp {
        let ms = match dependency {
            Dependency::Store => self.store_changed_at_ms.load(Ordering::Relaxed),
            Dependency::Broker => self.broker_changed_at_ms.load(Ordering::Relaxed),
        };
        match chrono::Utc.timestamp_millis_opt(ms) {
            chrono::LocalResult::Single(ts) => ts,
            _ => chrono::Utc::now(),
        }
    }
}

impl Default for ConnectionStateTracker {
    fn default() -> Self {
        Self::new()
    }
}
