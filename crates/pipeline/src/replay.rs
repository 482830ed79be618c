//! Background republishing of fallback-stored events.
//!
//! Polls the fallback store while the broker is marked available and
//! republishes each pending file in order. A file is marked processed only
//! after every entry in it was either republished or skipped as corrupt;
//! a connection failure aborts the whole batch so the remaining entries
//! are retried on a later cycle. Replay after a partially failed file
//! re-sends its already-delivered entries, which is the at-least-once
//! contract working as intended.

use std::sync::Arc;
use std::time::Duration;

use casework_events::MessageBroker;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::fallback::{FallbackEventStore, DEFAULT_RETENTION_DAYS};
use crate::state::ConnectionStateTracker;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(6 * 60 * 60);

#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// How often pending files are checked for.
    pub poll_interval: Duration,
    /// How often expired processed files are reaped.
    pub cleanup_interval: Duration,
    /// Retention for processed files, in days.
    pub retention_days: u32,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

/// Counters from one replay pass, for logging and tests.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplayOutcome {
    /// Files fully replayed and renamed `.processed`.
    pub files_processed: usize,
    /// Entries successfully republished.
    pub events_replayed: usize,
    /// Entries that failed to republish (including the one that aborted).
    pub failures: usize,
    /// True when the pass stopped early on a connection failure.
    pub aborted: bool,
}

impl ReplayOutcome {
    fn is_noteworthy(&self) -> bool {
        self.events_replayed > 0 || self.failures > 0
    }
}

/// Drains the fallback store back into the broker once it recovers.
pub struct FallbackReplayService {
    store: Arc<FallbackEventStore>,
    broker: Arc<dyn MessageBroker>,
    tracker: Arc<ConnectionStateTracker>,
    config: ReplayConfig,
}

impl FallbackReplayService {
    pub fn new(
        store: Arc<FallbackEventStore>,
        broker: Arc<dyn MessageBroker>,
        tracker: Arc<ConnectionStateTracker>,
    ) -> Self {
        Self::with_config(store, broker, tracker, ReplayConfig::default())
    }

    pub fn with_config(
        store: Arc<FallbackEventStore>,
        broker: Arc<dyn MessageBroker>,
        tracker: Arc<ConnectionStateTracker>,
        config: ReplayConfig,
    ) -> Self {
        FallbackReplayService {
            store,
            broker,
            tracker,
            config,
        }
    }

    pub async fn run(&self, cancel: CancellationToken) {
        let mut poll = tokio::time::interval(self.config.poll_interval);
        let mut cleanup = tokio::time::interval(self.config.cleanup_interval);

        info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            retention_days = self.config.retention_days,
            "Fallback replay service started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Fallback replay service stopping");
                    break;
                }
                _ = poll.tick() => {
                    if !self.tracker.is_broker_available() {
                        debug!("Broker unavailable; skipping replay cycle");
                        continue;
                    }
                    let outcome = self.replay_pending().await;
                    if outcome.is_noteworthy() {
                        info!(
                            files_processed = outcome.files_processed,
                            events_replayed = outcome.events_replayed,
                            failures = outcome.failures,
                            aborted = outcome.aborted,
                            "Replay cycle finished",
                        );
                    }
                }
                _ = cleanup.tick() => {
                    match self.store.cleanup_old_files(self.config.retention_days).await {
                        Ok(0) => debug!("Fallback cleanup found nothing to delete"),
                        Ok(removed) => info!(removed, "Fallback cleanup deleted expired files"),
                        Err(e) => error!(error = %e, "Fallback cleanup failed"),
                    }
                }
            }
        }
    }

    /// Replays every pending file, oldest first. Public so tests and
    /// operational tooling can force a pass without waiting for the poll.
    pub async fn replay_pending(&self) -> ReplayOutcome {
        let mut outcome = ReplayOutcome::default();

        let files = match self.store.pending_files().await {
            Ok(files) => files,
            Err(e) => {
                error!(error = %e, "Could not list pending fallback files");
                return outcome;
            }
        };

        'batch: for file in files {
            let entries = match self.store.read_events(&file).await {
                Ok(entries) => entries,
                Err(e) => {
                    error!(file = %file.display(), error = %e, "Could not read fallback file");
                    outcome.failures += 1;
                    continue;
                }
            };

            let mut file_failures = 0usize;
            for entry in entries {
                // `event_type` holds the original target channel here.
                match self.broker.publish(&entry.event_type, &entry.payload).await {
                    Ok(()) => outcome.events_replayed += 1,
                    Err(e) if e.is_connection_error() => {
                        if self.tracker.set_broker_available(false) {
                            warn!(error = %e, "Broker connection lost during replay");
                        }
                        warn!(
                            file = %file.display(),
                            error = %e,
                            "Aborting replay batch; file stays pending",
                        );
                        outcome.failures += 1;
                        outcome.aborted = true;
                        break 'batch;
                    }
                    Err(e) => {
                        warn!(
                            file = %file.display(),
                            channel = %entry.event_type,
                            error = %e,
                            "Failed to republish fallback entry",
                        );
                        file_failures += 1;
                        outcome.failures += 1;
                    }
                }
            }

            if file_failures == 0 {
                match self.store.mark_processed(&file).await {
                    Ok(_) => outcome.files_processed += 1,
                    Err(e) => {
                        // The entries were republished; next cycle will send
                        // them again. Consumers tolerate duplicates.
                        error!(
                            file = %file.display(),
                            error = %e,
                            "Replayed file could not be marked processed",
                        );
                    }
                }
            } else {
                debug!(
                    file = %file.display(),
                    failures = file_failures,
                    "Fallback file left pending after entry failures",
                );
            }
        }

        outcome
    }
}
