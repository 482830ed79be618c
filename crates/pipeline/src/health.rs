//! Dependency health monitoring with exponential backoff.
//!
//! One [`HealthMonitor`] runs per external dependency. While a dependency is
//! healthy it is probed on a relaxed interval; once a probe fails the monitor
//! flips the shared availability flag and re-probes with exponentially
//! growing delays until the dependency answers again. Monitors never touch
//! each other's flag, so a store outage does not stop broker probing and
//! vice versa.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use casework_events::{HealthProbe, MessageBroker};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::state::{ConnectionStateTracker, Dependency};

/// Tunable parameters for the exponential-backoff strategy.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay after the first failed probe.
    pub initial_delay: Duration,
    /// Upper bound on the delay between probes.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            multiplier: 2.0,
        }
    }
}

/// Calculate the next backoff delay from the current delay and config.
///
/// The result is clamped to [`BackoffConfig::max_delay`].
pub fn next_delay(current: Duration, config: &BackoffConfig) -> Duration {
    let next_ms = (current.as_millis() as f64 * config.multiplier) as u64;
    Duration::from_millis(next_ms).min(config.max_delay)
}

/// Full monitor schedule for one dependency.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Probe interval while the dependency is healthy.
    pub healthy_check_interval: Duration,
    /// Floor for the failure-side delay. With default backoff settings the
    /// first failure delay already equals this, so it only matters when the
    /// backoff is configured to start faster than operators want to poll.
    pub unhealthy_check_interval: Duration,
    pub backoff: BackoffConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            healthy_check_interval: Duration::from_secs(30),
            unhealthy_check_interval: Duration::from_secs(1),
            backoff: BackoffConfig::default(),
        }
    }
}

fn failure_delay(current: Duration, config: &MonitorConfig) -> Duration {
    current.max(config.unhealthy_check_interval)
}

/// Probes one dependency and drives its availability flag.
///
/// The monitor starts without an opinion: the first probe result is logged
/// as the initial state rather than a transition. An in-flight probe is
/// never interrupted by shutdown; cancellation is honored between probes.
pub struct HealthMonitor {
    dependency: Dependency,
    probe: Arc<dyn HealthProbe>,
    tracker: Arc<ConnectionStateTracker>,
    config: MonitorConfig,
}

impl HealthMonitor {
    pub fn new(
        dependency: Dependency,
        probe: Arc<dyn HealthProbe>,
        tracker: Arc<ConnectionStateTracker>,
    ) -> Self {
        Self::with_config(dependency, probe, tracker, MonitorConfig::default())
    }

    pub fn with_config(
        dependency: Dependency,
        probe: Arc<dyn HealthProbe>,
        tracker: Arc<ConnectionStateTracker>,
        config: MonitorConfig,
    ) -> Self {
        HealthMonitor {
            dependency,
            probe,
            tracker,
            config,
        }
    }

    pub async fn run(&self, cancel: CancellationToken) {
        let mut delay = self.config.backoff.initial_delay;
        let mut last_known: Option<bool> = None;

        info!(
            dependency = %self.dependency,
            healthy_interval_ms = self.config.healthy_check_interval.as_millis() as u64,
            "Health monitor started",
        );

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let sleep_for = if self.probe.is_healthy().await {
                self.note_healthy(&mut last_known);
                delay = self.config.backoff.initial_delay;
                self.config.healthy_check_interval
            } else {
                let current = failure_delay(delay, &self.config);
                self.note_unhealthy(&mut last_known, current);
                delay = next_delay(current, &self.config.backoff);
                current
            };

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(sleep_for) => {}
            }
        }

        debug!(dependency = %self.dependency, "Health monitor stopped");
    }

    fn note_healthy(&self, last_known: &mut Option<bool>) {
        self.tracker.set_available(self.dependency, true);
        match last_known {
            Some(false) => info!(dependency = %self.dependency, "Dependency recovered"),
            None => debug!(dependency = %self.dependency, "Dependency healthy"),
            Some(true) => {}
        }
        *last_known = Some(true);
    }

    fn note_unhealthy(&self, last_known: &mut Option<bool>, retry_in: Duration) {
        self.tracker.set_available(self.dependency, false);
        let retry_in_ms = retry_in.as_millis() as u64;
        match last_known {
            Some(false) => {
                debug!(dependency = %self.dependency, retry_in_ms, "Dependency still unhealthy")
            }
            _ => {
                warn!(
                    dependency = %self.dependency,
                    retry_in_ms,
                    "Dependency unhealthy; backing off",
                )
            }
        }
        *last_known = Some(false);
    }
}

/// Probe for the broker side, backed by the broker's own connectivity hint.
pub struct BrokerHealthProbe {
    broker: Arc<dyn MessageBroker>,
}

impl BrokerHealthProbe {
    pub fn new(broker: Arc<dyn MessageBroker>) -> Self {
        BrokerHealthProbe { broker }
    }
}

#[async_trait]
impl HealthProbe for BrokerHealthProbe {
    async fn is_healthy(&self) -> bool {
        self.broker.is_connected()
    }
}
