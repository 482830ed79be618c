//! Worker configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use casework_pipeline::{
    BackoffConfig, EventChannels, MonitorConfig, PipelineConfig, ReplayConfig,
};

/// Everything the worker binary reads from its environment.
///
/// All fields except `DATABASE_URL` have defaults suitable for local
/// development. In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Postgres connection string. Required.
    pub database_url: String,
    /// Master switch for event capture; `false` swaps in the no-op
    /// publisher while leaving consumption running.
    pub events_enabled: bool,
    pub pipeline: PipelineConfig,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                          | Default                   |
    /// |----------------------------------|---------------------------|
    /// | `DATABASE_URL`                   | (required)                |
    /// | `EVENTS_ENABLED`                 | `true`                    |
    /// | `EVENT_BUFFER_DIR`               | `./data/event_buffer`     |
    /// | `FALLBACK_STORE_DIR`             | `./data/fallback_events`  |
    /// | `AUDIT_CHANNEL`                  | `audit_events`            |
    /// | `SESSION_CHANNEL`                | `session_events`          |
    /// | `ERROR_CHANNEL`                  | `error_events`            |
    /// | `EVENT_BUFFER_CAPACITY`          | `10000`                   |
    /// | `INITIAL_RETRY_DELAY_MS`         | `1000`                    |
    /// | `MAX_RETRY_DELAY_MS`             | `30000`                   |
    /// | `BACKOFF_MULTIPLIER`             | `2.0`                     |
    /// | `HEALTHY_CHECK_INTERVAL_SECS`    | `30`                      |
    /// | `UNHEALTHY_CHECK_INTERVAL_SECS`  | `1`                       |
    /// | `REPLAY_POLL_INTERVAL_SECS`      | `30`                      |
    /// | `FALLBACK_CLEANUP_INTERVAL_SECS` | `21600`                   |
    /// | `FALLBACK_RETENTION_DAYS`        | `7`                       |
    /// | `FLUSH_POLL_INTERVAL_SECS`       | `5`                       |
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let events_enabled: bool = std::env::var("EVENTS_ENABLED")
            .unwrap_or_else(|_| "true".into())
            .parse()
            .expect("EVENTS_ENABLED must be true or false");

        let buffer_dir = PathBuf::from(
            std::env::var("EVENT_BUFFER_DIR").unwrap_or_else(|_| "./data/event_buffer".into()),
        );
        let fallback_dir = PathBuf::from(
            std::env::var("FALLBACK_STORE_DIR")
                .unwrap_or_else(|_| "./data/fallback_events".into()),
        );

        let channels = EventChannels {
            audit: std::env::var("AUDIT_CHANNEL").unwrap_or_else(|_| "audit_events".into()),
            session: std::env::var("SESSION_CHANNEL").unwrap_or_else(|_| "session_events".into()),
            error: std::env::var("ERROR_CHANNEL").unwrap_or_else(|_| "error_events".into()),
        };

        let buffer_capacity: usize = std::env::var("EVENT_BUFFER_CAPACITY")
            .unwrap_or_else(|_| "10000".into())
            .parse()
            .expect("EVENT_BUFFER_CAPACITY must be a valid usize");

        let initial_retry_delay_ms: u64 = std::env::var("INITIAL_RETRY_DELAY_MS")
            .unwrap_or_else(|_| "1000".into())
            .parse()
            .expect("INITIAL_RETRY_DELAY_MS must be a valid u64");

        let max_retry_delay_ms: u64 = std::env::var("MAX_RETRY_DELAY_MS")
            .unwrap_or_else(|_| "30000".into())
            .parse()
            .expect("MAX_RETRY_DELAY_MS must be a valid u64");

        let backoff_multiplier: f64 = std::env::var("BACKOFF_MULTIPLIER")
            .unwrap_or_else(|_| "2.0".into())
            .parse()
            .expect("BACKOFF_MULTIPLIER must be a valid f64");

        let healthy_check_interval_secs: u64 = std::env::var("HEALTHY_CHECK_INTERVAL_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("HEALTHY_CHECK_INTERVAL_SECS must be a valid u64");

        let unhealthy_check_interval_secs: u64 = std::env::var("UNHEALTHY_CHECK_INTERVAL_SECS")
            .unwrap_or_else(|_| "1".into())
            .parse()
            .expect("UNHEALTHY_CHECK_INTERVAL_SECS must be a valid u64");

        let replay_poll_interval_secs: u64 = std::env::var("REPLAY_POLL_INTERVAL_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REPLAY_POLL_INTERVAL_SECS must be a valid u64");

        let fallback_cleanup_interval_secs: u64 =
            std::env::var("FALLBACK_CLEANUP_INTERVAL_SECS")
                .unwrap_or_else(|_| "21600".into())
                .parse()
                .expect("FALLBACK_CLEANUP_INTERVAL_SECS must be a valid u64");

        let fallback_retention_days: u32 = std::env::var("FALLBACK_RETENTION_DAYS")
            .unwrap_or_else(|_| "7".into())
            .parse()
            .expect("FALLBACK_RETENTION_DAYS must be a valid u32");

        let flush_poll_interval_secs: u64 = std::env::var("FLUSH_POLL_INTERVAL_SECS")
            .unwrap_or_else(|_| "5".into())
            .parse()
            .expect("FLUSH_POLL_INTERVAL_SECS must be a valid u64");

        let pipeline = PipelineConfig {
            buffer_dir,
            fallback_dir,
            channels,
            buffer_capacity,
            monitor: MonitorConfig {
                healthy_check_interval: Duration::from_secs(healthy_check_interval_secs),
                unhealthy_check_interval: Duration::from_secs(unhealthy_check_interval_secs),
                backoff: BackoffConfig {
                    initial_delay: Duration::from_millis(initial_retry_delay_ms),
                    max_delay: Duration::from_millis(max_retry_delay_ms),
                    multiplier: backoff_multiplier,
                },
            },
            replay: ReplayConfig {
                poll_interval: Duration::from_secs(replay_poll_interval_secs),
                cleanup_interval: Duration::from_secs(fallback_cleanup_interval_secs),
                retention_days: fallback_retention_days,
            },
            flush_interval: Duration::from_secs(flush_poll_interval_secs),
        };

        Self {
            database_url,
            events_enabled,
            pipeline,
        }
    }
}
