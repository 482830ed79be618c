//! Store connectivity probe.

use std::time::Duration;

use async_trait::async_trait;
use casework_events::HealthProbe;

use crate::{can_connect, DbPool};

/// Default ceiling for one probe round trip. Must stay well under the
/// unhealthy-side retry delays or probes would overlap their own schedule.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Answers "can we reach Postgres right now" for the health monitor.
pub struct PgHealthProbe {
    pool: DbPool,
    timeout: Duration,
}

impl PgHealthProbe {
    pub fn new(pool: DbPool) -> Self {
        Self::with_timeout(pool, DEFAULT_PROBE_TIMEOUT)
    }

    pub fn with_timeout(pool: DbPool, timeout: Duration) -> Self {
        PgHealthProbe { pool, timeout }
    }
}

#[async_trait]
impl HealthProbe for PgHealthProbe {
    async fn is_healthy(&self) -> bool {
        can_connect(&self.pool, self.timeout).await
    }
}
