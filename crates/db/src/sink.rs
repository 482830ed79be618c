//! Postgres-backed event sink.

use async_trait::async_trait;
use casework_events::{DomainEvent, EventSink, SinkError};
use tracing::debug;

use crate::models::{CreateAuditLog, CreateErrorLog, CreateSessionLog};
use crate::repositories::{AuditLogRepo, ErrorLogRepo, SessionLogRepo};
use crate::DbPool;

/// Routes each event family to its log table.
pub struct PgEventSink {
    pool: DbPool,
}

impl PgEventSink {
    pub fn new(pool: DbPool) -> Self {
        PgEventSink { pool }
    }
}

#[async_trait]
impl EventSink for PgEventSink {
    async fn save(&self, event: &DomainEvent) -> Result<(), SinkError> {
        let id = match event {
            DomainEvent::Audit(audit) => {
                AuditLogRepo::insert(&self.pool, &CreateAuditLog::from_event(audit)).await
            }
            DomainEvent::SessionLogin(login) => {
                SessionLogRepo::insert(&self.pool, &CreateSessionLog::from_login(login)).await
            }
            DomainEvent::SessionLogout(logout) => {
                SessionLogRepo::insert(&self.pool, &CreateSessionLog::from_logout(logout)).await
            }
            DomainEvent::Error(error) => {
                ErrorLogRepo::insert(&self.pool, &CreateErrorLog::from_event(error)).await
            }
        }
        .map_err(classify_sqlx_error)?;
        debug!(event_type = %event.kind(), id, "Event persisted");
        Ok(())
    }
}

/// Separates "the database is gone" from "this write failed". Only the former
/// is a connectivity signal; the distinction keeps log noise honest but does
/// not change control flow, which is driven by the health monitor.
fn classify_sqlx_error(error: sqlx::Error) -> SinkError {
    match error {
        sqlx::Error::Io(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Tls(_) => SinkError::Unavailable(error.to_string()),
        other => SinkError::Persistence(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_exhaustion_is_unavailable() {
        assert!(classify_sqlx_error(sqlx::Error::PoolTimedOut).is_unavailable());
        assert!(classify_sqlx_error(sqlx::Error::PoolClosed).is_unavailable());
    }

    #[test]
    fn io_failure_is_unavailable() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(classify_sqlx_error(sqlx::Error::Io(io)).is_unavailable());
    }

    #[test]
    fn query_failure_is_persistence() {
        assert!(!classify_sqlx_error(sqlx::Error::RowNotFound).is_unavailable());
    }
}
