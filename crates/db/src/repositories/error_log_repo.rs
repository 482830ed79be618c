//! `error_logs` table access.

use casework_core::types::DbId;

use crate::models::CreateErrorLog;
use crate::DbPool;

const INSERT_ERROR_LOG: &str = r#"
INSERT INTO error_logs
    (source, message, severity, context, stack_trace, occurred_at)
VALUES ($1, $2, $3, $4, $5, $6)
RETURNING id
"#;

pub struct ErrorLogRepo;

impl ErrorLogRepo {
    pub async fn insert(pool: &DbPool, log: &CreateErrorLog) -> Result<DbId, sqlx::Error> {
        let (id,): (DbId,) = sqlx::query_as(INSERT_ERROR_LOG)
            .bind(&log.source)
            .bind(&log.message)
            .bind(&log.severity)
            .bind(&log.context)
            .bind(&log.stack_trace)
            .bind(log.occurred_at)
            .fetch_one(pool)
            .await?;
        Ok(id)
    }
}
