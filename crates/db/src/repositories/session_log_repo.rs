//! `session_logs` table access.

use casework_core::types::DbId;

use crate::models::CreateSessionLog;
use crate::DbPool;

const INSERT_SESSION_LOG: &str = r#"
INSERT INTO session_logs
    (user_id, username, action, ip_address, user_agent,
     session_duration_secs, occurred_at)
VALUES ($1, $2, $3, $4, $5, $6, $7)
RETURNING id
"#;

pub struct SessionLogRepo;

impl SessionLogRepo {
    pub async fn insert(pool: &DbPool, log: &CreateSessionLog) -> Result<DbId, sqlx::Error> {
        let (id,): (DbId,) = sqlx::query_as(INSERT_SESSION_LOG)
            .bind(log.user_id)
            .bind(&log.username)
            .bind(&log.action)
            .bind(&log.ip_address)
            .bind(&log.user_agent)
            .bind(log.session_duration_secs)
            .bind(log.occurred_at)
            .fetch_one(pool)
            .await?;
        Ok(id)
    }
}
