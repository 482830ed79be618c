//! `audit_logs` table access.

use casework_core::types::DbId;

use crate::models::CreateAuditLog;
use crate::DbPool;

const INSERT_AUDIT_LOG: &str = r#"
INSERT INTO audit_logs
    (actor_user_id, actor_name, action, entity_type, entity_id,
     old_values, new_values, occurred_at)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
RETURNING id
"#;

pub struct AuditLogRepo;

impl AuditLogRepo {
    pub async fn insert(pool: &DbPool, log: &CreateAuditLog) -> Result<DbId, sqlx::Error> {
        let (id,): (DbId,) = sqlx::query_as(INSERT_AUDIT_LOG)
            .bind(log.actor_user_id)
            .bind(&log.actor_name)
            .bind(&log.action)
            .bind(&log.entity_type)
            .bind(log.entity_id)
            .bind(&log.old_values)
            .bind(&log.new_values)
            .bind(log.occurred_at)
            .fetch_one(pool)
            .await?;
        Ok(id)
    }
}
