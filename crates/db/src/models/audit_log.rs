//! Audit log insert DTO.

use casework_core::audit::redact_sensitive_fields;
use casework_core::types::{DbId, Timestamp};
use casework_events::AuditEvent;

/// Values for a new `audit_logs` row.
#[derive(Debug, Clone)]
pub struct CreateAuditLog {
    pub actor_user_id: Option<DbId>,
    pub actor_name: Option<String>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<DbId>,
    pub old_values: Option<serde_json::Value>,
    pub new_values: Option<serde_json::Value>,
    pub occurred_at: Timestamp,
}

impl CreateAuditLog {
    /// Maps an audit event to row values. The value snapshots are redacted
    /// here; this is the enforcement point regardless of what producers did.
    pub fn from_event(event: &AuditEvent) -> CreateAuditLog {
        let mut old_values = event.old_values.clone();
        let mut new_values = event.new_values.clone();
        if let Some(values) = old_values.as_mut() {
            redact_sensitive_fields(values);
        }
        if let Some(values) = new_values.as_mut() {
            redact_sensitive_fields(values);
        }
        CreateAuditLog {
            actor_user_id: event.actor_user_id,
            actor_name: event.actor_name.clone(),
            action: event.action.clone(),
            entity_type: event.entity_type.clone(),
            entity_id: event.entity_id,
            old_values,
            new_values,
            occurred_at: event.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casework_core::audit::action_types;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[test]
    fn from_event_redacts_value_snapshots() {
        let event = AuditEvent {
            actor_user_id: Some(9),
            actor_name: Some("Jonas".to_string()),
            action: action_types::ENTITY_UPDATE.to_string(),
            entity_type: "user".to_string(),
            entity_id: Some(31),
            old_values: Some(json!({"email": "a@b.c", "password_hash": "old"})),
            new_values: Some(json!({"email": "a@b.c", "password_hash": "new"})),
            timestamp: Utc.with_ymd_and_hms(2026, 8, 20, 10, 0, 0).unwrap(),
        };

        let row = CreateAuditLog::from_event(&event);

        assert_eq!(row.old_values.as_ref().unwrap()["password_hash"], "[REDACTED]");
        assert_eq!(row.new_values.as_ref().unwrap()["password_hash"], "[REDACTED]");
        assert_eq!(row.old_values.as_ref().unwrap()["email"], "a@b.c");
        assert_eq!(row.occurred_at, event.timestamp);
        // The source event is left untouched.
        assert_eq!(event.old_values.as_ref().unwrap()["password_hash"], "old");
    }

    #[test]
    fn from_event_passes_missing_snapshots_through() {
        let event = AuditEvent {
            actor_user_id: None,
            actor_name: None,
            action: action_types::SYSTEM.to_string(),
            entity_type: "service".to_string(),
            entity_id: None,
            old_values: None,
            new_values: None,
            timestamp: Utc::now(),
        };

        let row = CreateAuditLog::from_event(&event);
        assert!(row.old_values.is_none());
        assert!(row.new_values.is_none());
    }
}
