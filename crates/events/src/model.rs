//! Typed domain events and the closed event union.
//!
//! Four event families flow through the pipeline. Producers construct the
//! typed structs below; everything past the publish call handles the closed
//! [`DomainEvent`] union so a new family cannot be added without the compiler
//! pointing at every match that must learn about it.

use casework_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};

/// Recorded for every audited entity mutation (create/update/delete) and for
/// system-level actions that have no entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Acting user, if the action was performed by a logged-in user.
    pub actor_user_id: Option<DbId>,
    /// Display name captured at event time; survives later user renames.
    pub actor_name: Option<String>,
    /// One of the `casework_core::audit::action_types` constants.
    pub action: String,
    /// Entity kind the action touched, e.g. `"project"` or `"cabinet"`.
    pub entity_type: String,
    pub entity_id: Option<DbId>,
    /// Snapshot before the change. Sensitive fields are redacted again at
    /// the persistence boundary, but producers should not rely on that.
    pub old_values: Option<serde_json::Value>,
    /// Snapshot after the change.
    pub new_values: Option<serde_json::Value>,
    pub timestamp: Timestamp,
}

/// Emitted when a user session is established.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionLoginEvent {
    pub user_id: DbId,
    pub username: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub timestamp: Timestamp,
}

/// Emitted when a user session ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionLogoutEvent {
    pub user_id: DbId,
    pub username: String,
    /// Wall-clock session length. `None` when the login record could not be
    /// correlated (e.g. logout after a service restart).
    pub session_duration_secs: Option<i64>,
    pub timestamp: Timestamp,
}

/// Application error report captured for operator review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEvent {
    /// Component that raised the error, e.g. `"pricing"` or `"import"`.
    pub source: String,
    pub message: String,
    pub severity: ErrorSeverity,
    /// Free-form structured context supplied by the reporting site.
    pub context: Option<serde_json::Value>,
    pub stack_trace: Option<String>,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    Warning,
    Error,
    Critical,
}

impl ErrorSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorSeverity::Warning => "warning",
            ErrorSeverity::Error => "error",
            ErrorSeverity::Critical => "critical",
        }
    }
}

// -----------------------------------------------------------------------------
// Event kinds
// -----------------------------------------------------------------------------

/// Wire tag identifying an event family. The string values are part of the
/// persisted format (envelopes, buffer files) and must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Audit,
    SessionLogin,
    SessionLogout,
    Error,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Audit => "entity_audit",
            EventKind::SessionLogin => "session_login",
            EventKind::SessionLogout => "session_logout",
            EventKind::Error => "application_error",
        }
    }

    /// Parses a wire tag. Returns `None` for anything outside the closed set.
    pub fn parse(tag: &str) -> Option<EventKind> {
        match tag {
            "entity_audit" => Some(EventKind::Audit),
            "session_login" => Some(EventKind::SessionLogin),
            "session_logout" => Some(EventKind::SessionLogout),
            "application_error" => Some(EventKind::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// -----------------------------------------------------------------------------
// The closed union
// -----------------------------------------------------------------------------

/// Any event the pipeline can carry.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    Audit(AuditEvent),
    SessionLogin(SessionLoginEvent),
    SessionLogout(SessionLogoutEvent),
    Error(ErrorEvent),
}

impl DomainEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            DomainEvent::Audit(_) => EventKind::Audit,
            DomainEvent::SessionLogin(_) => EventKind::SessionLogin,
            DomainEvent::SessionLogout(_) => EventKind::SessionLogout,
            DomainEvent::Error(_) => EventKind::Error,
        }
    }

    /// Serializes the typed body (without any envelope) to a JSON string.
    pub fn encode_payload(&self) -> Result<String, serde_json::Error> {
        match self {
            DomainEvent::Audit(event) => serde_json::to_string(event),
            DomainEvent::SessionLogin(event) => serde_json::to_string(event),
            DomainEvent::SessionLogout(event) => serde_json::to_string(event),
            DomainEvent::Error(event) => serde_json::to_string(event),
        }
    }

    /// Decodes a typed body previously produced by [`encode_payload`] for the
    /// given kind.
    ///
    /// [`encode_payload`]: DomainEvent::encode_payload
    pub fn decode(kind: EventKind, payload: &str) -> Result<DomainEvent, serde_json::Error> {
        let event = match kind {
            EventKind::Audit => DomainEvent::Audit(serde_json::from_str(payload)?),
            EventKind::SessionLogin => DomainEvent::SessionLogin(serde_json::from_str(payload)?),
            EventKind::SessionLogout => DomainEvent::SessionLogout(serde_json::from_str(payload)?),
            EventKind::Error => DomainEvent::Error(serde_json::from_str(payload)?),
        };
        Ok(event)
    }
}
