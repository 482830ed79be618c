//! Session log insert DTO.

use casework_core::audit::action_types;
use casework_core::types::{DbId, Timestamp};
use casework_events::{SessionLoginEvent, SessionLogoutEvent};

/// Values for a new `session_logs` row. Logins and logouts share the table,
/// discriminated by `action`.
#[derive(Debug, Clone)]
pub struct CreateSessionLog {
    pub user_id: DbId,
    pub username: String,
    /// `action_types::LOGIN` or `action_types::LOGOUT`.
    pub action: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub session_duration_secs: Option<i64>,
    pub occurred_at: Timestamp,
}

impl CreateSessionLog {
    pub fn from_login(event: &SessionLoginEvent) -> CreateSessionLog {
        CreateSessionLog {
            user_id: event.user_id,
            username: event.username.clone(),
            action: action_types::LOGIN.to_string(),
            ip_address: event.ip_address.clone(),
            user_agent: event.user_agent.clone(),
            session_duration_secs: None,
            occurred_at: event.timestamp,
        }
    }

    pub fn from_logout(event: &SessionLogoutEvent) -> CreateSessionLog {
        CreateSessionLog {
            user_id: event.user_id,
            username: event.username.clone(),
            action: action_types::LOGOUT.to_string(),
            ip_address: None,
            user_agent: None,
            session_duration_secs: event.session_duration_secs,
            occurred_at: event.timestamp,
        }
    }
}
