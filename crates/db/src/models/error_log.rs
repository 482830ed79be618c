//! Error log insert DTO.

use casework_core::types::Timestamp;
use casework_events::ErrorEvent;

/// Values for a new `error_logs` row.
#[derive(Debug, Clone)]
pub struct CreateErrorLog {
    pub source: String,
    pub message: String,
    pub severity: String,
    pub context: Option<serde_json::Value>,
    pub stack_trace: Option<String>,
    pub occurred_at: Timestamp,
}

impl CreateErrorLog {
    pub fn from_event(event: &ErrorEvent) -> CreateErrorLog {
        CreateErrorLog {
            source: event.source.clone(),
            message: event.message.clone(),
            severity: event.severity.as_str().to_string(),
            context: event.context.clone(),
            stack_trace: event.stack_trace.clone(),
            occurred_at: event.timestamp,
        }
    }
}
