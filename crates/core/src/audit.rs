//! Audit trail vocabulary and field redaction.
//!
//! Every audited mutation on the platform is recorded with one of the action
//! constants below. Values captured alongside an entity change may contain
//! credentials or tokens, so the before/after snapshots are passed through
//! [`redact_sensitive_fields`] before they leave the process.

/// Action identifiers recorded in the audit trail.
///
/// Stored as plain strings so historic rows stay readable even if the
/// vocabulary grows.
pub mod action_types {
    pub const LOGIN: &str = "LOGIN";
    pub const LOGOUT: &str = "LOGOUT";
    pub const ENTITY_CREATE: &str = "ENTITY_CREATE";
    pub const ENTITY_UPDATE: &str = "ENTITY_UPDATE";
    pub const ENTITY_DELETE: &str = "ENTITY_DELETE";
    pub const CONFIG_CHANGE: &str = "CONFIG_CHANGE";
    pub const SYSTEM: &str = "SYSTEM";
}

/// Field name fragments that must never appear in persisted audit snapshots.
/// Matching is case-insensitive and substring-based, so `user_password_hash`
/// is caught by `password`.
pub const SENSITIVE_FIELDS: &[&str] = &[
    "password",
    "secret",
    "token",
    "api_key",
    "credential",
];

const REDACTED_PLACEHOLDER: &str = "[REDACTED]";

/// Recursively replaces the values of sensitive fields in a JSON document
/// with a fixed placeholder. Arrays and nested objects are walked; scalar
/// roots are left untouched.
pub fn redact_sensitive_fields(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, entry) in map.iter_mut() {
                if is_sensitive(key) {
                    *entry = serde_json::Value::String(REDACTED_PLACEHOLDER.to_string());
                } else {
                    redact_sensitive_fields(entry);
                }
            }
        }
        serde_json::Value::Array(items) => {
            for item in items.iter_mut() {
                redact_sensitive_fields(item);
            }
        }
        _ => {}
    }
}

fn is_sensitive(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SENSITIVE_FIELDS.iter().any(|field| key.contains(field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn redacts_top_level_sensitive_field() {
        let mut value = json!({"username": "mara", "password": "hunter2"});
        redact_sensitive_fields(&mut value);
        assert_eq!(value["username"], "mara");
        assert_eq!(value["password"], "[REDACTED]");
    }

    #[test]
    fn redacts_nested_objects_and_arrays() {
        let mut value = json!({
            "profile": {"api_key": "abc123", "display_name": "Mara"},
            "sessions": [{"token": "t1"}, {"token": "t2"}],
        });
        redact_sensitive_fields(&mut value);
        assert_eq!(value["profile"]["api_key"], "[REDACTED]");
        assert_eq!(value["profile"]["display_name"], "Mara");
        assert_eq!(value["sessions"][0]["token"], "[REDACTED]");
        assert_eq!(value["sessions"][1]["token"], "[REDACTED]");
    }

    #[test]
    fn matches_substrings_case_insensitively() {
        let mut value = json!({"UserPasswordHash": "x", "ApiKeyId": "y"});
        redact_sensitive_fields(&mut value);
        assert_eq!(value["UserPasswordHash"], "[REDACTED]");
        assert_eq!(value["ApiKeyId"], "[REDACTED]");
    }

    #[test]
    fn leaves_non_sensitive_fields_alone() {
        let mut value = json!({"width_mm": 600, "material": "oak veneer"});
        let before = value.clone();
        redact_sensitive_fields(&mut value);
        assert_eq!(value, before);
    }

    #[test]
    fn scalar_roots_are_untouched() {
        let mut value = json!("password");
        redact_sensitive_fields(&mut value);
        assert_eq!(value, json!("password"));
    }
}
