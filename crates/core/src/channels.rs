//! Well-known event channel names.
//!
//! Producers and the subscriber must agree on these exactly; they are also the
//! defaults for the `*_CHANNEL` environment overrides.

/// Entity audit trail events.
pub const CHANNEL_AUDIT: &str = "audit_events";

/// Session login/logout events.
pub const CHANNEL_SESSION: &str = "session_events";

/// Application error reports.
pub const CHANNEL_ERROR: &str = "error_events";
