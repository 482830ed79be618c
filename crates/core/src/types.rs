//! Scalar type aliases used across the platform.

/// Database primary key. All Casework tables use PostgreSQL `BIGSERIAL` keys.
pub type DbId = i64;

/// Canonical timestamp type. Everything is stored and transported in UTC;
/// presentation-local conversion is a client concern.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
