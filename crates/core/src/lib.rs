//! Shared domain vocabulary for the Casework platform.
//!
//! This crate has no internal dependencies and holds the pieces every other
//! crate agrees on: scalar type aliases, the audit action vocabulary with its
//! redaction rules, and the well-known event channel names.

pub mod audit;
pub mod channels;
pub mod types;
