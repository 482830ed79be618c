//! Insert-only repositories for the log tables.
//!
//! One repository struct per table, associated functions taking the pool
//! explicitly. Queries are runtime-checked (`sqlx::query_as`) rather than
//! macro-checked so the crate builds without a live database.

pub mod audit_log_repo;
pub mod error_log_repo;
pub mod session_log_repo;

pub use audit_log_repo::AuditLogRepo;
pub use error_log_repo::ErrorLogRepo;
pub use session_log_repo::SessionLogRepo;
