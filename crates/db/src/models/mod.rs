//! Insert DTOs for the log tables.

pub mod audit_log;
pub mod error_log;
pub mod session_log;

pub use audit_log::CreateAuditLog;
pub use error_log::CreateErrorLog;
pub use session_log::CreateSessionLog;
