//! Append-only audit trail for administrative and authentication events.

mod logger;
mod store;
mod types;

pub use logger::AuditLogger;
pub use store::AuditStore;
pub use types::{AuditEntry, AuditEvent, AuditEventType, TargetType};
