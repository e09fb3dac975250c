//! Audited admin impersonation of tenants.
//!
//! An admin-tier user can temporarily act within a tenant's data scope for
//! support. Each session opens an audit record, expires after a fixed TTL,
//! and blocks the operations listed in [`RestrictedOperation`].

pub mod guard;
mod manager;
mod store;
mod types;

pub use guard::{
    Authorized, GuardedAction, OperationClass, OperationGuard, RestrictedOperation, actions,
    authorize, check_operation_allowed, enforce_operation_restriction,
};
pub use manager::ImpersonationManager;
pub use store::ImpersonationStore;
pub use types::{
    ImpersonationAuditRecord, ImpersonationConfig, ImpersonationStarted, ImpersonationStatus,
    ImpersonationStopped,
};
