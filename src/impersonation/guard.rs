//! Operations an impersonating admin may not perform.
//!
//! While impersonating, an admin can work with the tenant's data but cannot
//! take high-impact actions. Every mutating admin action declares its
//! [`OperationClass`] through [`GuardedAction`]; the methods that perform
//! those actions take an [`Authorized`] permit that only [`authorize`] can
//! produce, so the check cannot be skipped.
//!
//! # Tracing Events
//!
//! - `auth.impersonation.blocked` - Restricted operation attempted while impersonating
//! - `auth.impersonation.out_of_scope` - Write aimed at a tenant outside the scope

use crate::error::{Result, TenantryError};
use crate::tenancy::TenantScope;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::marker::PhantomData;

/// High-impact operations forbidden during impersonation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestrictedOperation {
    DeleteTenant,
    DeleteUser,
    ChangePassword,
    UpdateBilling,
    TransferOwnership,
    ManageAdminUsers,
}

impl RestrictedOperation {
    pub const ALL: [Self; 6] = [
        Self::DeleteTenant,
        Self::DeleteUser,
        Self::ChangePassword,
        Self::UpdateBilling,
        Self::TransferOwnership,
        Self::ManageAdminUsers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DeleteTenant => "delete_tenant",
            Self::DeleteUser => "delete_user",
            Self::ChangePassword => "change_password",
            Self::UpdateBilling => "update_billing",
            Self::TransferOwnership => "transfer_ownership",
            Self::ManageAdminUsers => "manage_admin_users",
        }
    }

    /// Human-readable phrase, e.g. "delete a tenant".
    pub fn description(&self) -> &'static str {
        match self {
            Self::DeleteTenant => "delete a tenant",
            Self::DeleteUser => "delete a user",
            Self::ChangePassword => "change a password",
            Self::UpdateBilling => "update billing",
            Self::TransferOwnership => "transfer ownership",
            Self::ManageAdminUsers => "manage admin users",
        }
    }
}

impl std::fmt::Display for RestrictedOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns the refusal message if `operation` is not allowed in `scope`.
pub fn check_operation_allowed(scope: &TenantScope, operation: RestrictedOperation) -> Option<String> {
    if !scope.is_impersonating {
        return None;
    }
    Some(format!(
        "You cannot {} while impersonating a tenant. Stop impersonating to continue.",
        operation.description()
    ))
}

/// Fail with `Forbidden` if `operation` is not allowed in `scope`.
pub fn enforce_operation_restriction(scope: &TenantScope, operation: RestrictedOperation) -> Result<()> {
    match check_operation_allowed(scope, operation) {
        None => Ok(()),
        Some(message) => {
            tracing::warn!(
                target: "auth.impersonation.blocked",
                operation = %operation,
                tenant_id = ?scope.tenant_id,
                "Restricted operation blocked during impersonation"
            );
            Err(TenantryError::Forbidden(message))
        }
    }
}

/// How an action interacts with impersonation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationClass {
    /// Forbidden while impersonating.
    Restricted(RestrictedOperation),
    /// Ordinary tenant data writes. Allowed while impersonating.
    TenantData,
}

/// A mutating action. Implementors must state their class.
pub trait GuardedAction {
    const CLASS: OperationClass;
}

/// Proof that the guard approved action `A` for the current scope.
///
/// The permit remembers the scope it was issued for, so the action can
/// confine itself to the tenant being viewed.
#[derive(Debug)]
pub struct Authorized<A: GuardedAction> {
    scope: TenantScope,
    _action: PhantomData<fn() -> A>,
}

impl<A: GuardedAction> Authorized<A> {
    /// The scope the permit was issued for.
    pub fn scope(&self) -> &TenantScope {
        &self.scope
    }

    /// Fail with the tenant-hiding `NotFound` unless `tenant_id` is visible
    /// in the permit's scope.
    pub fn ensure_tenant(&self, tenant_id: &str) -> Result<()> {
        if self.scope.filter().permits(tenant_id) {
            Ok(())
        } else {
            tracing::warn!(
                target: "auth.impersonation.out_of_scope",
                tenant_id = %tenant_id,
                scope_tenant_id = ?self.scope.tenant_id,
                "Write outside the current tenant scope refused"
            );
            Err(TenantryError::not_found_or_forbidden("Tenant"))
        }
    }
}

/// Run the guard for action `A`.
pub fn authorize<A: GuardedAction>(scope: &TenantScope) -> Result<Authorized<A>> {
    if let OperationClass::Restricted(operation) = A::CLASS {
        enforce_operation_restriction(scope, operation)?;
    }
    Ok(Authorized {
        scope: scope.clone(),
        _action: PhantomData,
    })
}

/// Check-then-act wrapper around [`authorize`].
pub struct OperationGuard;

impl OperationGuard {
    /// Authorize `A` and only then run `body` with the permit.
    pub async fn run<A, F, Fut, T>(scope: &TenantScope, body: F) -> Result<T>
    where
        A: GuardedAction,
        F: FnOnce(Authorized<A>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let permit = authorize::<A>(scope)?;
        body(permit).await
    }
}

/// Marker types for the actions this crate performs.
pub mod actions {
    use super::{GuardedAction, OperationClass, RestrictedOperation};

    macro_rules! restricted {
        ($($name:ident),* $(,)?) => {
            $(
                #[derive(Debug)]
                pub struct $name;

                impl GuardedAction for $name {
                    const CLASS: OperationClass =
                        OperationClass::Restricted(RestrictedOperation::$name);
                }
            )*
        };
    }

    restricted!(
        DeleteTenant,
        DeleteUser,
        ChangePassword,
        UpdateBilling,
        TransferOwnership,
        ManageAdminUsers,
    );

    /// Create or rename a tenant, or toggle a customer account.
    #[derive(Debug)]
    pub struct ManageTenantRecords;

    impl GuardedAction for ManageTenantRecords {
        const CLASS: OperationClass = OperationClass::TenantData;
    }
}
