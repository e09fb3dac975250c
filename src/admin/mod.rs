//! Platform administration of users and tenants.
//!
//! Every mutating method takes an [`Authorized`](crate::impersonation::Authorized)
//! permit for its action, obtained from
//! [`authorize`](crate::impersonation::authorize) against the caller's
//! [`TenantScope`](crate::tenancy::TenantScope).
//!
//! # Example
//!
//! ```rust,ignore
//! use tenantry::impersonation::{authorize, guard::actions};
//!
//! let scope = resolver.resolve_effective_tenant(&session).await?;
//! let permit = authorize::<actions::DeleteTenant>(&scope)?;
//! tenant_admin.delete_tenant(&session, &request, "tenant-42", permit).await?;
//! ```

mod tenants;
mod users;

pub use tenants::TenantAdmin;
pub use users::{NewUser, UserAdmin, UserStore};
