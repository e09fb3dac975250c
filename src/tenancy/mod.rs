//! Tenant isolation.
//!
//! Resolve the effective tenant once per request with [`TenantResolver`], then
//! derive every query predicate from [`TenantScope::filter`].

mod filter;
mod resolver;
mod tenant;

pub use filter::{TenantFilter, TenantScope};
pub use resolver::{TenantResolver, resolve_scope};
pub use tenant::{Tenant, TenantOwned, TenantStore};
