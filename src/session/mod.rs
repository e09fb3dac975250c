//! Session state and impersonation cookies.
//!
//! [`SessionContext`] is the per-request view of the caller and any active
//! impersonation. [`ImpersonationCookies`] persists the impersonation part of
//! it between requests.

mod config;
mod context;
mod cookie;

pub use config::SessionConfig;
pub use context::{ImpersonationContext, SessionContext};
pub use self::cookie::{
    AUDIT_REF_COOKIE, ImpersonationCookies, TENANT_ID_COOKIE, TENANT_NAME_COOKIE,
    jar_from_headers, set_cookie_headers,
};
