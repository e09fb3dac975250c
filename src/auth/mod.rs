//! Roles, identity seams, login and the login rate limiter.

mod identity;
mod login;
mod rate_limit;
mod roles;

pub use identity::{AuthenticatedIdentity, IdentityProvider, Profile, ProfileStore};
pub use login::{LOGIN_PATH, LoginFlow, LoginOutcome, LoginRequest, LogoutOutcome};
pub use rate_limit::{
    InMemoryRateLimitStore, LoginRateLimitConfig, LoginRateLimiter, RateLimitEntry,
    RateLimitStatus, RateLimitStore,
};
pub use roles::{Role, can_modify_user, is_admin_role, is_super_admin};
