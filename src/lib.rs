//! Tenantry - tenant isolation and audited admin impersonation
//!
//! Tenantry is the authorization layer of a multi-tenant applicant-tracking
//! system. It decides which tenant's data each request may see, lets platform
//! admins temporarily act inside a tenant for support, and keeps a durable
//! audit trail of both.
//!
//! # Features
//!
//! - **Tenant resolution**: [`TenantResolver`] turns a session into a
//!   [`TenantScope`]; every query filter derives from it, deny-by-default
//! - **Impersonation**: [`ImpersonationManager`] starts and stops audited,
//!   time-boxed impersonation carried in signed cookies
//! - **Guardrails**: destructive operations are refused while impersonating,
//!   enforced by capability permits ([`impersonation::Authorized`])
//! - **Audit log**: append-only, actor taken from the session, best-effort
//! - **Login**: per-origin rate limiting in front of an external identity provider
//! - **Idle timeout**: warning/logout state machine with a tokio driver
//! - **HTTP**: axum routes and middleware
//!
//! Persistence and credential checks live outside the crate behind
//! async traits. [`testing`] has in-memory implementations.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tenantry::testing::{InMemoryAuditStore, InMemoryDirectory, InMemoryImpersonationStore};
//! use tenantry::{AppState, ConfigBuilder};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     tenantry::init_tracing();
//!
//!     let config = ConfigBuilder::new().from_env().build()?;
//!     let directory = Arc::new(InMemoryDirectory::new());
//!     let state = AppState::from_config(
//!         &config,
//!         directory.clone(),
//!         directory,
//!         Arc::new(InMemoryImpersonationStore::new()),
//!         Arc::new(InMemoryAuditStore::new()),
//!     )?;
//!
//!     // Layer your authentication middleware over this router so it
//!     // inserts an `AuthenticatedIdentity` extension.
//!     let app = tenantry::http::router(state);
//!     tenantry::http::serve(&config, app).await?;
//!     Ok(())
//! }
//! ```

pub mod admin;
pub mod audit;
pub mod auth;
pub mod clock;
mod config;
mod error;
pub mod http;
pub mod idle;
pub mod impersonation;
pub mod request;
pub mod session;
pub mod tenancy;
pub mod testing;
pub mod utils;

pub use admin::{TenantAdmin, UserAdmin};
pub use audit::{AuditEventType, AuditLogger};
pub use auth::{AuthenticatedIdentity, LoginFlow, LoginRateLimiter, Role};
pub use clock::{Clock, MockClock, SharedClock, SystemClock};
pub use config::{Config, ConfigBuilder, LoggingConfig, ServerConfig};
pub use error::{ConflictReason, Result, TenantryError};
pub use http::AppState;
pub use idle::{IdleTimeoutConfig, IdleTimeoutDriver};
pub use impersonation::{ImpersonationManager, RestrictedOperation};
pub use request::RequestContext;
pub use session::{ImpersonationCookies, SessionContext};
pub use tenancy::{TenantFilter, TenantResolver, TenantScope};

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging with sensible defaults
///
/// # Environment Variables
///
/// - `RUST_LOG`: Set log level (e.g., "info", "debug", "tenantry=debug")
/// - `TENANTRY_LOG_JSON`: Set to "true" for JSON formatted logs
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json_logs = utils::bool_env_with_prefix("LOG_JSON").unwrap_or(false);
    install_subscriber(env_filter, json_logs);
}

/// Initialize tracing from [`LoggingConfig`]
pub fn init_tracing_with_config(config: &Config) {
    install_subscriber(EnvFilter::new(&config.logging.level), config.logging.json);
}

fn install_subscriber(env_filter: EnvFilter, json: bool) {
    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
