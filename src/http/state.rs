use crate::audit::{AuditLogger, AuditStore};
use crate::auth::ProfileStore;
use crate::config::Config;
use crate::error::Result;
use crate::impersonation::{ImpersonationManager, ImpersonationStore};
use crate::request::TrustProxy;
use crate::session::ImpersonationCookies;
use crate::tenancy::{TenantResolver, TenantStore};
use axum::extract::FromRef;
use std::sync::Arc;

/// Shared state for the impersonation routes and session middleware.
#[derive(Clone)]
pub struct AppState {
    pub impersonation: Arc<ImpersonationManager>,
    pub resolver: TenantResolver,
    pub cookies: ImpersonationCookies,
    pub trust_proxy: TrustProxy,
}

impl AppState {
    pub fn new(
        impersonation: Arc<ImpersonationManager>,
        resolver: TenantResolver,
        cookies: ImpersonationCookies,
    ) -> Self {
        Self {
            impersonation,
            resolver,
            cookies,
            trust_proxy: TrustProxy(false),
        }
    }

    #[must_use]
    pub fn with_trust_proxy(mut self, trust: bool) -> Self {
        self.trust_proxy = TrustProxy(trust);
        self
    }

    /// Wire the default components over the given stores.
    ///
    /// # Errors
    ///
    /// Fails if the cookie signing key is missing or malformed.
    pub fn from_config(
        config: &Config,
        profiles: Arc<dyn ProfileStore>,
        tenants: Arc<dyn TenantStore>,
        records: Arc<dyn ImpersonationStore>,
        audit: Arc<dyn AuditStore>,
    ) -> Result<Self> {
        let cookies = ImpersonationCookies::new(&config.session)?;
        let manager = ImpersonationManager::new(
            profiles.clone(),
            tenants,
            records,
            AuditLogger::new(audit),
        )
        .with_config(config.impersonation.clone());

        Ok(Self::new(Arc::new(manager), TenantResolver::new(profiles), cookies)
            .with_trust_proxy(config.server.trust_proxy))
    }
}

impl FromRef<AppState> for TrustProxy {
    fn from_ref(state: &AppState) -> Self {
        state.trust_proxy
    }
}
