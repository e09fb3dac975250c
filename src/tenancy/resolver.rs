//! Effective tenant resolution.
//!
//! Every tenant-scoped request resolves a [`TenantScope`] before touching
//! data. All query filters derive from its `tenant_id`.
//!
//! # Tracing Events
//!
//! - `tenancy.resolver.ignored_impersonation` - Non-admin carried an impersonation context
//! - `tenancy.resolver.foreign_impersonation` - Context started by a different user
//! - `tenancy.resolver.least_privilege` - Missing, inactive or inconsistent profile

use super::filter::TenantScope;
use crate::auth::{Profile, ProfileStore};
use crate::clock::{SharedClock, system_clock};
use crate::error::{Result, TenantryError};
use crate::session::{ImpersonationContext, SessionContext};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Resolves the effective tenant for the current session.
#[derive(Clone)]
pub struct TenantResolver {
    profiles: Arc<dyn ProfileStore>,
    clock: SharedClock,
}

impl TenantResolver {
    pub fn new(profiles: Arc<dyn ProfileStore>) -> Self {
        Self {
            profiles,
            clock: system_clock(),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Resolve `(tenant_id, is_admin, is_impersonating)` for `session`.
    ///
    /// # Errors
    ///
    /// `Unauthenticated` when the session carries no identity. Profile store
    /// failures propagate so the caller denies the request.
    pub async fn resolve_effective_tenant(&self, session: &SessionContext) -> Result<TenantScope> {
        let identity = session
            .identity
            .as_ref()
            .ok_or_else(|| TenantryError::unauthenticated("Authentication required"))?;

        let profile = self.profiles.find_profile(&identity.user_id).await?;

        Ok(resolve_scope(
            &identity.user_id,
            profile.as_ref(),
            session.impersonation(),
            self.clock.now(),
        ))
    }
}

/// Pure scope computation.
pub fn resolve_scope(
    user_id: &str,
    profile: Option<&Profile>,
    impersonation: Option<&ImpersonationContext>,
    now: DateTime<Utc>,
) -> TenantScope {
    let Some(profile) = profile.filter(|p| p.is_active && p.is_consistent()) else {
        tracing::debug!(
            target: "tenancy.resolver.least_privilege",
            user_id = %user_id,
            profile_found = profile.is_some(),
            "Resolving least-privileged scope"
        );
        return TenantScope::least_privilege();
    };

    let live = impersonation.filter(|c| !c.is_expired(now));
    if let Some(context) = live.filter(|c| c.admin_id != user_id) {
        tracing::warn!(
            target: "tenancy.resolver.foreign_impersonation",
            user_id = %user_id,
            admin_id = %context.admin_id,
            tenant_id = %context.tenant_id,
            "Ignoring impersonation context started by another user"
        );
    }
    let live = live.filter(|c| c.admin_id == user_id);

    if profile.role.is_admin() {
        return match live {
            Some(context) => TenantScope {
                tenant_id: Some(context.tenant_id.clone()),
                is_admin: true,
                is_impersonating: true,
            },
            None => TenantScope {
                tenant_id: None,
                is_admin: true,
                is_impersonating: false,
            },
        };
    }

    if let Some(context) = live {
        tracing::warn!(
            target: "tenancy.resolver.ignored_impersonation",
            user_id = %user_id,
            role = %profile.role,
            tenant_id = %context.tenant_id,
            "Ignoring impersonation context held by non-admin"
        );
    }

    TenantScope {
        tenant_id: profile.tenant_id.clone(),
        is_admin: false,
        is_impersonating: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthenticatedIdentity, Role};
    use crate::clock::{Clock, MockClock};
    use crate::testing::InMemoryDirectory;
    use chrono::TimeDelta;

    fn context(tenant: &str, expires_at: DateTime<Utc>) -> ImpersonationContext {
        ImpersonationContext {
            admin_id: "a1".to_string(),
            tenant_id: tenant.to_string(),
            tenant_name: tenant.to_uppercase(),
            audit_log_id: None,
            expires_at,
        }
    }

    #[test]
    fn test_customer_gets_home_tenant() {
        let profile = Profile::customer("c1", "c1@x.io", "tenant-a");
        let scope = resolve_scope("c1", Some(&profile), None, Utc::now());
        assert_eq!(scope.tenant_id.as_deref(), Some("tenant-a"));
        assert!(!scope.is_admin);
        assert!(!scope.is_impersonating);
    }

    #[test]
    fn test_admin_without_impersonation_has_no_tenant() {
        let profile = Profile::admin("a1", "a1@x.io", Role::Admin);
        let scope = resolve_scope("a1", Some(&profile), None, Utc::now());
        assert_eq!(scope.tenant_id, None);
        assert!(scope.is_admin);
        assert!(!scope.is_impersonating);
    }

    #[test]
    fn test_impersonation_overrides_home_tenant() {
        let now = Utc::now();
        let profile = Profile::admin("a1", "a1@x.io", Role::SuperAdmin);
        let ctx = context("tenant-b", now + TimeDelta::hours(8));
        let scope = resolve_scope("a1", Some(&profile), Some(&ctx), now);
        assert_eq!(scope.tenant_id.as_deref(), Some("tenant-b"));
        assert!(scope.is_admin);
        assert!(scope.is_impersonating);
    }

    #[test]
    fn test_expired_impersonation_is_ignored() {
        let now = Utc::now();
        let profile = Profile::admin("a1", "a1@x.io", Role::Admin);
        let ctx = context("tenant-b", now - TimeDelta::seconds(1));
        let scope = resolve_scope("a1", Some(&profile), Some(&ctx), now);
        assert_eq!(scope.tenant_id, None);
        assert!(!scope.is_impersonating);
    }

    #[test]
    fn test_impersonation_started_by_another_admin_is_ignored() {
        let now = Utc::now();
        let profile = Profile::admin("a2", "a2@x.io", Role::Admin);
        let ctx = context("tenant-b", now + TimeDelta::hours(8));
        let scope = resolve_scope("a2", Some(&profile), Some(&ctx), now);
        assert_eq!(scope.tenant_id, None);
        assert!(scope.is_admin);
        assert!(!scope.is_impersonating);
    }

    #[test]
    fn test_customer_impersonation_context_is_ignored() {
        let now = Utc::now();
        let profile = Profile::customer("c1", "c1@x.io", "tenant-a");
        let ctx = context("tenant-b", now + TimeDelta::hours(1));
        let scope = resolve_scope("c1", Some(&profile), Some(&ctx), now);
        assert_eq!(scope.tenant_id.as_deref(), Some("tenant-a"));
        assert!(!scope.is_impersonating);
    }

    #[test]
    fn test_missing_profile_is_least_privilege() {
        let scope = resolve_scope("ghost", None, None, Utc::now());
        assert_eq!(scope, TenantScope::least_privilege());
    }

    #[test]
    fn test_inactive_or_inconsistent_profile_is_least_privilege() {
        let mut inactive = Profile::customer("c1", "c1@x.io", "tenant-a");
        inactive.is_active = false;
        assert_eq!(
            resolve_scope("c1", Some(&inactive), None, Utc::now()),
            TenantScope::least_privilege()
        );

        let mut orphan = Profile::customer("c2", "c2@x.io", "tenant-a");
        orphan.tenant_id = None;
        assert_eq!(
            resolve_scope("c2", Some(&orphan), None, Utc::now()),
            TenantScope::least_privilege()
        );
    }

    #[tokio::test]
    async fn test_resolver_requires_identity() {
        let directory = Arc::new(InMemoryDirectory::new());
        let resolver = TenantResolver::new(directory);
        let err = resolver
            .resolve_effective_tenant(&SessionContext::anonymous())
            .await
            .unwrap_err();
        assert!(matches!(err, TenantryError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn test_resolver_uses_clock_for_expiry() {
        let clock = MockClock::default();
        let directory = Arc::new(InMemoryDirectory::new());
        directory.insert_profile(Profile::admin("a1", "a1@x.io", Role::Admin));
        let resolver = TenantResolver::new(directory).with_clock(Arc::new(clock.clone()));

        let session = SessionContext::new(AuthenticatedIdentity::new("a1"))
            .with_impersonation(context("tenant-b", clock.now() + TimeDelta::hours(8)));

        let scope = resolver.resolve_effective_tenant(&session).await.unwrap();
        assert!(scope.is_impersonating);

        clock.advance(std::time::Duration::from_secs(8 * 3600));
        let scope = resolver.resolve_effective_tenant(&session).await.unwrap();
        assert!(!scope.is_impersonating);
        assert_eq!(scope.tenant_id, None);
    }
}
