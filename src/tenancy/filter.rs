use super::tenant::TenantOwned;
use serde::{Deserialize, Serialize};

/// The effective tenant for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantScope {
    /// Tenant whose data is in view. `None` for an admin outside
    /// impersonation, or for a caller with no usable profile.
    pub tenant_id: Option<String>,
    /// The caller's own role is admin-tier.
    pub is_admin: bool,
    pub is_impersonating: bool,
}

impl TenantScope {
    /// Scope with no tenant and no privileges.
    pub fn least_privilege() -> Self {
        Self {
            tenant_id: None,
            is_admin: false,
            is_impersonating: false,
        }
    }

    pub fn filter(&self) -> TenantFilter {
        match (&self.tenant_id, self.is_admin, self.is_impersonating) {
            (Some(id), _, _) => TenantFilter::Tenant(id.clone()),
            (None, true, false) => TenantFilter::AllTenants,
            _ => TenantFilter::MatchNothing,
        }
    }
}

/// Row filter derived from a [`TenantScope`].
///
/// Storage adapters translate this into their query predicate. There is no
/// way to construct a filter that matches another tenant's rows except
/// `AllTenants`, which only an admin outside impersonation receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "tenant_id", rename_all = "snake_case")]
pub enum TenantFilter {
    Tenant(String),
    MatchNothing,
    AllTenants,
}

impl TenantFilter {
    pub fn permits(&self, row_tenant_id: &str) -> bool {
        match self {
            Self::Tenant(id) => id == row_tenant_id,
            Self::MatchNothing => false,
            Self::AllTenants => true,
        }
    }

    /// Keep only the rows this filter permits.
    pub fn apply<T: TenantOwned>(&self, rows: Vec<T>) -> Vec<T> {
        rows.into_iter()
            .filter(|row| self.permits(row.tenant_id()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Job {
        tenant: &'static str,
    }

    impl TenantOwned for Job {
        fn tenant_id(&self) -> &str {
            self.tenant
        }
    }

    fn jobs() -> Vec<Job> {
        vec![Job { tenant: "a" }, Job { tenant: "b" }, Job { tenant: "a" }]
    }

    #[test]
    fn test_tenant_scope_filters_to_own_tenant() {
        let scope = TenantScope {
            tenant_id: Some("a".to_string()),
            is_admin: false,
            is_impersonating: false,
        };
        let visible = scope.filter().apply(jobs());
        assert_eq!(visible.len(), 2);
        assert!(visible.iter().all(|j| j.tenant == "a"));
    }

    #[test]
    fn test_missing_tenant_matches_nothing() {
        let filter = TenantScope::least_privilege().filter();
        assert_eq!(filter, TenantFilter::MatchNothing);
        assert!(filter.apply(jobs()).is_empty());
    }

    #[test]
    fn test_admin_outside_impersonation_sees_all() {
        let scope = TenantScope {
            tenant_id: None,
            is_admin: true,
            is_impersonating: false,
        };
        assert_eq!(scope.filter(), TenantFilter::AllTenants);
        assert_eq!(scope.filter().apply(jobs()).len(), 3);
    }

    #[test]
    fn test_impersonating_admin_is_confined() {
        let scope = TenantScope {
            tenant_id: Some("b".to_string()),
            is_admin: true,
            is_impersonating: true,
        };
        let filter = scope.filter();
        assert!(filter.permits("b"));
        assert!(!filter.permits("a"));
    }

    #[test]
    fn test_impersonating_without_tenant_matches_nothing() {
        let scope = TenantScope {
            tenant_id: None,
            is_admin: true,
            is_impersonating: true,
        };
        assert_eq!(scope.filter(), TenantFilter::MatchNothing);
    }
}
