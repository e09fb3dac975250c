//! Identity and profile seams.
//!
//! Credential verification and profile persistence live outside this crate.
//! Implement [`IdentityProvider`] and [`ProfileStore`] against your identity
//! service and database.

use super::roles::Role;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The authenticated caller, as established by the identity provider.
///
/// Upstream auth middleware inserts this into request extensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedIdentity {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl AuthenticatedIdentity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
        }
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// Stored profile for a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    pub role: Role,
    /// Home tenant. `None` for admin-tier users.
    #[serde(default)]
    pub tenant_id: Option<String>,
    pub is_active: bool,
    #[serde(default)]
    pub must_change_password: bool,
    #[serde(default)]
    pub last_login_at: Option<DateTime<Utc>>,
}

impl Profile {
    /// An admin-tier profile with no home tenant.
    pub fn admin(id: impl Into<String>, email: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            full_name: None,
            role,
            tenant_id: None,
            is_active: true,
            must_change_password: false,
            last_login_at: None,
        }
    }

    /// A customer profile bound to `tenant_id`.
    pub fn customer(
        id: impl Into<String>,
        email: impl Into<String>,
        tenant_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            full_name: None,
            role: Role::Customer,
            tenant_id: Some(tenant_id.into()),
            is_active: true,
            must_change_password: false,
            last_login_at: None,
        }
    }

    /// Customers require a tenant; admin-tier users must not have one.
    pub fn is_consistent(&self) -> bool {
        self.role.is_admin() == self.tenant_id.is_none()
    }
}

/// Profile lookups used by the resolver, the impersonation manager and login.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn find_profile(&self, user_id: &str) -> Result<Option<Profile>>;

    async fn record_last_login(&self, user_id: &str, at: DateTime<Utc>) -> Result<()>;
}

/// External identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Verify credentials. `Ok(None)` means the credentials were rejected.
    async fn verify_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<AuthenticatedIdentity>>;

    async fn update_password(&self, user_id: &str, new_password: &str) -> Result<()>;

    /// Revoke provider-side session state. Called on logout.
    async fn sign_out(&self, identity: &AuthenticatedIdentity) -> Result<()> {
        let _ = identity;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_consistency() {
        assert!(Profile::admin("a", "a@x.io", Role::Admin).is_consistent());
        assert!(Profile::customer("c", "c@x.io", "t1").is_consistent());

        let mut broken = Profile::customer("c", "c@x.io", "t1");
        broken.tenant_id = None;
        assert!(!broken.is_consistent());

        let mut broken = Profile::admin("a", "a@x.io", Role::SuperAdmin);
        broken.tenant_id = Some("t1".to_string());
        assert!(!broken.is_consistent());
    }

    #[test]
    fn test_profile_deserializes_unknown_role_as_customer() {
        let json = r#"{
            "id": "u1",
            "email": "u1@x.io",
            "role": "billing_manager",
            "tenant_id": "t1",
            "is_active": true
        }"#;
        let profile: Profile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.role, Role::Customer);
        assert!(!profile.must_change_password);
    }
}
