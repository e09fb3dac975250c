//! User administration.
//!
//! Enforces the role modification matrix and the hard invariants: at least
//! one admin-tier account always exists, and nobody deletes or deactivates
//! their own account.

use crate::audit::{AuditEvent, AuditEventType, AuditLogger, TargetType};
use crate::auth::{IdentityProvider, Profile, ProfileStore, Role};
use crate::error::{ConflictReason, Result, TenantryError};
use crate::impersonation::{Authorized, RestrictedOperation, enforce_operation_restriction};
use crate::impersonation::guard::actions;
use crate::request::RequestContext;
use crate::session::SessionContext;
use crate::tenancy::{TenantFilter, TenantScope};
use async_trait::async_trait;
use std::sync::Arc;

/// Minimum accepted password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// User persistence beyond profile lookups.
#[async_trait]
pub trait UserStore: ProfileStore {
    async fn list_users(&self, filter: &TenantFilter) -> Result<Vec<Profile>>;

    async fn insert_user(&self, profile: &Profile) -> Result<()>;

    /// Number of admin-tier accounts, active or not.
    async fn count_admins(&self) -> Result<usize>;

    async fn delete_user(&self, user_id: &str) -> Result<bool>;

    async fn set_active(&self, user_id: &str, active: bool) -> Result<()>;

    async fn set_role(&self, user_id: &str, role: Role, tenant_id: Option<String>) -> Result<()>;

    async fn set_must_change_password(&self, user_id: &str, value: bool) -> Result<()>;
}

/// New account details.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub full_name: Option<String>,
}

/// Admin operations on user accounts.
#[derive(Clone)]
pub struct UserAdmin {
    users: Arc<dyn UserStore>,
    identity: Arc<dyn IdentityProvider>,
    audit: AuditLogger,
}

impl UserAdmin {
    pub fn new(users: Arc<dyn UserStore>, identity: Arc<dyn IdentityProvider>, audit: AuditLogger) -> Self {
        Self {
            users,
            identity,
            audit,
        }
    }

    /// Users visible in `scope`.
    pub async fn list_users(&self, scope: &TenantScope) -> Result<Vec<Profile>> {
        self.users.list_users(&scope.filter()).await
    }

    /// Add a customer account to a tenant.
    pub async fn create_customer(
        &self,
        session: &SessionContext,
        request: &RequestContext,
        tenant_id: &str,
        new_user: NewUser,
        permit: Authorized<actions::ManageTenantRecords>,
    ) -> Result<Profile> {
        let actor = self.actor(session).await?;
        if !actor.role.is_admin() {
            return Err(TenantryError::forbidden("Admin access required"));
        }
        permit.ensure_tenant(tenant_id)?;

        let mut profile = Profile::customer(uuid::Uuid::new_v4().to_string(), new_user.email, tenant_id);
        profile.full_name = new_user.full_name;
        profile.must_change_password = true;
        self.insert(session, request, profile).await
    }

    /// Add an admin-tier account. Only a super admin may do this.
    pub async fn create_admin(
        &self,
        session: &SessionContext,
        request: &RequestContext,
        role: Role,
        new_user: NewUser,
        _permit: Authorized<actions::ManageAdminUsers>,
    ) -> Result<Profile> {
        if !role.is_admin() {
            return Err(TenantryError::bad_request("Role must be admin or super_admin"));
        }
        let actor = self.actor(session).await?;
        if !actor.role.can_modify(role) {
            return Err(TenantryError::forbidden("Insufficient role to create this user"));
        }

        let mut profile = Profile::admin(uuid::Uuid::new_v4().to_string(), new_user.email, role);
        profile.full_name = new_user.full_name;
        profile.must_change_password = true;
        self.insert(session, request, profile).await
    }

    pub async fn delete_user(
        &self,
        session: &SessionContext,
        request: &RequestContext,
        user_id: &str,
        _permit: Authorized<actions::DeleteUser>,
    ) -> Result<()> {
        let actor = self.actor(session).await?;
        if actor.id == user_id {
            return Err(ConflictReason::SelfDeletion.into());
        }

        let target = self.target(&actor, user_id).await?;
        if target.role.is_admin() {
            self.ensure_not_last_admin().await?;
        }

        if !self.users.delete_user(user_id).await? {
            return Err(TenantryError::not_found("User not found"));
        }

        self.audit
            .record(
                session,
                request,
                AuditEvent::new(AuditEventType::UserDeleted, TargetType::User)
                    .with_target(target.id.clone())
                    .with_target_name(target.email.clone())
                    .with_metadata(serde_json::json!({ "role": target.role })),
            )
            .await;

        tracing::info!(
            target: "admin.user.deleted",
            actor_id = %actor.id,
            user_id = %target.id,
            "User deleted"
        );
        Ok(())
    }

    /// Activate or deactivate an account. Admin-tier accounts count as admin
    /// management and are refused while impersonating; customer accounts must
    /// belong to a tenant in the permit's scope.
    pub async fn set_user_active(
        &self,
        session: &SessionContext,
        request: &RequestContext,
        user_id: &str,
        active: bool,
        permit: Authorized<actions::ManageTenantRecords>,
    ) -> Result<()> {
        let actor = self.actor(session).await?;
        if !active && actor.id == user_id {
            return Err(ConflictReason::SelfDeactivation.into());
        }

        let target = self.target(&actor, user_id).await?;
        if target.role.is_admin() {
            enforce_operation_restriction(permit.scope(), RestrictedOperation::ManageAdminUsers)?;
        } else if let Some(tenant_id) = target.tenant_id.as_deref() {
            permit.ensure_tenant(tenant_id)?;
        }
        if target.is_active == active {
            return Ok(());
        }

        self.users.set_active(user_id, active).await?;

        let event_type = if active {
            AuditEventType::UserActivated
        } else {
            AuditEventType::UserDeactivated
        };
        self.audit
            .record(
                session,
                request,
                AuditEvent::new(event_type, TargetType::User)
                    .with_target(target.id.clone())
                    .with_target_name(target.email.clone()),
            )
            .await;
        Ok(())
    }

    /// Set a user's password. Users may always change their own.
    pub async fn change_password(
        &self,
        session: &SessionContext,
        request: &RequestContext,
        user_id: &str,
        new_password: &str,
        _permit: Authorized<actions::ChangePassword>,
    ) -> Result<()> {
        if new_password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(TenantryError::bad_request(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }

        let actor = self.actor(session).await?;
        let self_service = actor.id == user_id;
        let target = if self_service {
            actor.clone()
        } else {
            self.target(&actor, user_id).await?
        };

        self.identity.update_password(&target.id, new_password).await?;
        self.users.set_must_change_password(&target.id, false).await?;

        self.audit
            .record(
                session,
                request,
                AuditEvent::new(AuditEventType::PasswordChanged, TargetType::User)
                    .with_target(target.id.clone())
                    .with_target_name(target.email.clone())
                    .with_metadata(serde_json::json!({ "self_service": self_service })),
            )
            .await;
        Ok(())
    }

    /// Change a user's role. Customers must be given a tenant; admin-tier
    /// users lose theirs.
    pub async fn change_role(
        &self,
        session: &SessionContext,
        request: &RequestContext,
        user_id: &str,
        new_role: Role,
        tenant_id: Option<String>,
        _permit: Authorized<actions::ManageAdminUsers>,
    ) -> Result<()> {
        let tenant_id = match (new_role.is_admin(), tenant_id) {
            (true, _) => None,
            (false, Some(id)) if !id.trim().is_empty() => Some(id),
            (false, _) => return Err(TenantryError::bad_request("Customers require a tenant")),
        };

        let actor = self.actor(session).await?;
        let target = if actor.id == user_id {
            actor.clone()
        } else {
            self.target(&actor, user_id).await?
        };
        if !actor.role.can_modify(target.role) || !actor.role.can_modify(new_role) {
            return Err(TenantryError::forbidden("Insufficient role to assign this role"));
        }

        if target.role.is_admin() && !new_role.is_admin() {
            self.ensure_not_last_admin().await?;
        }

        self.users.set_role(user_id, new_role, tenant_id.clone()).await?;

        self.audit
            .record(
                session,
                request,
                AuditEvent::new(AuditEventType::UserRoleChanged, TargetType::User)
                    .with_target(target.id.clone())
                    .with_target_name(target.email.clone())
                    .with_metadata(serde_json::json!({
                        "from": target.role,
                        "to": new_role,
                        "tenant_id": tenant_id,
                    })),
            )
            .await;
        Ok(())
    }

    async fn insert(
        &self,
        session: &SessionContext,
        request: &RequestContext,
        profile: Profile,
    ) -> Result<Profile> {
        self.users.insert_user(&profile).await?;
        self.audit
            .record(
                session,
                request,
                AuditEvent::new(AuditEventType::UserCreated, TargetType::User)
                    .with_target(profile.id.clone())
                    .with_target_name(profile.email.clone())
                    .with_metadata(serde_json::json!({
                        "role": profile.role,
                        "tenant_id": profile.tenant_id,
                    })),
            )
            .await;
        Ok(profile)
    }

    /// The caller's own active profile.
    async fn actor(&self, session: &SessionContext) -> Result<Profile> {
        let user_id = session
            .user_id()
            .ok_or_else(|| TenantryError::unauthenticated("Authentication required"))?;
        self.users
            .find_profile(user_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| TenantryError::forbidden("Account is not active"))
    }

    /// Load `user_id` and check the actor may modify it.
    async fn target(&self, actor: &Profile, user_id: &str) -> Result<Profile> {
        let target = self
            .users
            .find_profile(user_id)
            .await?
            .ok_or_else(|| TenantryError::not_found("User not found"))?;

        if !actor.role.can_modify(target.role) {
            tracing::warn!(
                target: "admin.user.forbidden",
                actor_id = %actor.id,
                actor_role = %actor.role,
                user_id = %target.id,
                target_role = %target.role,
                "Modification refused by role hierarchy"
            );
            return Err(TenantryError::forbidden("Insufficient role to modify this user"));
        }
        Ok(target)
    }

    async fn ensure_not_last_admin(&self) -> Result<()> {
        if self.users.count_admins().await? <= 1 {
            return Err(ConflictReason::LastAdmin.into());
        }
        Ok(())
    }
}
