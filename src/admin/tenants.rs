//! Tenant administration.

use crate::audit::{AuditEvent, AuditEventType, AuditLogger, TargetType};
use crate::auth::ProfileStore;
use crate::error::{Result, TenantryError};
use crate::impersonation::Authorized;
use crate::impersonation::guard::actions;
use crate::request::RequestContext;
use crate::session::SessionContext;
use crate::tenancy::{Tenant, TenantScope, TenantStore};
use std::sync::Arc;

/// Longest accepted tenant name, in characters.
const MAX_TENANT_NAME_LENGTH: usize = 200;

/// Admin operations on tenants.
#[derive(Clone)]
pub struct TenantAdmin {
    tenants: Arc<dyn TenantStore>,
    profiles: Arc<dyn ProfileStore>,
    audit: AuditLogger,
}

impl TenantAdmin {
    pub fn new(tenants: Arc<dyn TenantStore>, profiles: Arc<dyn ProfileStore>, audit: AuditLogger) -> Self {
        Self {
            tenants,
            profiles,
            audit,
        }
    }

    /// Tenants visible in `scope`.
    pub async fn list_tenants(&self, scope: &TenantScope) -> Result<Vec<Tenant>> {
        let tenants = self.tenants.list_tenants().await?;
        Ok(scope.filter().apply(tenants))
    }

    /// Fetch one tenant. Tenants outside `scope` are reported exactly like
    /// missing ones.
    pub async fn get_tenant(&self, scope: &TenantScope, tenant_id: &str) -> Result<Tenant> {
        if !scope.filter().permits(tenant_id) {
            return Err(TenantryError::not_found_or_forbidden("Tenant"));
        }
        self.tenants
            .find_tenant(tenant_id)
            .await?
            .ok_or_else(|| TenantryError::not_found_or_forbidden("Tenant"))
    }

    pub async fn create_tenant(
        &self,
        session: &SessionContext,
        request: &RequestContext,
        name: &str,
        _permit: Authorized<actions::ManageTenantRecords>,
    ) -> Result<Tenant> {
        self.require_admin(session).await?;
        let name = validate_name(name)?;

        let tenant = Tenant::new(name);
        self.tenants.create_tenant(&tenant).await?;

        self.audit
            .record(
                session,
                request,
                AuditEvent::new(AuditEventType::TenantCreated, TargetType::Tenant)
                    .with_target(tenant.id.clone())
                    .with_target_name(tenant.name.clone()),
            )
            .await;

        tracing::info!(
            target: "admin.tenant.created",
            tenant_id = %tenant.id,
            "Tenant created"
        );
        Ok(tenant)
    }

    pub async fn rename_tenant(
        &self,
        session: &SessionContext,
        request: &RequestContext,
        tenant_id: &str,
        name: &str,
        permit: Authorized<actions::ManageTenantRecords>,
    ) -> Result<()> {
        self.require_admin(session).await?;
        permit.ensure_tenant(tenant_id)?;
        let name = validate_name(name)?;

        let previous = self
            .tenants
            .find_tenant(tenant_id)
            .await?
            .ok_or_else(|| TenantryError::not_found("Tenant not found"))?;

        if !self.tenants.rename_tenant(tenant_id, &name).await? {
            return Err(TenantryError::not_found("Tenant not found"));
        }

        self.audit
            .record(
                session,
                request,
                AuditEvent::new(AuditEventType::TenantUpdated, TargetType::Tenant)
                    .with_target(tenant_id)
                    .with_target_name(name.clone())
                    .with_metadata(serde_json::json!({ "previous_name": previous.name })),
            )
            .await;
        Ok(())
    }

    /// Delete a tenant and everything it owns.
    pub async fn delete_tenant(
        &self,
        session: &SessionContext,
        request: &RequestContext,
        tenant_id: &str,
        _permit: Authorized<actions::DeleteTenant>,
    ) -> Result<()> {
        self.require_admin(session).await?;

        let tenant = self
            .tenants
            .find_tenant(tenant_id)
            .await?
            .ok_or_else(|| TenantryError::not_found("Tenant not found"))?;

        if !self.tenants.delete_tenant(tenant_id).await? {
            return Err(TenantryError::not_found("Tenant not found"));
        }

        self.audit
            .record(
                session,
                request,
                AuditEvent::new(AuditEventType::TenantDeleted, TargetType::Tenant)
                    .with_target(tenant.id.clone())
                    .with_target_name(tenant.name.clone()),
            )
            .await;

        tracing::info!(
            target: "admin.tenant.deleted",
            tenant_id = %tenant.id,
            actor_id = ?session.user_id(),
            "Tenant deleted"
        );
        Ok(())
    }

    async fn require_admin(&self, session: &SessionContext) -> Result<()> {
        let user_id = session
            .user_id()
            .ok_or_else(|| TenantryError::unauthenticated("Authentication required"))?;
        let is_admin = self
            .profiles
            .find_profile(user_id)
            .await?
            .is_some_and(|p| p.is_active && p.role.is_admin());
        if is_admin {
            Ok(())
        } else {
            Err(TenantryError::forbidden("Admin access required"))
        }
    }
}

fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(TenantryError::bad_request("Tenant name is required"));
    }
    if name.chars().count() > MAX_TENANT_NAME_LENGTH {
        return Err(TenantryError::bad_request(format!(
            "Tenant name must be at most {} characters",
            MAX_TENANT_NAME_LENGTH
        )));
    }
    Ok(name.to_string())
}
