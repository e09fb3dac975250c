//! Impersonation session lifecycle.
//!
//! # Tracing Events
//!
//! - `auth.impersonation.started` - Admin began impersonating a tenant
//! - `auth.impersonation.stopped` - Impersonation ended
//! - `auth.impersonation.switched` - Admin moved to another tenant without stopping
//! - `auth.impersonation.rejected` - Start refused
//! - `auth.impersonation.audit_failed` - Audit record could not be written or closed
//! - `auth.impersonation.stale_closed` - Sweep closed an orphaned record

use super::store::ImpersonationStore;
use super::types::{
    ImpersonationAuditRecord, ImpersonationConfig, ImpersonationStarted, ImpersonationStatus,
    ImpersonationStopped,
};
use crate::audit::{AuditEvent, AuditEventType, AuditLogger, TargetType};
use crate::auth::ProfileStore;
use crate::clock::{SharedClock, system_clock};
use crate::error::{Result, TenantryError};
use crate::request::RequestContext;
use crate::session::{ImpersonationContext, SessionContext};
use crate::tenancy::TenantStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Starts, stops and reports admin impersonation of tenants.
///
/// # Example
///
/// ```rust,ignore
/// let manager = ImpersonationManager::new(profiles, tenants, records, audit);
///
/// let started = manager
///     .start_impersonation(&mut session, &request, "tenant-42")
///     .await?;
/// // write session cookies, redirect to started.redirect_to
///
/// let stopped = manager.stop_impersonation(&mut session, &request).await;
/// ```
#[derive(Clone)]
pub struct ImpersonationManager {
    profiles: Arc<dyn ProfileStore>,
    tenants: Arc<dyn TenantStore>,
    records: Arc<dyn ImpersonationStore>,
    audit: AuditLogger,
    config: ImpersonationConfig,
    clock: SharedClock,
}

impl ImpersonationManager {
    pub fn new(
        profiles: Arc<dyn ProfileStore>,
        tenants: Arc<dyn TenantStore>,
        records: Arc<dyn ImpersonationStore>,
        audit: AuditLogger,
    ) -> Self {
        Self {
            profiles,
            tenants,
            records,
            audit,
            config: ImpersonationConfig::default(),
            clock: system_clock(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: ImpersonationConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &ImpersonationConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Begin acting within `tenant_id` on behalf of the session's admin.
    ///
    /// The audit record is opened before the session is written. If that
    /// write fails the impersonation still proceeds, with no audit reference.
    /// An existing impersonation is replaced and its record closed.
    ///
    /// # Errors
    ///
    /// - `Unauthenticated` if the session has no identity
    /// - `Forbidden` if the caller is not an active admin-tier user
    /// - `NotFound` if the tenant does not exist
    pub async fn start_impersonation(
        &self,
        session: &mut SessionContext,
        request: &RequestContext,
        tenant_id: &str,
    ) -> Result<ImpersonationStarted> {
        let Some(identity) = session.identity.clone() else {
            return Err(TenantryError::unauthenticated("Authentication required"));
        };

        let profile = self.profiles.find_profile(&identity.user_id).await?;
        let is_admin = profile
            .as_ref()
            .is_some_and(|p| p.is_active && p.role.is_admin());
        if !is_admin {
            tracing::warn!(
                target: "auth.impersonation.rejected",
                user_id = %identity.user_id,
                tenant_id = %tenant_id,
                reason = "not_admin",
                "Impersonation rejected: caller is not an admin"
            );
            return Err(TenantryError::forbidden("Admin access required"));
        }

        let Some(tenant) = self.tenants.find_tenant(tenant_id).await? else {
            tracing::warn!(
                target: "auth.impersonation.rejected",
                user_id = %identity.user_id,
                tenant_id = %tenant_id,
                reason = "tenant_not_found",
                "Impersonation rejected: tenant not found"
            );
            return Err(TenantryError::not_found("Tenant not found"));
        };

        let now = self.clock.now();

        if let Some(previous) = session.clear_impersonation() {
            tracing::info!(
                target: "auth.impersonation.switched",
                admin_id = %identity.user_id,
                from_tenant_id = %previous.tenant_id,
                to_tenant_id = %tenant.id,
                "Switching impersonated tenant"
            );
            self.close_for_session(&previous, now).await;
            self.audit
                .record(
                    session,
                    request,
                    AuditEvent::new(AuditEventType::ImpersonationStopped, TargetType::Tenant)
                        .with_target(previous.tenant_id.clone())
                        .with_target_name(previous.tenant_name.clone())
                        .with_metadata(serde_json::json!({ "reason": "switched" })),
                )
                .await;
        }

        let record = ImpersonationAuditRecord {
            id: uuid::Uuid::new_v4().to_string(),
            admin_id: identity.user_id.clone(),
            tenant_id: tenant.id.clone(),
            started_at: now,
            ended_at: None,
            ip_address: request.ip_address.clone(),
            user_agent: request.user_agent.clone(),
        };

        let audit_log_id = match self.records.create_record(&record).await {
            Ok(()) => Some(record.id),
            Err(e) => {
                tracing::warn!(
                    target: "auth.impersonation.audit_failed",
                    error = %e,
                    admin_id = %identity.user_id,
                    tenant_id = %tenant.id,
                    operation = "create",
                    "Failed to create impersonation audit record"
                );
                None
            }
        };

        let context = ImpersonationContext {
            admin_id: identity.user_id.clone(),
            tenant_id: tenant.id.clone(),
            tenant_name: tenant.name.clone(),
            audit_log_id: audit_log_id.clone(),
            expires_at: now + self.config.ttl(),
        };
        session.set_impersonation(context.clone());

        let mut event = AuditEvent::new(AuditEventType::ImpersonationStarted, TargetType::Tenant)
            .with_target(tenant.id.clone())
            .with_target_name(tenant.name.clone());
        if let Some(ref id) = audit_log_id {
            event = event.with_metadata(serde_json::json!({ "audit_record_id": id }));
        }
        self.audit.record(session, request, event).await;

        tracing::info!(
            target: "auth.impersonation.started",
            admin_id = %identity.user_id,
            tenant_id = %tenant.id,
            audit_record_id = ?audit_log_id,
            expires_at = %context.expires_at,
            "Impersonation started"
        );

        Ok(ImpersonationStarted {
            redirect_to: self.config.tenant_view_path.clone(),
            context,
        })
    }

    /// End impersonation. Idempotent and infallible.
    ///
    /// The session context is cleared even if closing the audit record fails.
    pub async fn stop_impersonation(
        &self,
        session: &mut SessionContext,
        request: &RequestContext,
    ) -> ImpersonationStopped {
        let redirect_to = self.config.admin_view_path.clone();

        let Some(previous) = session.clear_impersonation() else {
            return ImpersonationStopped {
                redirect_to,
                closed_record_id: None,
                was_impersonating: false,
            };
        };

        let now = self.clock.now();
        self.close_for_session(&previous, now).await;

        self.audit
            .record(
                session,
                request,
                AuditEvent::new(AuditEventType::ImpersonationStopped, TargetType::Tenant)
                    .with_target(previous.tenant_id.clone())
                    .with_target_name(previous.tenant_name.clone()),
            )
            .await;

        tracing::info!(
            target: "auth.impersonation.stopped",
            admin_id = ?session.user_id(),
            tenant_id = %previous.tenant_id,
            audit_record_id = ?previous.audit_log_id,
            "Impersonation stopped"
        );

        ImpersonationStopped {
            redirect_to,
            closed_record_id: previous.audit_log_id,
            was_impersonating: true,
        }
    }

    /// Report impersonation state from the session alone.
    pub fn get_impersonation_status(&self, session: &SessionContext) -> ImpersonationStatus {
        match session.active_impersonation(self.clock.now()) {
            Some(context) => ImpersonationStatus {
                is_impersonating: true,
                tenant_id: Some(context.tenant_id.clone()),
                tenant_name: Some(context.tenant_name.clone()),
                expires_at: Some(context.expires_at),
            },
            None => ImpersonationStatus::default(),
        }
    }

    /// Open audit records for an admin.
    pub async fn active_records_for_admin(
        &self,
        admin_id: &str,
    ) -> Result<Vec<ImpersonationAuditRecord>> {
        self.records.open_records_for_admin(admin_id).await
    }

    /// Close open records that outlived the TTL, e.g. when the admin's
    /// cookies were lost and stop was never called. Returns the number
    /// closed.
    ///
    /// Each record's `ended_at` is set to the moment its context expired.
    pub async fn close_stale_records(&self) -> Result<usize> {
        let now = self.clock.now();
        let ttl = self.config.ttl();
        let stale = self.records.open_records_started_before(now - ttl).await?;

        let mut closed = 0;
        for record in stale {
            let ended_at = (record.started_at + ttl).min(now);
            if self.records.close_record(&record.id, ended_at).await? {
                closed += 1;
                tracing::info!(
                    target: "auth.impersonation.stale_closed",
                    record_id = %record.id,
                    admin_id = %record.admin_id,
                    tenant_id = %record.tenant_id,
                    "Closed stale impersonation record"
                );
            }
        }
        Ok(closed)
    }

    async fn close_for_session(&self, context: &ImpersonationContext, now: DateTime<Utc>) {
        let Some(ref record_id) = context.audit_log_id else {
            return;
        };
        match self.records.close_record(record_id, now).await {
            Ok(true) => {}
            Ok(false) => tracing::debug!(
                target: "auth.impersonation.audit_failed",
                record_id = %record_id,
                operation = "close",
                "Impersonation record missing or already closed"
            ),
            Err(e) => tracing::warn!(
                target: "auth.impersonation.audit_failed",
                error = %e,
                record_id = %record_id,
                operation = "close",
                "Failed to close impersonation audit record"
            ),
        }
    }
}
