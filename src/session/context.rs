use crate::auth::AuthenticatedIdentity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An admin's active impersonation of a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpersonationContext {
    /// The admin who started the impersonation.
    pub admin_id: String,
    pub tenant_id: String,
    pub tenant_name: String,
    /// Id of the audit record opened at start. `None` when that write failed.
    pub audit_log_id: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl ImpersonationContext {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Per-request session state: who is calling, and whom they impersonate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    pub identity: Option<AuthenticatedIdentity>,
    impersonation: Option<ImpersonationContext>,
}

impl SessionContext {
    pub fn new(identity: AuthenticatedIdentity) -> Self {
        Self {
            identity: Some(identity),
            impersonation: None,
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_impersonation(mut self, context: ImpersonationContext) -> Self {
        self.impersonation = Some(context);
        self
    }

    pub fn user_id(&self) -> Option<&str> {
        self.identity.as_ref().map(|i| i.user_id.as_str())
    }

    /// The stored context, expired or not.
    pub fn impersonation(&self) -> Option<&ImpersonationContext> {
        self.impersonation.as_ref()
    }

    /// The stored context if it has not yet expired.
    pub fn active_impersonation(&self, now: DateTime<Utc>) -> Option<&ImpersonationContext> {
        self.impersonation.as_ref().filter(|c| !c.is_expired(now))
    }

    /// Replace any existing context.
    pub fn set_impersonation(&mut self, context: ImpersonationContext) {
        self.impersonation = Some(context);
    }

    pub fn clear_impersonation(&mut self) -> Option<ImpersonationContext> {
        self.impersonation.take()
    }
}
