use crate::session::ImpersonationContext;
use crate::utils::{get_env_with_prefix, parse_env_with_prefix};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Hard ceiling on an impersonation context (8 hours).
const DEFAULT_TTL_HOURS: u64 = 8;

/// Configuration for impersonation behavior.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpersonationConfig {
    /// Lifetime of an impersonation context. Not extended by activity.
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: u64,
    /// Where an admin lands after starting impersonation.
    #[serde(default = "default_tenant_view_path")]
    pub tenant_view_path: String,
    /// Where an admin lands after stopping impersonation.
    #[serde(default = "default_admin_view_path")]
    pub admin_view_path: String,
}

impl Default for ImpersonationConfig {
    fn default() -> Self {
        Self {
            ttl_hours: DEFAULT_TTL_HOURS,
            tenant_view_path: default_tenant_view_path(),
            admin_view_path: default_admin_view_path(),
        }
    }
}

impl ImpersonationConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn ttl_hours(mut self, hours: u64) -> Self {
        self.ttl_hours = hours;
        self
    }

    #[must_use]
    pub fn tenant_view_path(mut self, path: impl Into<String>) -> Self {
        self.tenant_view_path = path.into();
        self
    }

    #[must_use]
    pub fn admin_view_path(mut self, path: impl Into<String>) -> Self {
        self.admin_view_path = path.into();
        self
    }

    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(hours) = parse_env_with_prefix("IMPERSONATION_TTL_HOURS") {
            config.ttl_hours = hours;
        }
        if let Some(path) = get_env_with_prefix("IMPERSONATION_TENANT_VIEW_PATH") {
            config.tenant_view_path = path;
        }
        if let Some(path) = get_env_with_prefix("IMPERSONATION_ADMIN_VIEW_PATH") {
            config.admin_view_path = path;
        }
        config
    }

    pub fn ttl(&self) -> TimeDelta {
        i64::try_from(self.ttl_hours)
            .ok()
            .and_then(TimeDelta::try_hours)
            .unwrap_or(TimeDelta::hours(DEFAULT_TTL_HOURS as i64))
    }
}

fn default_ttl_hours() -> u64 {
    DEFAULT_TTL_HOURS
}

fn default_tenant_view_path() -> String {
    "/dashboard".to_string()
}

fn default_admin_view_path() -> String {
    "/admin".to_string()
}

/// Durable record of one impersonation session.
///
/// An open record (`ended_at == None`) is the source of truth for "this
/// admin is impersonating". Records are never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpersonationAuditRecord {
    pub id: String,
    pub admin_id: String,
    pub tenant_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl ImpersonationAuditRecord {
    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }
}

/// Impersonation state as reported to the UI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpersonationStatus {
    pub is_impersonating: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Result of a successful start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImpersonationStarted {
    pub redirect_to: String,
    pub context: ImpersonationContext,
}

/// Result of a stop. Always produced, even if nothing was active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImpersonationStopped {
    pub redirect_to: String,
    /// Audit record that was closed, if one was referenced.
    pub closed_record_id: Option<String>,
    pub was_impersonating: bool,
}
