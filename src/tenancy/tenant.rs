use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A hiring organization. Owns jobs, candidates and pipeline stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Tenant {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}

/// Rows that belong to exactly one tenant.
pub trait TenantOwned {
    fn tenant_id(&self) -> &str;
}

impl TenantOwned for Tenant {
    fn tenant_id(&self) -> &str {
        &self.id
    }
}

/// Tenant persistence.
#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn find_tenant(&self, tenant_id: &str) -> Result<Option<Tenant>>;

    async fn list_tenants(&self) -> Result<Vec<Tenant>>;

    async fn create_tenant(&self, tenant: &Tenant) -> Result<()>;

    /// Returns `false` if the tenant does not exist.
    async fn rename_tenant(&self, tenant_id: &str, name: &str) -> Result<bool>;

    /// Delete a tenant and everything it owns. Returns `false` if it did
    /// not exist.
    async fn delete_tenant(&self, tenant_id: &str) -> Result<bool>;
}
