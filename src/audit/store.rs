use super::types::AuditEntry;
use crate::error::Result;
use async_trait::async_trait;

/// Append-only audit persistence.
///
/// Entries are never updated or deleted.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, entry: &AuditEntry) -> Result<()>;

    /// Most recent entries first.
    async fn list_recent(&self, limit: usize) -> Result<Vec<AuditEntry>>;

    /// Entries where `actor_id` acted, most recent first.
    async fn list_for_actor(&self, actor_id: &str, limit: usize) -> Result<Vec<AuditEntry>>;
}
