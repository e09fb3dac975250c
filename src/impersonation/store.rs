use super::types::ImpersonationAuditRecord;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Storage for impersonation audit records.
#[async_trait]
pub trait ImpersonationStore: Send + Sync {
    async fn create_record(&self, record: &ImpersonationAuditRecord) -> Result<()>;

    async fn get_record(&self, record_id: &str) -> Result<Option<ImpersonationAuditRecord>>;

    /// Set `ended_at` on an open record.
    ///
    /// Returns `false` if the record does not exist or is already closed;
    /// a closed record's `ended_at` is never overwritten.
    async fn close_record(&self, record_id: &str, ended_at: DateTime<Utc>) -> Result<bool>;

    async fn open_records_for_admin(&self, admin_id: &str) -> Result<Vec<ImpersonationAuditRecord>>;

    /// Open records that started before `cutoff`.
    async fn open_records_started_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<ImpersonationAuditRecord>>;
}
