//! Audit writer.
//!
//! # Tracing Events
//!
//! - `audit.recorded` - Entry persisted
//! - `audit.write_failed` - Entry could not be persisted (swallowed)

use super::store::AuditStore;
use super::types::{AuditEntry, AuditEvent};
use crate::clock::{SharedClock, system_clock};
use crate::request::RequestContext;
use crate::session::SessionContext;
use std::sync::Arc;

/// Records audit events on behalf of the session's caller.
///
/// The actor is always taken from the session, never from the caller.
/// Writes are best-effort: a failure is logged and the business operation
/// carries on.
#[derive(Clone)]
pub struct AuditLogger {
    store: Arc<dyn AuditStore>,
    clock: SharedClock,
}

impl AuditLogger {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self {
            store,
            clock: system_clock(),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &Arc<dyn AuditStore> {
        &self.store
    }

    /// Build the entry that [`record`](Self::record) would persist.
    pub fn entry(
        &self,
        session: &SessionContext,
        request: &RequestContext,
        event: AuditEvent,
    ) -> AuditEntry {
        AuditEntry {
            id: uuid::Uuid::new_v4().to_string(),
            event_type: event.event_type,
            actor_id: session.user_id().map(str::to_string),
            target_type: event.target_type,
            target_id: event.target_id,
            target_name: event.target_name,
            metadata: event.metadata,
            ip_address: request.ip_address.clone(),
            user_agent: request.user_agent.clone(),
            created_at: self.clock.now(),
        }
    }

    /// Persist an event, waiting for the write.
    pub async fn record(&self, session: &SessionContext, request: &RequestContext, event: AuditEvent) {
        let entry = self.entry(session, request, event);
        write(self.store.as_ref(), &entry).await;
    }

    /// Persist an event on a background task without waiting.
    pub fn record_detached(
        &self,
        session: &SessionContext,
        request: &RequestContext,
        event: AuditEvent,
    ) -> tokio::task::JoinHandle<()> {
        let entry = self.entry(session, request, event);
        let store = self.store.clone();
        tokio::spawn(async move {
            write(store.as_ref(), &entry).await;
        })
    }
}

async fn write(store: &dyn AuditStore, entry: &AuditEntry) {
    match store.append(entry).await {
        Ok(()) => tracing::debug!(
            target: "audit.recorded",
            event = %entry.event_type,
            actor_id = ?entry.actor_id,
            target_id = ?entry.target_id,
            "Audit entry recorded"
        ),
        Err(e) => tracing::warn!(
            target: "audit.write_failed",
            error = %e,
            event = %entry.event_type,
            actor_id = ?entry.actor_id,
            target_id = ?entry.target_id,
            "Failed to record audit entry"
        ),
    }
}
