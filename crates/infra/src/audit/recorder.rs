use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use super::{
    AuditFilter, AuditPage, AuditStats, AuditStore, AuditStoreError, NewAuditEntry, Pagination,
    StatsQuery,
};

/// Front door for the audit trail.
///
/// `record` never fails from the caller's point of view: the write runs on
/// its own task, bounded by `timeout`, and any failure is reported through
/// `tracing` only. A broken audit pipe can neither block nor fail the
/// mutation it describes.
#[derive(Clone)]
pub struct AuditRecorder {
    store: Arc<dyn AuditStore>,
    timeout: Duration,
}

impl AuditRecorder {
    pub fn new(store: Arc<dyn AuditStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Dispatch the write and return immediately.
    ///
    /// The handle exists for tests; production callers drop it. `None` when
    /// called outside a tokio runtime, in which case the entry is reported
    /// as lost.
    pub fn record(&self, entry: NewAuditEntry) -> Option<JoinHandle<()>> {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::error!(
                action = %entry.action,
                actor_id = %entry.actor_id,
                "audit entry dropped: no async runtime"
            );
            return None;
        };

        let store = Arc::clone(&self.store);
        let timeout = self.timeout;

        Some(handle.spawn(async move {
            let action = entry.action;
            let actor_id = entry.actor_id.clone();
            let target_id = entry.target_id.clone();

            match tokio::time::timeout(timeout, store.append(entry)).await {
                Ok(Ok(stored)) => {
                    tracing::debug!(audit_id = %stored.id, action = %action, "audit entry written");
                }
                Ok(Err(e)) => {
                    tracing::error!(
                        action = %action,
                        actor_id = %actor_id,
                        target_id = ?target_id,
                        error = %e,
                        "failed to write audit entry"
                    );
                }
                Err(_) => {
                    tracing::error!(
                        action = %action,
                        actor_id = %actor_id,
                        target_id = ?target_id,
                        timeout_ms = timeout.as_millis() as u64,
                        "audit write timed out"
                    );
                }
            }
        }))
    }

    pub async fn query(
        &self,
        filter: AuditFilter,
        pagination: Pagination,
    ) -> Result<AuditPage, AuditStoreError> {
        tokio::time::timeout(self.timeout, self.store.query(filter, pagination))
            .await
            .map_err(|_| AuditStoreError::Timeout)?
    }

    pub async fn stats(&self, query: StatsQuery<'_>) -> Result<AuditStats, AuditStoreError> {
        tokio::time::timeout(self.timeout, self.store.stats(query))
            .await
            .map_err(|_| AuditStoreError::Timeout)?
    }
}
