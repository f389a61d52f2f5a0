use std::collections::HashSet;
use std::sync::RwLock;

use chrono::{Duration, Utc};

use backoffice_core::AuditEntryId;

use super::{
    AuditEntry, AuditFilter, AuditPage, AuditStats, AuditStore, AuditStoreError, NewAuditEntry,
    Pagination, StatsQuery,
};

/// In-memory append-only audit log.
///
/// Intended for tests/dev. Entries are kept in insertion order; queries sort.
#[derive(Debug, Default)]
pub struct InMemoryAuditStore {
    entries: RwLock<Vec<AuditEntry>>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert a fully-formed entry (backdated fixtures in tests).
    pub fn push(&self, entry: AuditEntry) {
        if let Ok(mut entries) = self.entries.write() {
            entries.push(entry);
        }
    }
}

fn poisoned<T>(_: T) -> AuditStoreError {
    AuditStoreError::Unavailable("audit lock poisoned".to_string())
}

#[async_trait::async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn append(&self, entry: NewAuditEntry) -> Result<AuditEntry, AuditStoreError> {
        let stored = entry.into_entry(AuditEntryId::new(), Utc::now());
        self.entries.write().map_err(poisoned)?.push(stored.clone());
        Ok(stored)
    }

    async fn query(
        &self,
        filter: AuditFilter,
        pagination: Pagination,
    ) -> Result<AuditPage, AuditStoreError> {
        let entries = self.entries.read().map_err(poisoned)?;

        let mut matching: Vec<&AuditEntry> = entries.iter().filter(|e| filter.matches(e)).collect();
        // Newest first; ids are UUIDv7 so they break timestamp ties in write order.
        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.as_uuid().cmp(a.id.as_uuid()))
        });

        let total = matching.len() as u64;
        let page: Vec<AuditEntry> = matching
            .into_iter()
            .skip(pagination.offset as usize)
            .take(pagination.limit as usize)
            .cloned()
            .collect();
        let has_more = total > u64::from(pagination.offset) + u64::from(pagination.limit);

        Ok(AuditPage {
            entries: page,
            total,
            pagination,
            has_more,
        })
    }

    async fn stats(&self, query: StatsQuery<'_>) -> Result<AuditStats, AuditStoreError> {
        let entries = self.entries.read().map_err(poisoned)?;
        let window_start = Utc::now() - Duration::days(i64::from(query.window_days));

        let mut stats = AuditStats {
            window_days: query.window_days,
            ..Default::default()
        };
        let mut actors = HashSet::new();

        for entry in entries
            .iter()
            .filter(|e| query.actor_id.is_none_or(|a| *a == e.actor_id))
        {
            stats.total_actions += 1;
            actors.insert(&entry.actor_id);
            if entry.action.is_destructive() {
                stats.destructive_actions += 1;
            }
            if entry.created_at >= window_start {
                stats.recent_actions += 1;
            }
        }
        stats.distinct_actors = actors.len() as u64;

        Ok(stats)
    }
}
