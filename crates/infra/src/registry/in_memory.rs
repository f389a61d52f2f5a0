use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use chrono::Utc;

use backoffice_auth::Role;
use backoffice_auth::roles::remaining_admin_roles;
use backoffice_core::SubjectId;

use super::{AdminRecord, AdminRecordPatch, AdminRegistry, RegistryError, RemovalGuard};

/// In-memory registry for tests/dev.
///
/// Every mutation runs under a single write lock, which gives the same
/// atomicity the Postgres array operators give.
#[derive(Debug, Default)]
pub struct InMemoryAdminRegistry {
    records: RwLock<HashMap<SubjectId, AdminRecord>>,
}

impl InMemoryAdminRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or replace a record wholesale.
    pub fn insert(&self, record: AdminRecord) {
        if let Ok(mut records) = self.records.write() {
            records.insert(record.subject_id.clone(), record);
        }
    }
}

fn poisoned<T>(_: T) -> RegistryError {
    RegistryError::Unavailable("registry lock poisoned".to_string())
}

#[async_trait::async_trait]
impl AdminRegistry for InMemoryAdminRegistry {
    async fn get(&self, subject_id: &SubjectId) -> Result<Option<AdminRecord>, RegistryError> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records.get(subject_id).cloned())
    }

    async fn upsert_merge(
        &self,
        subject_id: &SubjectId,
        patch: AdminRecordPatch,
    ) -> Result<AdminRecord, RegistryError> {
        let now = Utc::now();
        let mut records = self.records.write().map_err(poisoned)?;
        let record = records
            .entry(subject_id.clone())
            .or_insert_with(|| AdminRecord::new(subject_id.clone(), now));
        record.merge(patch, now);
        Ok(record.clone())
    }

    async fn add_role(
        &self,
        subject_id: &SubjectId,
        role: &Role,
    ) -> Result<BTreeSet<Role>, RegistryError> {
        let now = Utc::now();
        let mut records = self.records.write().map_err(poisoned)?;
        let record = records
            .entry(subject_id.clone())
            .or_insert_with(|| AdminRecord::new(subject_id.clone(), now));
        if record.roles.insert(role.clone()) {
            record.updated_at = now;
        }
        Ok(record.roles.clone())
    }

    async fn remove_role(
        &self,
        subject_id: &SubjectId,
        role: &Role,
        guard: RemovalGuard,
    ) -> Result<BTreeSet<Role>, RegistryError> {
        let mut records = self.records.write().map_err(poisoned)?;
        let record = records
            .get_mut(subject_id)
            .ok_or_else(|| RegistryError::NotFound(subject_id.clone()))?;

        if !record.roles.contains(role) {
            return Ok(record.roles.clone());
        }
        if guard == RemovalGuard::KeepAdminRole && remaining_admin_roles(&record.roles, role) == 0 {
            return Err(RegistryError::PreconditionFailed(format!(
                "removing {role} would leave no administrative role"
            )));
        }

        record.roles.remove(role);
        record.updated_at = Utc::now();
        Ok(record.roles.clone())
    }

    async fn set_banned(&self, subject_id: &SubjectId, banned: bool) -> Result<bool, RegistryError> {
        let mut records = self.records.write().map_err(poisoned)?;
        match records.get_mut(subject_id) {
            Some(record) => {
                record.banned = banned;
                record.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn subject(s: &str) -> SubjectId {
        SubjectId::new(s)
    }

    #[tokio::test]
    async fn upsert_merge_creates_then_merges() {
        let registry = InMemoryAdminRegistry::new();
        let s = subject("u1");

        let created = registry
            .upsert_merge(
                &s,
                AdminRecordPatch {
                    email: Some("a@example.com".into()),
                    add_roles: BTreeSet::from([Role::EDU_ADMIN]),
                    created_by: Some("invite:ADM-ABC123".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(created.active);
        assert_eq!(created.created_by.as_deref(), Some("invite:ADM-ABC123"));

        let merged = registry
            .upsert_merge(
                &s,
                AdminRecordPatch {
                    display_name: Some("Ada".into()),
                    add_roles: BTreeSet::from([Role::GLOBAL_ADMIN]),
                    created_by: Some("someone-else".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(merged.email.as_deref(), Some("a@example.com"));
        assert_eq!(merged.display_name.as_deref(), Some("Ada"));
        assert_eq!(merged.roles, BTreeSet::from([Role::EDU_ADMIN, Role::GLOBAL_ADMIN]));
        assert_eq!(merged.created_by.as_deref(), Some("invite:ADM-ABC123"));
    }

    #[tokio::test]
    async fn add_role_is_idempotent_and_creates_record() {
        let registry = InMemoryAdminRegistry::new();
        let s = subject("u1");

        registry.add_role(&s, &Role::EDU_ADMIN).await.unwrap();
        let roles = registry.add_role(&s, &Role::EDU_ADMIN).await.unwrap();
        assert_eq!(roles, BTreeSet::from([Role::EDU_ADMIN]));
        assert!(registry.get(&s).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn remove_role_guard_keeps_last_admin_role() {
        let registry = InMemoryAdminRegistry::new();
        let s = subject("u1");
        registry.add_role(&s, &Role::SUPER_ADMIN).await.unwrap();

        let err = registry
            .remove_role(&s, &Role::SUPER_ADMIN, RemovalGuard::KeepAdminRole)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::PreconditionFailed(_)));

        registry.add_role(&s, &Role::GLOBAL_ADMIN).await.unwrap();
        let roles = registry
            .remove_role(&s, &Role::SUPER_ADMIN, RemovalGuard::KeepAdminRole)
            .await
            .unwrap();
        assert_eq!(roles, BTreeSet::from([Role::GLOBAL_ADMIN]));
    }

    #[tokio::test]
    async fn remove_role_on_missing_record_is_not_found() {
        let registry = InMemoryAdminRegistry::new();
        let err = registry
            .remove_role(&subject("ghost"), &Role::EDU_ADMIN, RemovalGuard::Unconditional)
            .await
            .unwrap_err();
        assert_eq!(err, RegistryError::NotFound(subject("ghost")));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_grants_do_not_lose_updates() {
        let registry = Arc::new(InMemoryAdminRegistry::new());
        let s = subject("u1");

        let mut handles = Vec::new();
        for role in [Role::SUPER_ADMIN, Role::GLOBAL_ADMIN, Role::EDU_ADMIN] {
            let registry = Arc::clone(&registry);
            let s = s.clone();
            handles.push(tokio::spawn(async move { registry.add_role(&s, &role).await }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        let record = registry.get(&s).await.unwrap().unwrap();
        assert_eq!(record.roles.len(), 3);
    }

    #[tokio::test]
    async fn set_banned_reports_missing_records() {
        let registry = InMemoryAdminRegistry::new();
        assert!(!registry.set_banned(&subject("nobody"), true).await.unwrap());

        registry.add_role(&subject("u1"), &Role::EDU_ADMIN).await.unwrap();
        assert!(registry.set_banned(&subject("u1"), true).await.unwrap());
        assert!(registry.get(&subject("u1")).await.unwrap().unwrap().banned);
    }
}
