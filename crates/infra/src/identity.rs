//! Identity resolution: subject id → administrative identity.
//!
//! Precedence is fixed: the master list first (no registry access at all on
//! that path), then the registry. A missing or inactive registry record is
//! "not found", never a default grant.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use backoffice_auth::{Identity, IdentitySource, MasterList};
use backoffice_core::SubjectId;

use crate::registry::AdminRegistry;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no administrative identity for subject")]
    NotFound,

    /// The registry could not answer. Distinct from `NotFound`.
    #[error("identity resolution failed: {0}")]
    ResolutionFailed(String),
}

#[derive(Clone)]
pub struct IdentityResolver {
    masters: Arc<MasterList>,
    registry: Arc<dyn AdminRegistry>,
    timeout: Duration,
}

impl IdentityResolver {
    pub fn new(masters: Arc<MasterList>, registry: Arc<dyn AdminRegistry>, timeout: Duration) -> Self {
        Self {
            masters,
            registry,
            timeout,
        }
    }

    pub fn masters(&self) -> &MasterList {
        &self.masters
    }

    pub async fn resolve(
        &self,
        subject_id: &SubjectId,
        claimed_email: Option<&str>,
    ) -> Result<Identity, ResolveError> {
        if self.masters.matches(subject_id, claimed_email) {
            tracing::debug!(subject_id = %subject_id, "resolved via master list");
            return Ok(Identity::master(
                subject_id.clone(),
                claimed_email.map(str::to_string),
            ));
        }

        let lookup = tokio::time::timeout(self.timeout, self.registry.get(subject_id))
            .await
            .map_err(|_| ResolveError::ResolutionFailed("registry lookup timed out".to_string()))?
            .map_err(|e| ResolveError::ResolutionFailed(e.to_string()))?;

        match lookup {
            Some(record) if record.active => Ok(Identity {
                subject_id: record.subject_id,
                email: record.email.or_else(|| claimed_email.map(str::to_string)),
                display_name: record.display_name,
                roles: record.roles,
                banned: record.banned,
                source: IdentitySource::Registry,
            }),
            Some(_) => {
                tracing::debug!(subject_id = %subject_id, "registry record inactive");
                Err(ResolveError::NotFound)
            }
            None => Err(ResolveError::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::Utc;

    use backoffice_auth::{MasterEntry, Role};

    use super::*;
    use crate::registry::{
        AdminRecord, AdminRecordPatch, InMemoryAdminRegistry, RegistryError, RemovalGuard,
    };

    /// Registry that fails every call, or hangs forever.
    struct BrokenRegistry {
        hang: bool,
    }

    #[async_trait::async_trait]
    impl AdminRegistry for BrokenRegistry {
        async fn get(&self, _: &SubjectId) -> Result<Option<AdminRecord>, RegistryError> {
            if self.hang {
                std::future::pending::<()>().await;
            }
            Err(RegistryError::Unavailable("connection refused".into()))
        }
        async fn upsert_merge(&self, _: &SubjectId, _: AdminRecordPatch) -> Result<AdminRecord, RegistryError> {
            Err(RegistryError::Unavailable("connection refused".into()))
        }
        async fn add_role(&self, _: &SubjectId, _: &Role) -> Result<BTreeSet<Role>, RegistryError> {
            Err(RegistryError::Unavailable("connection refused".into()))
        }
        async fn remove_role(
            &self,
            _: &SubjectId,
            _: &Role,
            _: RemovalGuard,
        ) -> Result<BTreeSet<Role>, RegistryError> {
            Err(RegistryError::Unavailable("connection refused".into()))
        }
        async fn set_banned(&self, _: &SubjectId, _: bool) -> Result<bool, RegistryError> {
            Err(RegistryError::Unavailable("connection refused".into()))
        }
    }

    fn masters() -> Arc<MasterList> {
        Arc::new(MasterList::new(vec![MasterEntry {
            email: Some("root@example.com".into()),
            subject_id: Some(SubjectId::new("master-uid")),
        }]))
    }

    fn resolver(registry: Arc<dyn AdminRegistry>) -> IdentityResolver {
        IdentityResolver::new(masters(), registry, Duration::from_millis(200))
    }

    #[tokio::test]
    async fn unknown_subject_is_not_found() {
        let r = resolver(Arc::new(InMemoryAdminRegistry::new()));
        let err = r
            .resolve(&SubjectId::new("S1"), Some("someone@example.com"))
            .await
            .unwrap_err();
        assert_eq!(err, ResolveError::NotFound);
    }

    #[tokio::test]
    async fn registry_record_supplies_roles_and_ban_flag() {
        let registry = Arc::new(InMemoryAdminRegistry::new());
        let mut record = AdminRecord::new(SubjectId::new("S2"), Utc::now());
        record.roles.insert(Role::GLOBAL_ADMIN);
        record.banned = true;
        registry.insert(record);

        let identity = resolver(registry)
            .resolve(&SubjectId::new("S2"), None)
            .await
            .unwrap();
        assert_eq!(identity.source, IdentitySource::Registry);
        assert!(identity.has_role(&Role::GLOBAL_ADMIN));
        assert!(identity.banned);
    }

    #[tokio::test]
    async fn inactive_record_is_not_found() {
        let registry = Arc::new(InMemoryAdminRegistry::new());
        let mut record = AdminRecord::new(SubjectId::new("S2"), Utc::now());
        record.roles.insert(Role::GLOBAL_ADMIN);
        record.active = false;
        registry.insert(record);

        let err = resolver(registry)
            .resolve(&SubjectId::new("S2"), None)
            .await
            .unwrap_err();
        assert_eq!(err, ResolveError::NotFound);
    }

    #[tokio::test]
    async fn master_match_never_touches_the_registry() {
        let r = resolver(Arc::new(BrokenRegistry { hang: false }));

        let by_uid = r.resolve(&SubjectId::new("master-uid"), None).await.unwrap();
        assert_eq!(by_uid.source, IdentitySource::Master);
        assert!(by_uid.is_super_admin());

        let by_email = r
            .resolve(&SubjectId::new("other"), Some("root@example.com"))
            .await
            .unwrap();
        assert!(by_email.is_super_admin());
    }

    #[tokio::test]
    async fn master_wins_over_a_demoted_registry_record() {
        let registry = Arc::new(InMemoryAdminRegistry::new());
        let mut record = AdminRecord::new(SubjectId::new("master-uid"), Utc::now());
        record.banned = true;
        registry.insert(record);

        let identity = resolver(registry)
            .resolve(&SubjectId::new("master-uid"), None)
            .await
            .unwrap();
        assert!(!identity.banned);
        assert!(identity.is_super_admin());
    }

    #[tokio::test]
    async fn registry_failure_is_distinct_from_not_found() {
        let r = resolver(Arc::new(BrokenRegistry { hang: false }));
        let err = r.resolve(&SubjectId::new("S1"), None).await.unwrap_err();
        assert!(matches!(err, ResolveError::ResolutionFailed(_)));
    }

    #[tokio::test]
    async fn registry_timeout_is_a_resolution_failure() {
        let r = resolver(Arc::new(BrokenRegistry { hang: true }));
        let err = r.resolve(&SubjectId::new("S1"), None).await.unwrap_err();
        assert!(matches!(err, ResolveError::ResolutionFailed(msg) if msg.contains("timed out")));
    }
}
