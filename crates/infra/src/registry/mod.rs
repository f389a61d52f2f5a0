//! Admin registry: role assignments keyed by subject id.
//!
//! Lives in its own datastore, separate from the main application data, so
//! a compromise of the main store cannot grant administrative access.
//! Role-set mutations are atomic at the datastore level; callers never
//! read-modify-write a role list.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use backoffice_auth::Role;
use backoffice_core::SubjectId;

mod in_memory;
mod postgres;

pub use in_memory::InMemoryAdminRegistry;
pub use postgres::PostgresAdminRegistry;

/// Persisted registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminRecord {
    pub subject_id: SubjectId,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub roles: BTreeSet<Role>,
    /// Inactive records resolve as "not an admin".
    pub active: bool,
    pub banned: bool,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AdminRecord {
    pub fn new(subject_id: SubjectId, now: DateTime<Utc>) -> Self {
        Self {
            subject_id,
            email: None,
            display_name: None,
            roles: BTreeSet::new(),
            active: true,
            banned: false,
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn merge(&mut self, patch: AdminRecordPatch, now: DateTime<Utc>) {
        if let Some(email) = patch.email {
            self.email = Some(email);
        }
        if let Some(name) = patch.display_name {
            self.display_name = Some(name);
        }
        if let Some(active) = patch.active {
            self.active = active;
        }
        if self.created_by.is_none() {
            self.created_by = patch.created_by;
        }
        self.roles.extend(patch.add_roles);
        self.updated_at = now;
    }
}

/// Upsert-merge input. `None` fields leave the stored value untouched;
/// `add_roles` is unioned into the stored set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminRecordPatch {
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub add_roles: BTreeSet<Role>,
    pub active: Option<bool>,
    /// Only written when the record is first created.
    pub created_by: Option<String>,
}

/// Precondition applied atomically together with a role removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalGuard {
    Unconditional,
    /// Fail unless at least one administrative role survives the removal.
    KeepAdminRole,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("no registry record for {0}")]
    NotFound(SubjectId),

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("registry unavailable: {0}")]
    Unavailable(String),
}

#[async_trait::async_trait]
pub trait AdminRegistry: Send + Sync {
    async fn get(&self, subject_id: &SubjectId) -> Result<Option<AdminRecord>, RegistryError>;

    /// Create the record if absent, otherwise merge `patch` into it.
    async fn upsert_merge(
        &self,
        subject_id: &SubjectId,
        patch: AdminRecordPatch,
    ) -> Result<AdminRecord, RegistryError>;

    /// Atomic set-add. Creates a minimal record when none exists.
    /// Returns the role set after the write.
    async fn add_role(&self, subject_id: &SubjectId, role: &Role)
    -> Result<BTreeSet<Role>, RegistryError>;

    /// Atomic set-remove with an optional precondition.
    /// Removing a role the subject does not hold is a no-op.
    async fn remove_role(
        &self,
        subject_id: &SubjectId,
        role: &Role,
        guard: RemovalGuard,
    ) -> Result<BTreeSet<Role>, RegistryError>;

    /// Mirror a ban onto the registry. Returns `false` when no record exists.
    async fn set_banned(&self, subject_id: &SubjectId, banned: bool) -> Result<bool, RegistryError>;
}

fn admin_role_names() -> Vec<String> {
    backoffice_auth::all_roles()
        .iter()
        .map(|r| r.as_str().to_string())
        .collect()
}
