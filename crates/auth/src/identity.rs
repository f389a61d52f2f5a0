use std::collections::BTreeSet;

use serde::Serialize;

use backoffice_core::SubjectId;

use crate::Role;

/// Which resolution path produced an identity. Diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentitySource {
    Master,
    Registry,
}

impl IdentitySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentitySource::Master => "master",
            IdentitySource::Registry => "registry",
        }
    }
}

/// A caller attempting a privileged action, resolved fresh for each request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub subject_id: SubjectId,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub roles: BTreeSet<Role>,
    pub banned: bool,
    pub source: IdentitySource,
}

impl Identity {
    /// Identity for a master/backup account: super-admin, never banned.
    pub fn master(subject_id: SubjectId, email: Option<String>) -> Self {
        Self {
            subject_id,
            email,
            display_name: None,
            roles: BTreeSet::from([Role::SUPER_ADMIN]),
            banned: false,
            source: IdentitySource::Master,
        }
    }

    pub fn subject_id(&self) -> &SubjectId {
        &self.subject_id
    }

    pub fn roles(&self) -> &BTreeSet<Role> {
        &self.roles
    }

    pub fn has_role(&self, role: &Role) -> bool {
        self.roles.contains(role)
    }

    pub fn is_super_admin(&self) -> bool {
        self.roles.iter().any(Role::is_super_admin)
    }
}
