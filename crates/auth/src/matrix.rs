//! Static role → capability matrix and the permission evaluator.
//!
//! Lookup is flat: no inheritance between roles, no negative grants. A role
//! either holds the wildcard or an explicit list.

use serde::Serialize;

use crate::capability::{self as cap, Capability};
use crate::roles::{Role, all_roles};

/// What a single role is granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleGrant {
    /// Every capability, including ones no explicit list mentions.
    All,
    /// Exactly the listed capabilities.
    Only(&'static [Capability]),
}

impl RoleGrant {
    pub fn allows(&self, capability: &Capability) -> bool {
        match self {
            RoleGrant::All => true,
            RoleGrant::Only(caps) => caps.iter().any(|c| c == capability),
        }
    }
}

const GLOBAL_ADMIN_CAPS: &[Capability] = &[
    cap::ADMIN_ACCESS,
    cap::USERS_READ,
    cap::USERS_UPDATE,
    cap::USERS_BAN,
    cap::USERS_DELETE,
    cap::CONTENT_READ,
    cap::CONTENT_DELETE,
    cap::CONTENT_MODERATE,
    cap::ANALYTICS_READ,
    cap::SETTINGS_READ,
    cap::SCHOOLS_READ,
    cap::SCHOOLS_CREATE,
    cap::SCHOOLS_UPDATE,
    cap::SCHOOLS_DELETE,
    cap::STUDENTS_READ,
    cap::STUDENTS_UPDATE,
    cap::INVITES_READ,
    cap::INVITES_CREATE,
    cap::INVITES_DELETE,
    cap::AUDIT_READ,
];

const EDU_ADMIN_CAPS: &[Capability] = &[
    cap::ADMIN_ACCESS,
    cap::USERS_READ,
    cap::SCHOOLS_READ,
    cap::SCHOOLS_UPDATE,
    cap::STUDENTS_READ,
    cap::STUDENTS_UPDATE,
    cap::ANALYTICS_READ,
];

/// Grant for a role tag; `None` for tags outside the vocabulary.
pub fn role_capabilities(role: &Role) -> Option<RoleGrant> {
    match role.as_str() {
        "SuperAdmin" => Some(RoleGrant::All),
        "GAdmin" => Some(RoleGrant::Only(GLOBAL_ADMIN_CAPS)),
        "EDUAdmin" => Some(RoleGrant::Only(EDU_ADMIN_CAPS)),
        _ => None,
    }
}

/// Decide whether any of `roles` grants `capability`.
///
/// Empty input denies. Unknown roles contribute nothing.
pub fn has_capability<'a, I>(roles: I, capability: &Capability) -> bool
where
    I: IntoIterator<Item = &'a Role>,
{
    roles
        .into_iter()
        .filter_map(role_capabilities)
        .any(|grant| grant.allows(capability))
}

// ─────────────────────────────────────────────────────────────────────────────
// Introspection
// ─────────────────────────────────────────────────────────────────────────────

/// Serializable view of one matrix row.
#[derive(Debug, Clone, Serialize)]
pub struct RoleDescriptor {
    pub role: Role,
    pub all_capabilities: bool,
    pub capabilities: Vec<Capability>,
}

/// The whole matrix, in `all_roles()` order.
pub fn describe_matrix() -> Vec<RoleDescriptor> {
    all_roles()
        .iter()
        .filter_map(|role| {
            role_capabilities(role).map(|grant| match grant {
                RoleGrant::All => RoleDescriptor {
                    role: role.clone(),
                    all_capabilities: true,
                    capabilities: vec![cap::WILDCARD],
                },
                RoleGrant::Only(caps) => RoleDescriptor {
                    role: role.clone(),
                    all_capabilities: false,
                    capabilities: caps.to_vec(),
                },
            })
        })
        .collect()
}
