use std::borrow::Cow;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Role tag assigned to an administrative identity.
///
/// Roles are opaque strings at the type level so an unknown tag coming back
/// from the registry deserializes fine; the matrix simply grants it nothing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const SUPER_ADMIN: Role = Role(Cow::Borrowed("SuperAdmin"));
    pub const GLOBAL_ADMIN: Role = Role(Cow::Borrowed("GAdmin"));
    pub const EDU_ADMIN: Role = Role(Cow::Borrowed("EDUAdmin"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_super_admin(&self) -> bool {
        self.as_str() == Self::SUPER_ADMIN.as_str()
    }

    /// Whether this tag belongs to the fixed administrative vocabulary.
    pub fn is_administrative(&self) -> bool {
        all_roles().iter().any(|r| r == self)
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Every role the matrix knows about, highest privilege first.
pub fn all_roles() -> &'static [Role] {
    const ROLES: &[Role] = &[Role::SUPER_ADMIN, Role::GLOBAL_ADMIN, Role::EDU_ADMIN];
    ROLES
}

/// Administrative roles left in `roles` once `removed` is taken out.
pub fn remaining_admin_roles(roles: &BTreeSet<Role>, removed: &Role) -> usize {
    roles
        .iter()
        .filter(|r| *r != removed && r.is_administrative())
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vocabulary_is_fixed() {
        let names: Vec<_> = all_roles().iter().map(Role::as_str).collect();
        assert_eq!(names, ["SuperAdmin", "GAdmin", "EDUAdmin"]);
        assert!(!Role::new("Moderator").is_administrative());
    }

    #[test]
    fn remaining_counts_only_known_roles() {
        let roles: BTreeSet<Role> = [Role::SUPER_ADMIN, Role::new("Viewer")].into_iter().collect();
        assert_eq!(remaining_admin_roles(&roles, &Role::SUPER_ADMIN), 0);

        let roles: BTreeSet<Role> = [Role::SUPER_ADMIN, Role::EDU_ADMIN].into_iter().collect();
        assert_eq!(remaining_admin_roles(&roles, &Role::SUPER_ADMIN), 1);
    }

    #[test]
    fn serializes_as_plain_string() {
        let json = serde_json::to_string(&Role::GLOBAL_ADMIN).unwrap();
        assert_eq!(json, "\"GAdmin\"");
        let back: Role = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Role::GLOBAL_ADMIN);
    }
}
