//! Privilege-change safety rules.
//!
//! Layered on top of the capability check: these hold even when the actor
//! has the generic `users:update` / `users:delete` capability.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use backoffice_core::{DomainError, SubjectId};

use crate::roles::remaining_admin_roles;
use crate::{Identity, MasterList, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleChange {
    Grant,
    Revoke,
}

impl core::str::FromStr for RoleChange {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "grant" => Ok(Self::Grant),
            "revoke" => Ok(Self::Revoke),
            other => Err(DomainError::unknown_tag("role change", other)),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SafetyViolation {
    #[error("only a super-admin may change super-admin access")]
    SuperAdminRequired,

    #[error("revoking this role would leave you without an administrative role")]
    SelfDemotion,

    #[error("you cannot delete your own account")]
    SelfDeletion,

    #[error("master accounts cannot be modified")]
    MasterAccountImmutable,
}

impl SafetyViolation {
    pub fn code(&self) -> &'static str {
        match self {
            SafetyViolation::SuperAdminRequired => "SUPERADMIN_REQUIRED",
            SafetyViolation::SelfDemotion => "SELF_DEMOTION_FORBIDDEN",
            SafetyViolation::SelfDeletion => "SELF_DELETION_FORBIDDEN",
            SafetyViolation::MasterAccountImmutable => "MASTER_ACCOUNT_IMMUTABLE",
        }
    }
}

/// What the pre-checks know about the subject being acted on.
#[derive(Debug, Clone, Copy)]
pub struct SafetyTarget<'a> {
    pub subject_id: &'a SubjectId,
    /// Best known email (account row or registry record). Lets a master
    /// configured by email alone be recognised.
    pub email: Option<&'a str>,
    /// Current registry roles; empty when the target has no record.
    pub roles: &'a BTreeSet<Role>,
}

impl<'a> SafetyTarget<'a> {
    pub fn new(subject_id: &'a SubjectId, roles: &'a BTreeSet<Role>) -> Self {
        Self {
            subject_id,
            email: None,
            roles,
        }
    }

    pub fn with_email(mut self, email: Option<&'a str>) -> Self {
        self.email = email;
        self
    }

    fn is_master(&self, masters: &MasterList) -> bool {
        masters.matches(self.subject_id, self.email)
    }

    fn is_super_admin(&self) -> bool {
        self.roles.iter().any(Role::is_super_admin)
    }
}

/// Grant/revoke pre-check.
///
/// A self-revoke that would leave zero administrative roles is rejected; no
/// fallback role is substituted.
pub fn check_role_change(
    actor: &Identity,
    masters: &MasterList,
    target: SafetyTarget<'_>,
    role: &Role,
    change: RoleChange,
) -> Result<(), SafetyViolation> {
    if target.is_master(masters) {
        return Err(SafetyViolation::MasterAccountImmutable);
    }

    if role.is_super_admin() && !actor.is_super_admin() {
        return Err(SafetyViolation::SuperAdminRequired);
    }

    if change == RoleChange::Revoke
        && actor.subject_id() == target.subject_id
        && target.roles.contains(role)
        && remaining_admin_roles(target.roles, role) == 0
    {
        return Err(SafetyViolation::SelfDemotion);
    }

    Ok(())
}

/// Ban/unban pre-check. Masters are out of reach, and only a super-admin
/// may ban or unban another super-admin.
pub fn check_ban(
    actor: &Identity,
    masters: &MasterList,
    target: SafetyTarget<'_>,
) -> Result<(), SafetyViolation> {
    if target.is_master(masters) {
        return Err(SafetyViolation::MasterAccountImmutable);
    }
    if target.is_super_admin() && !actor.is_super_admin() {
        return Err(SafetyViolation::SuperAdminRequired);
    }
    Ok(())
}

/// Deletion pre-check: the ban rules plus no self-deletion.
pub fn check_deletion(
    actor: &Identity,
    masters: &MasterList,
    target: SafetyTarget<'_>,
) -> Result<(), SafetyViolation> {
    if actor.subject_id() == target.subject_id {
        return Err(SafetyViolation::SelfDeletion);
    }
    check_ban(actor, masters, target)
}
