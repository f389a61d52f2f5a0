use serde::Serialize;
use thiserror::Error;

use crate::capability::{ADMIN_ACCESS, Capability};
use crate::matrix::has_capability;
use crate::safety::SafetyViolation;
use crate::{Identity, Role};

/// Every way an authorization attempt can fail.
///
/// Each kind maps to a fixed HTTP status and a stable machine-readable code.
/// Display text is safe to show callers; it never carries datastore detail.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("no bearer token provided")]
    NoCredential,

    #[error("invalid or expired token")]
    InvalidCredential,

    #[error("not an administrator")]
    NotAnAdmin,

    #[error("account is banned")]
    Banned,

    #[error("no administrative role")]
    InsufficientRole,

    #[error("missing capability '{required}'")]
    InsufficientPermissions { required: Capability, roles: Vec<Role> },

    #[error("{0}")]
    Unsafe(#[from] SafetyViolation),

    /// Resolution or verification infrastructure failed (or timed out).
    #[error("authorization could not be completed")]
    Internal { code: &'static str },
}

impl AuthzError {
    pub const DB_ERROR: &'static str = "DB_ERROR";
    pub const AUTH_ERROR: &'static str = "AUTH_ERROR";

    pub fn resolution_failed() -> Self {
        Self::Internal {
            code: Self::DB_ERROR,
        }
    }

    pub fn provider_failed() -> Self {
        Self::Internal {
            code: Self::AUTH_ERROR,
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            AuthzError::NoCredential | AuthzError::InvalidCredential => 401,
            AuthzError::NotAnAdmin
            | AuthzError::Banned
            | AuthzError::InsufficientRole
            | AuthzError::InsufficientPermissions { .. }
            | AuthzError::Unsafe(_) => 403,
            AuthzError::Internal { .. } => 500,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AuthzError::NoCredential => "NO_TOKEN",
            AuthzError::InvalidCredential => "INVALID_TOKEN",
            AuthzError::NotAnAdmin => "NOT_ADMIN",
            AuthzError::Banned => "USER_BANNED",
            AuthzError::InsufficientRole => "INSUFFICIENT_ROLE",
            AuthzError::InsufficientPermissions { .. } => "INSUFFICIENT_PERMISSIONS",
            AuthzError::Unsafe(v) => v.code(),
            AuthzError::Internal { code } => *code,
        }
    }

    /// Extra, caller-safe context for the error body.
    pub fn details(&self) -> Option<AuthzDetails> {
        match self {
            AuthzError::InsufficientPermissions { required, roles } => Some(AuthzDetails {
                required: required.clone(),
                user_roles: roles.clone(),
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthzDetails {
    pub required: Capability,
    pub user_roles: Vec<Role>,
}

/// Post-resolution steps of the guard: ban check, then baseline admin access.
///
/// Banned always wins, whatever the roles say.
pub fn admit(identity: Identity) -> Result<Identity, AuthzError> {
    if identity.banned {
        return Err(AuthzError::Banned);
    }
    if !has_capability(identity.roles(), &ADMIN_ACCESS) {
        return Err(AuthzError::InsufficientRole);
    }
    Ok(identity)
}

/// Resource-level gate handlers call before mutating anything.
///
/// - No IO
/// - No panics
pub fn require_capability(identity: &Identity, required: &Capability) -> Result<(), AuthzError> {
    if has_capability(identity.roles(), required) {
        Ok(())
    } else {
        Err(AuthzError::InsufficientPermissions {
            required: required.clone(),
            roles: identity.roles().iter().cloned().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use backoffice_core::SubjectId;

    use super::*;
    use crate::IdentitySource;
    use crate::capability::{SETTINGS_UPDATE, USERS_BAN};

    fn identity(roles: &[Role], banned: bool) -> Identity {
        Identity {
            subject_id: SubjectId::new("s"),
            email: None,
            display_name: None,
            roles: roles.iter().cloned().collect::<BTreeSet<_>>(),
            banned,
            source: IdentitySource::Registry,
        }
    }

    #[test]
    fn ban_overrides_every_role_set() {
        for roles in [
            vec![Role::SUPER_ADMIN],
            vec![Role::GLOBAL_ADMIN, Role::EDU_ADMIN],
            vec![Role::EDU_ADMIN],
        ] {
            assert_eq!(admit(identity(&roles, true)), Err(AuthzError::Banned));
        }
    }

    #[test]
    fn non_admin_roles_are_insufficient() {
        assert_eq!(
            admit(identity(&[Role::new("Viewer")], false)),
            Err(AuthzError::InsufficientRole)
        );
        assert_eq!(admit(identity(&[], false)), Err(AuthzError::InsufficientRole));
    }

    #[test]
    fn admins_are_admitted() {
        let admitted = admit(identity(&[Role::EDU_ADMIN], false)).unwrap();
        assert!(admitted.has_role(&Role::EDU_ADMIN));
    }

    #[test]
    fn require_capability_reports_required_and_roles() {
        let id = identity(&[Role::GLOBAL_ADMIN], false);
        assert!(require_capability(&id, &USERS_BAN).is_ok());

        let err = require_capability(&id, &SETTINGS_UPDATE).unwrap_err();
        assert_eq!(err.code(), "INSUFFICIENT_PERMISSIONS");
        assert_eq!(err.status(), 403);
        let details = err.details().unwrap();
        assert_eq!(details.required, SETTINGS_UPDATE);
        assert_eq!(details.user_roles, vec![Role::GLOBAL_ADMIN]);
    }

    #[test]
    fn statuses_follow_the_taxonomy() {
        assert_eq!(AuthzError::NoCredential.status(), 401);
        assert_eq!(AuthzError::InvalidCredential.status(), 401);
        assert_eq!(AuthzError::NotAnAdmin.status(), 403);
        assert_eq!(AuthzError::NotAnAdmin.code(), "NOT_ADMIN");
        assert_eq!(AuthzError::Banned.code(), "USER_BANNED");
        assert_eq!(AuthzError::resolution_failed().status(), 500);
        assert_eq!(AuthzError::resolution_failed().code(), "DB_ERROR");
        assert_eq!(AuthzError::provider_failed().code(), "AUTH_ERROR");
        assert_eq!(
            AuthzError::from(SafetyViolation::SelfDemotion).code(),
            "SELF_DEMOTION_FORBIDDEN"
        );
    }

    #[test]
    fn internal_errors_do_not_leak_detail() {
        assert_eq!(
            AuthzError::resolution_failed().to_string(),
            "authorization could not be completed"
        );
    }
}
