use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use backoffice_auth::{Identity, Role, RoleChange};
use backoffice_core::{DomainError, SubjectId};
use backoffice_infra::audit::{AuditAction, AuditFilter, Pagination};

// ─────────────────────────────────────────────────────────────────────────────
// Request DTOs
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RoleChangeRequest {
    pub user_id: String,
    pub role: String,
    pub action: RoleChange,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserAction {
    Ban,
    Unban,
    Delete,
}

#[derive(Debug, Deserialize)]
pub struct UserActionRequest {
    pub user_id: String,
    pub action: UserAction,
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateInviteRequest {
    /// Defaults to `GAdmin`.
    pub role: Option<String>,
    /// Overrides the configured default expiry.
    pub expires_in_hours: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct RedeemInviteRequest {
    pub code: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AuditLogQuery {
    pub actor_id: Option<String>,
    pub action: Option<String>,
    pub target_type: Option<String>,
    pub target_id: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl AuditLogQuery {
    pub fn into_parts(self) -> Result<(AuditFilter, Pagination), DomainError> {
        let actor_id = self.actor_id.map(|a| a.parse::<SubjectId>()).transpose()?;
        let action = self.action.map(|a| a.parse::<AuditAction>()).transpose()?;

        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start > end {
                return Err(DomainError::validation("start must not be after end"));
            }
        }

        let filter = AuditFilter {
            actor_id,
            action,
            target_type: self.target_type,
            target_id: self.target_id,
            start: self.start,
            end: self.end,
        };
        Ok((filter, Pagination::new(self.limit, self.offset)))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AuditStatsQuery {
    pub days: Option<u32>,
    pub actor_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CapabilityCheckQuery {
    pub capability: String,
}

pub fn parse_subject(raw: &str) -> Result<SubjectId, DomainError> {
    raw.parse()
}

/// Only tags from the administrative vocabulary may be granted.
pub fn parse_admin_role(raw: &str) -> Result<Role, DomainError> {
    let role = Role::new(raw.trim().to_string());
    if role.is_administrative() {
        Ok(role)
    } else {
        Err(DomainError::unknown_tag("role", raw))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Response DTOs
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub subject_id: SubjectId,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub roles: BTreeSet<Role>,
    pub is_super_admin: bool,
    pub source: &'static str,
}

impl From<&Identity> for MeResponse {
    fn from(identity: &Identity) -> Self {
        Self {
            subject_id: identity.subject_id.clone(),
            email: identity.email.clone(),
            display_name: identity.display_name.clone(),
            roles: identity.roles.clone(),
            is_super_admin: identity.is_super_admin(),
            source: identity.source.as_str(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_query_rejects_unknown_action_and_inverted_range() {
        let q = AuditLogQuery {
            action: Some("user.exploded".into()),
            ..Default::default()
        };
        assert!(q.into_parts().is_err());

        let now = Utc::now();
        let q = AuditLogQuery {
            start: Some(now),
            end: Some(now - chrono::Duration::hours(1)),
            ..Default::default()
        };
        assert!(q.into_parts().is_err());
    }

    #[test]
    fn audit_query_clamps_page_size() {
        let q = AuditLogQuery {
            action: Some("user.banned".into()),
            limit: Some(10_000),
            ..Default::default()
        };
        let (filter, page) = q.into_parts().unwrap();
        assert_eq!(filter.action, Some(AuditAction::UserBanned));
        assert_eq!(page.limit, 500);
    }

    #[test]
    fn only_admin_roles_are_grantable() {
        assert_eq!(parse_admin_role("GAdmin").unwrap(), Role::GLOBAL_ADMIN);
        assert!(parse_admin_role("Owner").is_err());
    }
}
