//! Audit trail of privileged mutations.
//!
//! Entries are append-only: nothing in this crate updates or deletes one.
//! `AuditRecorder` is the fire-and-forget front door handlers use;
//! `AuditStore` is the datastore seam behind it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use backoffice_auth::Identity;
use backoffice_core::{AuditEntryId, DomainError, SubjectId};

mod in_memory;
mod postgres;
mod recorder;

pub use in_memory::InMemoryAuditStore;
pub use postgres::PostgresAuditStore;
pub use recorder::AuditRecorder;

// ─────────────────────────────────────────────────────────────────────────────
// Action vocabulary
// ─────────────────────────────────────────────────────────────────────────────

/// Closed set of action tags. Extend, never repurpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditAction {
    UserBanned,
    UserUnbanned,
    UserDeleted,
    UserRoleGranted,
    UserRoleRevoked,
    UserUpdated,
    PostDeleted,
    PostApproved,
    CommentDeleted,
    CommentApproved,
    SchoolCreated,
    SchoolUpdated,
    SchoolDeleted,
    StudentEnrolled,
    StudentRemoved,
    StudentUpdated,
    SettingUpdated,
    FeatureFlagToggled,
    InviteCreated,
    InviteDeleted,
    InviteRedeemed,
}

impl AuditAction {
    pub const ALL: [AuditAction; 21] = [
        AuditAction::UserBanned,
        AuditAction::UserUnbanned,
        AuditAction::UserDeleted,
        AuditAction::UserRoleGranted,
        AuditAction::UserRoleRevoked,
        AuditAction::UserUpdated,
        AuditAction::PostDeleted,
        AuditAction::PostApproved,
        AuditAction::CommentDeleted,
        AuditAction::CommentApproved,
        AuditAction::SchoolCreated,
        AuditAction::SchoolUpdated,
        AuditAction::SchoolDeleted,
        AuditAction::StudentEnrolled,
        AuditAction::StudentRemoved,
        AuditAction::StudentUpdated,
        AuditAction::SettingUpdated,
        AuditAction::FeatureFlagToggled,
        AuditAction::InviteCreated,
        AuditAction::InviteDeleted,
        AuditAction::InviteRedeemed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::UserBanned => "user.banned",
            AuditAction::UserUnbanned => "user.unbanned",
            AuditAction::UserDeleted => "user.deleted",
            AuditAction::UserRoleGranted => "user.role_granted",
            AuditAction::UserRoleRevoked => "user.role_revoked",
            AuditAction::UserUpdated => "user.updated",
            AuditAction::PostDeleted => "post.deleted",
            AuditAction::PostApproved => "post.approved",
            AuditAction::CommentDeleted => "comment.deleted",
            AuditAction::CommentApproved => "comment.approved",
            AuditAction::SchoolCreated => "school.created",
            AuditAction::SchoolUpdated => "school.updated",
            AuditAction::SchoolDeleted => "school.deleted",
            AuditAction::StudentEnrolled => "student.enrolled",
            AuditAction::StudentRemoved => "student.removed",
            AuditAction::StudentUpdated => "student.updated",
            AuditAction::SettingUpdated => "setting.updated",
            AuditAction::FeatureFlagToggled => "feature_flag.toggled",
            AuditAction::InviteCreated => "invite.created",
            AuditAction::InviteDeleted => "invite.deleted",
            AuditAction::InviteRedeemed => "invite.redeemed",
        }
    }

    /// Tag contains `ban` or `delete`; the same pattern the stats query uses.
    pub fn is_destructive(&self) -> bool {
        is_destructive_tag(self.as_str())
    }
}

pub(crate) fn is_destructive_tag(tag: &str) -> bool {
    tag.contains("ban") || tag.contains("delete")
}

impl core::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for AuditAction {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AuditAction::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| DomainError::unknown_tag("audit action", s))
    }
}

impl Serialize for AuditAction {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AuditAction {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Entries
// ─────────────────────────────────────────────────────────────────────────────

/// Best-effort origin of the request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMetadata {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// An entry before the store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewAuditEntry {
    pub actor_id: SubjectId,
    pub actor_email: Option<String>,
    pub action: AuditAction,
    pub target_type: Option<String>,
    pub target_id: Option<String>,
    pub before_value: Option<serde_json::Value>,
    pub after_value: Option<serde_json::Value>,
    pub reason: Option<String>,
    pub request_metadata: RequestMetadata,
}

impl NewAuditEntry {
    /// Actor fields are captured from the identity now, not re-resolved later.
    pub fn by(actor: &Identity, action: AuditAction) -> Self {
        Self {
            actor_id: actor.subject_id.clone(),
            actor_email: actor.email.clone(),
            action,
            target_type: None,
            target_id: None,
            before_value: None,
            after_value: None,
            reason: None,
            request_metadata: RequestMetadata::default(),
        }
    }

    pub fn target(mut self, target_type: impl Into<String>, target_id: impl Into<String>) -> Self {
        self.target_type = Some(target_type.into());
        self.target_id = Some(target_id.into());
        self
    }

    pub fn before(mut self, value: serde_json::Value) -> Self {
        self.before_value = Some(value);
        self
    }

    pub fn after(mut self, value: serde_json::Value) -> Self {
        self.after_value = Some(value);
        self
    }

    pub fn reason(mut self, reason: Option<String>) -> Self {
        self.reason = reason.filter(|r| !r.trim().is_empty());
        self
    }

    pub fn metadata(mut self, metadata: RequestMetadata) -> Self {
        self.request_metadata = metadata;
        self
    }

    pub(crate) fn into_entry(self, id: AuditEntryId, created_at: DateTime<Utc>) -> AuditEntry {
        AuditEntry {
            id,
            actor_id: self.actor_id,
            actor_email: self.actor_email,
            action: self.action,
            target_type: self.target_type,
            target_id: self.target_id,
            before_value: self.before_value,
            after_value: self.after_value,
            reason: self.reason,
            request_metadata: self.request_metadata,
            created_at,
        }
    }
}

/// Immutable, persisted audit record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub id: AuditEntryId,
    pub actor_id: SubjectId,
    pub actor_email: Option<String>,
    pub action: AuditAction,
    pub target_type: Option<String>,
    pub target_id: Option<String>,
    pub before_value: Option<serde_json::Value>,
    pub after_value: Option<serde_json::Value>,
    pub reason: Option<String>,
    pub request_metadata: RequestMetadata,
    /// Server-assigned; the authoritative ordering key.
    pub created_at: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Queries
// ─────────────────────────────────────────────────────────────────────────────

pub const DEFAULT_PAGE_SIZE: u32 = 100;
pub const MAX_PAGE_SIZE: u32 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: u32,
    pub offset: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

impl Pagination {
    /// Page size is clamped to `1..=MAX_PAGE_SIZE`.
    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
            offset: offset.unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFilter {
    pub actor_id: Option<SubjectId>,
    pub action: Option<AuditAction>,
    pub target_type: Option<String>,
    pub target_id: Option<String>,
    /// Inclusive lower bound on `created_at`.
    pub start: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `created_at`.
    pub end: Option<DateTime<Utc>>,
}

impl AuditFilter {
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        self.actor_id.as_ref().is_none_or(|a| *a == entry.actor_id)
            && self.action.is_none_or(|a| a == entry.action)
            && self
                .target_type
                .as_deref()
                .is_none_or(|t| entry.target_type.as_deref() == Some(t))
            && self
                .target_id
                .as_deref()
                .is_none_or(|t| entry.target_id.as_deref() == Some(t))
            && self.start.is_none_or(|s| entry.created_at >= s)
            && self.end.is_none_or(|e| entry.created_at <= e)
    }
}

/// One page of entries, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct AuditPage {
    pub entries: Vec<AuditEntry>,
    pub total: u64,
    pub pagination: Pagination,
    pub has_more: bool,
}

pub const DEFAULT_STATS_WINDOW_DAYS: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsQuery<'a> {
    pub window_days: u32,
    pub actor_id: Option<&'a SubjectId>,
}

impl Default for StatsQuery<'_> {
    fn default() -> Self {
        Self {
            window_days: DEFAULT_STATS_WINDOW_DAYS,
            actor_id: None,
        }
    }
}

/// Dashboard summary over the (optionally actor-scoped) log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditStats {
    pub total_actions: u64,
    pub distinct_actors: u64,
    pub destructive_actions: u64,
    pub recent_actions: u64,
    pub window_days: u32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Store seam
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum AuditStoreError {
    #[error("audit store unavailable: {0}")]
    Unavailable(String),

    #[error("audit store timed out")]
    Timeout,

    #[error("corrupt audit row: {0}")]
    Corrupt(String),
}

#[async_trait::async_trait]
pub trait AuditStore: Send + Sync {
    /// Append-only insert. The store assigns `id` and `created_at`.
    async fn append(&self, entry: NewAuditEntry) -> Result<AuditEntry, AuditStoreError>;

    async fn query(
        &self,
        filter: AuditFilter,
        pagination: Pagination,
    ) -> Result<AuditPage, AuditStoreError>;

    async fn stats(&self, query: StatsQuery<'_>) -> Result<AuditStats, AuditStoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_tags_round_trip_through_from_str() {
        for action in AuditAction::ALL {
            assert_eq!(action.as_str().parse::<AuditAction>().unwrap(), action);
        }
        assert!("user.promoted".parse::<AuditAction>().is_err());
    }

    #[test]
    fn destructive_pattern_matches_ban_and_delete_tags() {
        assert!(AuditAction::UserBanned.is_destructive());
        assert!(AuditAction::UserUnbanned.is_destructive());
        assert!(AuditAction::SchoolDeleted.is_destructive());
        assert!(!AuditAction::UserRoleGranted.is_destructive());
        assert!(!AuditAction::InviteCreated.is_destructive());
    }

    #[test]
    fn pagination_is_capped() {
        assert_eq!(Pagination::new(None, None), Pagination::default());
        assert_eq!(Pagination::new(Some(10_000), Some(5)).limit, MAX_PAGE_SIZE);
        assert_eq!(Pagination::new(Some(0), None).limit, 1);
    }

    #[test]
    fn action_serializes_as_its_tag() {
        let json = serde_json::to_value(AuditAction::UserRoleGranted).unwrap();
        assert_eq!(json, serde_json::json!("user.role_granted"));
        let back: AuditAction = serde_json::from_value(json).unwrap();
        assert_eq!(back, AuditAction::UserRoleGranted);
    }

    #[test]
    fn reason_blank_is_dropped() {
        let actor = Identity::master(SubjectId::new("m"), None);
        let entry = NewAuditEntry::by(&actor, AuditAction::UserBanned).reason(Some("   ".into()));
        assert_eq!(entry.reason, None);
    }
}
