//! Environment-configured master/backup accounts.
//!
//! These identities get super-admin access without touching the admin
//! registry, so a corrupted registry can never lock out recovery access.
//! The list is read once at process start and never mutated.

use backoffice_core::SubjectId;

pub const MASTER_EMAIL_VAR: &str = "MASTER_ACCOUNT_EMAIL";
pub const LEGACY_MASTER_EMAIL_VAR: &str = "VITE_MASTER_ACCOUNT_EMAIL";
pub const MASTER_UID_VAR: &str = "MASTER_ACCOUNT_UID";
pub const BACKUP_UIDS_VAR: &str = "BACKUP_ADMIN_UIDS";

/// One `{email?, subject_id?}` tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterEntry {
    pub email: Option<String>,
    pub subject_id: Option<SubjectId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MasterList {
    entries: Vec<MasterEntry>,
}

impl MasterList {
    pub fn new(entries: Vec<MasterEntry>) -> Self {
        Self { entries }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (the environment in production, a map in tests).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut entries = Vec::new();

        let email = non_blank(MASTER_EMAIL_VAR).or_else(|| non_blank(LEGACY_MASTER_EMAIL_VAR));
        let uid = non_blank(MASTER_UID_VAR).map(SubjectId::new);
        if email.is_some() || uid.is_some() {
            entries.push(MasterEntry {
                email,
                subject_id: uid,
            });
        }

        if let Some(backups) = lookup(BACKUP_UIDS_VAR) {
            entries.extend(
                backups
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|uid| MasterEntry {
                        email: None,
                        subject_id: Some(SubjectId::new(uid)),
                    }),
            );
        }

        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exact match on subject id, or on the claimed email when one is present.
    pub fn matches(&self, subject_id: &SubjectId, claimed_email: Option<&str>) -> bool {
        self.entries.iter().any(|entry| {
            let uid_match = entry.subject_id.as_ref() == Some(subject_id);
            let email_match = match (entry.email.as_deref(), claimed_email) {
                (Some(expected), Some(claimed)) => expected == claimed,
                _ => false,
            };
            uid_match || email_match
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn list(vars: &[(&str, &str)]) -> MasterList {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        MasterList::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn empty_environment_yields_empty_list() {
        let masters = list(&[]);
        assert!(masters.is_empty());
        assert!(!masters.matches(&SubjectId::new("anyone"), Some("a@b.c")));
    }

    #[test]
    fn backup_uids_are_trimmed_and_blank_entries_dropped() {
        let masters = list(&[(BACKUP_UIDS_VAR, " uid-a , ,uid-b,, ")]);
        assert_eq!(masters.len(), 2);
        assert!(masters.matches(&SubjectId::new("uid-a"), None));
        assert!(masters.matches(&SubjectId::new("uid-b"), None));
        assert!(!masters.matches(&SubjectId::new(""), None));
    }

    #[test]
    fn email_match_is_exact() {
        let masters = list(&[(MASTER_EMAIL_VAR, "root@example.com")]);
        assert!(masters.matches(&SubjectId::new("x"), Some("root@example.com")));
        assert!(!masters.matches(&SubjectId::new("x"), Some("Root@example.com")));
        assert!(!masters.matches(&SubjectId::new("x"), None));
    }

    #[test]
    fn legacy_email_variable_is_a_fallback() {
        let masters = list(&[(LEGACY_MASTER_EMAIL_VAR, "legacy@example.com")]);
        assert!(masters.matches(&SubjectId::new("x"), Some("legacy@example.com")));

        let masters = list(&[
            (MASTER_EMAIL_VAR, "new@example.com"),
            (LEGACY_MASTER_EMAIL_VAR, "legacy@example.com"),
        ]);
        assert!(!masters.matches(&SubjectId::new("x"), Some("legacy@example.com")));
    }

    #[test]
    fn master_uid_matches_without_email() {
        let masters = list(&[(MASTER_UID_VAR, "uid-root")]);
        assert!(masters.matches(&SubjectId::new("uid-root"), None));
    }
}
