//! Single-use invite codes that grant a role on redemption.
//!
//! State machine: `Active -> Used` (terminal). An optional expiry makes an
//! active invite unredeemable without changing its state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use backoffice_auth::Role;
use backoffice_core::{DomainError, SubjectId};

mod in_memory;
mod postgres;

pub use in_memory::InMemoryInviteStore;
pub use postgres::PostgresInviteStore;

pub const CODE_PREFIX: &str = "ADM-";
const CODE_LEN: usize = 6;
const ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Human-typeable invite code, e.g. `ADM-AB12CD`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InviteCode(String);

impl InviteCode {
    /// Fresh random code: prefix plus six uppercase base-36 characters.
    pub fn generate() -> Self {
        let mut n = uuid::Uuid::new_v4().as_u128();
        let mut code = String::with_capacity(CODE_PREFIX.len() + CODE_LEN);
        code.push_str(CODE_PREFIX);
        for _ in 0..CODE_LEN {
            code.push(ALPHABET[(n % 36) as usize] as char);
            n /= 36;
        }
        Self(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for InviteCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl core::str::FromStr for InviteCode {
    type Err = DomainError;

    /// Users type codes by hand: surrounding whitespace and case are forgiven.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_uppercase();
        let valid = code.len() <= 32
            && !code.is_empty()
            && code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
        if !valid {
            return Err(DomainError::validation("invite code must be alphanumeric"));
        }
        Ok(Self(code))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invite {
    pub code: InviteCode,
    pub role: Role,
    pub used: bool,
    pub created_by: SubjectId,
    pub created_at: DateTime<Utc>,
    pub used_by: Option<SubjectId>,
    pub used_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Invite {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInvite {
    pub code: InviteCode,
    pub role: Role,
    pub created_by: SubjectId,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum InviteError {
    #[error("invite not found")]
    NotFound,

    #[error("invite already used")]
    AlreadyUsed,

    #[error("invite expired")]
    Expired,

    #[error("invite code already exists")]
    Duplicate,

    #[error("invite store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait::async_trait]
pub trait InviteStore: Send + Sync {
    async fn create(&self, invite: NewInvite) -> Result<Invite, InviteError>;

    /// Newest first.
    async fn list(&self) -> Result<Vec<Invite>, InviteError>;

    async fn get(&self, code: &InviteCode) -> Result<Option<Invite>, InviteError>;

    /// Atomic check-and-set on `used = false`. Exactly one of any number of
    /// concurrent calls for the same code succeeds.
    async fn redeem(
        &self,
        code: &InviteCode,
        redeemed_by: &SubjectId,
        now: DateTime<Utc>,
    ) -> Result<Invite, InviteError>;

    async fn delete(&self, code: &InviteCode) -> Result<Invite, InviteError>;
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn generated_codes_have_the_expected_shape() {
        for _ in 0..100 {
            let code = InviteCode::generate();
            let s = code.as_str();
            assert!(s.starts_with(CODE_PREFIX));
            assert_eq!(s.len(), CODE_PREFIX.len() + CODE_LEN);
            assert!(s[CODE_PREFIX.len()..].chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
        }
    }

    #[test]
    fn parse_normalizes_case_and_whitespace() {
        let code: InviteCode = "  adm-ab12cd ".parse().unwrap();
        assert_eq!(code.as_str(), "ADM-AB12CD");
        assert!("".parse::<InviteCode>().is_err());
        assert!("ADM AB12CD".parse::<InviteCode>().is_err());
    }

    proptest! {
        #[test]
        fn generated_codes_parse_back_unchanged(_seed in 0u8..50) {
            let code = InviteCode::generate();
            let parsed: InviteCode = code.as_str().parse().unwrap();
            prop_assert_eq!(parsed, code);
        }
    }
}
