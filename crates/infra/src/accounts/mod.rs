//! End-user accounts as seen by the back office: the targets of ban and
//! delete actions.

use chrono::{DateTime, Utc};
use serde::Serialize;

use backoffice_core::SubjectId;

mod in_memory;
mod postgres;

pub use in_memory::InMemoryAccountStore;
pub use postgres::PostgresAccountStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub subject_id: SubjectId,
    pub email: Option<String>,
    pub username: Option<String>,
    pub banned_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(subject_id: SubjectId, created_at: DateTime<Utc>) -> Self {
        Self {
            subject_id,
            email: None,
            username: None,
            banned_at: None,
            created_at,
        }
    }

    pub fn is_banned(&self) -> bool {
        self.banned_at.is_some()
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum AccountStoreError {
    #[error("account not found: {0}")]
    NotFound(SubjectId),

    #[error("account store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait::async_trait]
pub trait AccountStore: Send + Sync {
    async fn get(&self, subject_id: &SubjectId) -> Result<Option<Account>, AccountStoreError>;

    /// Set or clear `banned_at`. Banning an already banned account keeps the
    /// original timestamp.
    async fn set_banned(
        &self,
        subject_id: &SubjectId,
        banned: bool,
        now: DateTime<Utc>,
    ) -> Result<Account, AccountStoreError>;

    /// Remove the account, returning its last state.
    async fn delete(&self, subject_id: &SubjectId) -> Result<Account, AccountStoreError>;
}
