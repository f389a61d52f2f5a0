use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use backoffice_core::SubjectId;

use super::{Account, AccountStore, AccountStoreError};

#[derive(Debug, Default)]
pub struct InMemoryAccountStore {
    accounts: RwLock<HashMap<SubjectId, Account>>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an account (tests/dev).
    pub fn insert(&self, account: Account) {
        if let Ok(mut accounts) = self.accounts.write() {
            accounts.insert(account.subject_id.clone(), account);
        }
    }
}

fn poisoned<T>(_: T) -> AccountStoreError {
    AccountStoreError::Unavailable("account lock poisoned".to_string())
}

#[async_trait::async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn get(&self, subject_id: &SubjectId) -> Result<Option<Account>, AccountStoreError> {
        Ok(self.accounts.read().map_err(poisoned)?.get(subject_id).cloned())
    }

    async fn set_banned(
        &self,
        subject_id: &SubjectId,
        banned: bool,
        now: DateTime<Utc>,
    ) -> Result<Account, AccountStoreError> {
        let mut accounts = self.accounts.write().map_err(poisoned)?;
        let account = accounts
            .get_mut(subject_id)
            .ok_or_else(|| AccountStoreError::NotFound(subject_id.clone()))?;

        account.banned_at = match (banned, account.banned_at) {
            (true, Some(at)) => Some(at),
            (true, None) => Some(now),
            (false, _) => None,
        };
        Ok(account.clone())
    }

    async fn delete(&self, subject_id: &SubjectId) -> Result<Account, AccountStoreError> {
        self.accounts
            .write()
            .map_err(poisoned)?
            .remove(subject_id)
            .ok_or_else(|| AccountStoreError::NotFound(subject_id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn seeded(id: &str) -> InMemoryAccountStore {
        let store = InMemoryAccountStore::new();
        store.insert(Account::new(SubjectId::new(id), Utc::now()));
        store
    }

    #[tokio::test]
    async fn ban_then_unban() {
        let store = seeded("u1");
        let id = SubjectId::new("u1");

        let banned = store.set_banned(&id, true, Utc::now()).await.unwrap();
        assert!(banned.is_banned());

        let unbanned = store.set_banned(&id, false, Utc::now()).await.unwrap();
        assert!(!unbanned.is_banned());
    }

    #[tokio::test]
    async fn repeated_ban_keeps_first_timestamp() {
        let store = seeded("u1");
        let id = SubjectId::new("u1");
        let first = Utc::now() - Duration::days(1);

        store.set_banned(&id, true, first).await.unwrap();
        let again = store.set_banned(&id, true, Utc::now()).await.unwrap();
        assert_eq!(again.banned_at, Some(first));
    }

    #[tokio::test]
    async fn missing_accounts_are_not_found() {
        let store = InMemoryAccountStore::new();
        let id = SubjectId::new("ghost");
        assert_eq!(
            store.set_banned(&id, true, Utc::now()).await,
            Err(AccountStoreError::NotFound(id.clone()))
        );
        assert_eq!(store.delete(&id).await, Err(AccountStoreError::NotFound(id)));
    }

    #[tokio::test]
    async fn delete_removes() {
        let store = seeded("u1");
        let id = SubjectId::new("u1");
        store.delete(&id).await.unwrap();
        assert!(store.get(&id).await.unwrap().is_none());
    }
}
