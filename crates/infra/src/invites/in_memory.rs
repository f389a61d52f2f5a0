use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use backoffice_core::SubjectId;

use super::{Invite, InviteCode, InviteError, InviteStore, NewInvite};

/// In-memory invite store for tests/dev.
///
/// A single mutex serializes redemption, which is the check-and-set.
#[derive(Debug, Default)]
pub struct InMemoryInviteStore {
    invites: Mutex<HashMap<InviteCode, Invite>>,
}

impl InMemoryInviteStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> InviteError {
    InviteError::Unavailable("invite lock poisoned".to_string())
}

#[async_trait::async_trait]
impl InviteStore for InMemoryInviteStore {
    async fn create(&self, invite: NewInvite) -> Result<Invite, InviteError> {
        let mut invites = self.invites.lock().map_err(poisoned)?;
        if invites.contains_key(&invite.code) {
            return Err(InviteError::Duplicate);
        }
        let stored = Invite {
            code: invite.code.clone(),
            role: invite.role,
            used: false,
            created_by: invite.created_by,
            created_at: Utc::now(),
            used_by: None,
            used_at: None,
            expires_at: invite.expires_at,
        };
        invites.insert(invite.code, stored.clone());
        Ok(stored)
    }

    async fn list(&self) -> Result<Vec<Invite>, InviteError> {
        let invites = self.invites.lock().map_err(poisoned)?;
        let mut all: Vec<Invite> = invites.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.code.cmp(&b.code)));
        Ok(all)
    }

    async fn get(&self, code: &InviteCode) -> Result<Option<Invite>, InviteError> {
        let invites = self.invites.lock().map_err(poisoned)?;
        Ok(invites.get(code).cloned())
    }

    async fn redeem(
        &self,
        code: &InviteCode,
        redeemed_by: &SubjectId,
        now: DateTime<Utc>,
    ) -> Result<Invite, InviteError> {
        let mut invites = self.invites.lock().map_err(poisoned)?;
        let invite = invites.get_mut(code).ok_or(InviteError::NotFound)?;

        if invite.used {
            return Err(InviteError::AlreadyUsed);
        }
        if invite.is_expired(now) {
            return Err(InviteError::Expired);
        }

        invite.used = true;
        invite.used_by = Some(redeemed_by.clone());
        invite.used_at = Some(now);
        Ok(invite.clone())
    }

    async fn delete(&self, code: &InviteCode) -> Result<Invite, InviteError> {
        let mut invites = self.invites.lock().map_err(poisoned)?;
        invites.remove(code).ok_or(InviteError::NotFound)
    }
}
