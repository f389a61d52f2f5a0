//! Postgres-backed invite store (main data store).
//!
//! ```sql
//! CREATE TABLE admin_invites (
//!     code        TEXT PRIMARY KEY,
//!     role        TEXT NOT NULL,
//!     used        BOOLEAN NOT NULL DEFAULT FALSE,
//!     created_by  TEXT NOT NULL,
//!     created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     used_by     TEXT,
//!     used_at     TIMESTAMPTZ,
//!     expires_at  TIMESTAMPTZ
//! );
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::instrument;

use backoffice_auth::Role;
use backoffice_core::SubjectId;

use super::{Invite, InviteCode, InviteError, InviteStore, NewInvite};

#[derive(Debug, Clone)]
pub struct PostgresInviteStore {
    pool: Arc<PgPool>,
}

impl PostgresInviteStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

const SELECT_COLUMNS: &str = "code, role, used, created_by, created_at, used_by, used_at, expires_at";

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> InviteError {
    match err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => InviteError::Duplicate,
        sqlx::Error::Database(db_err) => {
            InviteError::Unavailable(format!("database error in {}: {}", operation, db_err.message()))
        }
        other => InviteError::Unavailable(format!("{} failed: {}", operation, other)),
    }
}

fn invite_from_row(row: &sqlx::postgres::PgRow) -> Result<Invite, InviteError> {
    let decode = |e| map_sqlx_error("decode_invite", e);
    let code: String = row.try_get("code").map_err(decode)?;

    Ok(Invite {
        code: code
            .parse()
            .map_err(|e: backoffice_core::DomainError| InviteError::Unavailable(e.to_string()))?,
        role: Role::new(row.try_get::<String, _>("role").map_err(decode)?),
        used: row.try_get("used").map_err(decode)?,
        created_by: SubjectId::new(row.try_get::<String, _>("created_by").map_err(decode)?),
        created_at: row.try_get("created_at").map_err(decode)?,
        used_by: row
            .try_get::<Option<String>, _>("used_by")
            .map_err(decode)?
            .map(SubjectId::new),
        used_at: row.try_get("used_at").map_err(decode)?,
        expires_at: row.try_get("expires_at").map_err(decode)?,
    })
}

#[async_trait::async_trait]
impl InviteStore for PostgresInviteStore {
    #[instrument(skip(self, invite), fields(code = %invite.code, role = %invite.role), err)]
    async fn create(&self, invite: NewInvite) -> Result<Invite, InviteError> {
        let sql = format!(
            r#"
            INSERT INTO admin_invites (code, role, created_by, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING {SELECT_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(invite.code.as_str())
            .bind(invite.role.as_str())
            .bind(invite.created_by.as_str())
            .bind(invite.expires_at)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("create_invite", e))?;

        invite_from_row(&row)
    }

    #[instrument(skip(self), err)]
    async fn list(&self) -> Result<Vec<Invite>, InviteError> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM admin_invites ORDER BY created_at DESC, code ASC");
        let rows = sqlx::query(&sql)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_invites", e))?;

        rows.iter().map(invite_from_row).collect()
    }

    #[instrument(skip(self), fields(code = %code), err)]
    async fn get(&self, code: &InviteCode) -> Result<Option<Invite>, InviteError> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM admin_invites WHERE code = $1");
        let row = sqlx::query(&sql)
            .bind(code.as_str())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_invite", e))?;

        row.as_ref().map(invite_from_row).transpose()
    }

    #[instrument(skip(self), fields(code = %code, redeemed_by = %redeemed_by), err)]
    async fn redeem(
        &self,
        code: &InviteCode,
        redeemed_by: &SubjectId,
        now: DateTime<Utc>,
    ) -> Result<Invite, InviteError> {
        // The WHERE clause is the check; the row lock taken by UPDATE makes
        // it a check-and-set. Losers of a race match zero rows.
        let sql = format!(
            r#"
            UPDATE admin_invites
            SET used = TRUE, used_by = $2, used_at = $3
            WHERE code = $1
              AND used = FALSE
              AND (expires_at IS NULL OR expires_at > $3)
            RETURNING {SELECT_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(code.as_str())
            .bind(redeemed_by.as_str())
            .bind(now)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("redeem_invite", e))?;

        if let Some(row) = row {
            return invite_from_row(&row);
        }

        match self.get(code).await? {
            None => Err(InviteError::NotFound),
            Some(invite) if invite.used => Err(InviteError::AlreadyUsed),
            Some(_) => Err(InviteError::Expired),
        }
    }

    #[instrument(skip(self), fields(code = %code), err)]
    async fn delete(&self, code: &InviteCode) -> Result<Invite, InviteError> {
        let sql = format!("DELETE FROM admin_invites WHERE code = $1 RETURNING {SELECT_COLUMNS}");
        let row = sqlx::query(&sql)
            .bind(code.as_str())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_invite", e))?;

        match row {
            Some(row) => invite_from_row(&row),
            None => Err(InviteError::NotFound),
        }
    }
}
