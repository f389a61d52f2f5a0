//! Accounts live in the main data store's `users` table. Only the columns
//! the back office needs are read.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::instrument;

use backoffice_core::SubjectId;

use super::{Account, AccountStore, AccountStoreError};

#[derive(Debug, Clone)]
pub struct PostgresAccountStore {
    pool: Arc<PgPool>,
}

impl PostgresAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

const SELECT_COLUMNS: &str = "id, email, username, banned_at, created_at";

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> AccountStoreError {
    match err {
        sqlx::Error::Database(db_err) => AccountStoreError::Unavailable(format!(
            "database error in {}: {}",
            operation,
            db_err.message()
        )),
        other => AccountStoreError::Unavailable(format!("{} failed: {}", operation, other)),
    }
}

fn account_from_row(row: &sqlx::postgres::PgRow) -> Result<Account, AccountStoreError> {
    let decode = |e| map_sqlx_error("decode_account", e);
    Ok(Account {
        subject_id: SubjectId::new(row.try_get::<String, _>("id").map_err(decode)?),
        email: row.try_get("email").map_err(decode)?,
        username: row.try_get("username").map_err(decode)?,
        banned_at: row.try_get("banned_at").map_err(decode)?,
        created_at: row.try_get("created_at").map_err(decode)?,
    })
}

#[async_trait::async_trait]
impl AccountStore for PostgresAccountStore {
    #[instrument(skip(self), fields(subject_id = %subject_id), err)]
    async fn get(&self, subject_id: &SubjectId) -> Result<Option<Account>, AccountStoreError> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(subject_id.as_str())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_account", e))?;

        row.as_ref().map(account_from_row).transpose()
    }

    #[instrument(skip(self), fields(subject_id = %subject_id), err)]
    async fn set_banned(
        &self,
        subject_id: &SubjectId,
        banned: bool,
        now: DateTime<Utc>,
    ) -> Result<Account, AccountStoreError> {
        let sql = format!(
            r#"
            UPDATE users
            SET banned_at = CASE WHEN $2 THEN COALESCE(banned_at, $3) ELSE NULL END
            WHERE id = $1
            RETURNING {SELECT_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(subject_id.as_str())
            .bind(banned)
            .bind(now)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("set_banned", e))?;

        match row {
            Some(row) => account_from_row(&row),
            None => Err(AccountStoreError::NotFound(subject_id.clone())),
        }
    }

    #[instrument(skip(self), fields(subject_id = %subject_id), err)]
    async fn delete(&self, subject_id: &SubjectId) -> Result<Account, AccountStoreError> {
        let sql = format!("DELETE FROM users WHERE id = $1 RETURNING {SELECT_COLUMNS}");
        let row = sqlx::query(&sql)
            .bind(subject_id.as_str())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_account", e))?;

        match row {
            Some(row) => account_from_row(&row),
            None => Err(AccountStoreError::NotFound(subject_id.clone())),
        }
    }
}
