//! Postgres-backed admin registry.
//!
//! Table (created by `db::ensure_registry_schema`):
//!
//! ```sql
//! CREATE TABLE admin_registry (
//!     subject_id   TEXT PRIMARY KEY,
//!     email        TEXT,
//!     display_name TEXT,
//!     roles        TEXT[] NOT NULL DEFAULT '{}',
//!     active       BOOLEAN NOT NULL DEFAULT TRUE,
//!     banned       BOOLEAN NOT NULL DEFAULT FALSE,
//!     created_by   TEXT,
//!     created_at   TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at   TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```
//!
//! Role mutations use `array_append` / `array_remove` inside a single
//! `UPDATE`/`INSERT ... ON CONFLICT`, so concurrent grant/revoke calls on
//! the same subject never lose updates.

use std::collections::BTreeSet;
use std::sync::Arc;

use sqlx::{PgPool, Row};
use tracing::instrument;

use backoffice_auth::Role;
use backoffice_core::SubjectId;

use super::{
    AdminRecord, AdminRecordPatch, AdminRegistry, RegistryError, RemovalGuard, admin_role_names,
};

#[derive(Debug, Clone)]
pub struct PostgresAdminRegistry {
    pool: Arc<PgPool>,
}

impl PostgresAdminRegistry {
    /// The pool must point at the registry database, never the main one.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

const SELECT_COLUMNS: &str = "subject_id, email, display_name, roles, active, banned, created_by, created_at, updated_at";

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> RegistryError {
    match err {
        sqlx::Error::Database(db_err) => {
            RegistryError::Unavailable(format!("database error in {}: {}", operation, db_err.message()))
        }
        other => RegistryError::Unavailable(format!("{} failed: {}", operation, other)),
    }
}

fn roles_from(names: Vec<String>) -> BTreeSet<Role> {
    names.into_iter().map(Role::new).collect()
}

fn record_from_row(row: &sqlx::postgres::PgRow) -> Result<AdminRecord, sqlx::Error> {
    Ok(AdminRecord {
        subject_id: SubjectId::new(row.try_get::<String, _>("subject_id")?),
        email: row.try_get("email")?,
        display_name: row.try_get("display_name")?,
        roles: roles_from(row.try_get("roles")?),
        active: row.try_get("active")?,
        banned: row.try_get("banned")?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait::async_trait]
impl AdminRegistry for PostgresAdminRegistry {
    #[instrument(skip(self), fields(subject_id = %subject_id), err)]
    async fn get(&self, subject_id: &SubjectId) -> Result<Option<AdminRecord>, RegistryError> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM admin_registry WHERE subject_id = $1");
        let row = sqlx::query(&sql)
            .bind(subject_id.as_str())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_admin", e))?;

        row.map(|r| record_from_row(&r))
            .transpose()
            .map_err(|e| map_sqlx_error("decode_admin", e))
    }

    #[instrument(skip(self, patch), fields(subject_id = %subject_id), err)]
    async fn upsert_merge(
        &self,
        subject_id: &SubjectId,
        patch: AdminRecordPatch,
    ) -> Result<AdminRecord, RegistryError> {
        let add_roles: Vec<String> = patch
            .add_roles
            .iter()
            .map(|r| r.as_str().to_string())
            .collect();

        let sql = format!(
            r#"
            INSERT INTO admin_registry (subject_id, email, display_name, roles, active, created_by)
            VALUES ($1, $2, $3, $4, COALESCE($5, TRUE), $6)
            ON CONFLICT (subject_id) DO UPDATE SET
                email = COALESCE(EXCLUDED.email, admin_registry.email),
                display_name = COALESCE(EXCLUDED.display_name, admin_registry.display_name),
                roles = ARRAY(
                    SELECT DISTINCT r FROM unnest(admin_registry.roles || EXCLUDED.roles) AS r
                ),
                active = COALESCE($5, admin_registry.active),
                created_by = COALESCE(admin_registry.created_by, EXCLUDED.created_by),
                updated_at = NOW()
            RETURNING {SELECT_COLUMNS}
            "#
        );

        let row = sqlx::query(&sql)
            .bind(subject_id.as_str())
            .bind(patch.email)
            .bind(patch.display_name)
            .bind(add_roles)
            .bind(patch.active)
            .bind(patch.created_by)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("upsert_admin", e))?;

        record_from_row(&row).map_err(|e| map_sqlx_error("decode_admin", e))
    }

    #[instrument(skip(self), fields(subject_id = %subject_id, role = %role), err)]
    async fn add_role(
        &self,
        subject_id: &SubjectId,
        role: &Role,
    ) -> Result<BTreeSet<Role>, RegistryError> {
        let row = sqlx::query(
            r#"
            INSERT INTO admin_registry (subject_id, roles)
            VALUES ($1, ARRAY[$2]::text[])
            ON CONFLICT (subject_id) DO UPDATE SET
                roles = CASE
                    WHEN $2 = ANY(admin_registry.roles) THEN admin_registry.roles
                    ELSE array_append(admin_registry.roles, $2)
                END,
                updated_at = NOW()
            RETURNING roles
            "#,
        )
        .bind(subject_id.as_str())
        .bind(role.as_str())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("add_role", e))?;

        let names: Vec<String> = row
            .try_get("roles")
            .map_err(|e| map_sqlx_error("decode_roles", e))?;
        Ok(roles_from(names))
    }

    #[instrument(skip(self), fields(subject_id = %subject_id, role = %role), err)]
    async fn remove_role(
        &self,
        subject_id: &SubjectId,
        role: &Role,
        guard: RemovalGuard,
    ) -> Result<BTreeSet<Role>, RegistryError> {
        // NULL disables the precondition; otherwise the surviving roles must
        // overlap the administrative vocabulary.
        let keep_one_of: Option<Vec<String>> = match guard {
            RemovalGuard::Unconditional => None,
            RemovalGuard::KeepAdminRole => Some(admin_role_names()),
        };

        let row = sqlx::query(
            r#"
            UPDATE admin_registry
            SET roles = array_remove(roles, $2), updated_at = NOW()
            WHERE subject_id = $1
              AND $2 = ANY(roles)
              AND ($3::text[] IS NULL OR array_remove(roles, $2) && $3::text[])
            RETURNING roles
            "#,
        )
        .bind(subject_id.as_str())
        .bind(role.as_str())
        .bind(keep_one_of)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("remove_role", e))?;

        if let Some(row) = row {
            let names: Vec<String> = row
                .try_get("roles")
                .map_err(|e| map_sqlx_error("decode_roles", e))?;
            return Ok(roles_from(names));
        }

        // Nothing updated: record missing, role not held, or guard refused.
        match self.get(subject_id).await? {
            None => Err(RegistryError::NotFound(subject_id.clone())),
            Some(record) if !record.roles.contains(role) => Ok(record.roles),
            Some(_) => Err(RegistryError::PreconditionFailed(format!(
                "removing {role} would leave no administrative role"
            ))),
        }
    }

    #[instrument(skip(self), fields(subject_id = %subject_id), err)]
    async fn set_banned(&self, subject_id: &SubjectId, banned: bool) -> Result<bool, RegistryError> {
        let result = sqlx::query(
            "UPDATE admin_registry SET banned = $2, updated_at = NOW() WHERE subject_id = $1",
        )
        .bind(subject_id.as_str())
        .bind(banned)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("set_banned", e))?;

        Ok(result.rows_affected() > 0)
    }
}
