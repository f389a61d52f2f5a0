//! Postgres-backed audit log.
//!
//! ```sql
//! CREATE TABLE admin_audit_log (
//!     id          UUID PRIMARY KEY,
//!     admin_id    TEXT NOT NULL,
//!     admin_email TEXT,
//!     action      TEXT NOT NULL,
//!     target_type TEXT,
//!     target_id   TEXT,
//!     old_values  JSONB,
//!     new_values  JSONB,
//!     reason      TEXT,
//!     ip_address  TEXT,
//!     user_agent  TEXT,
//!     created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! CREATE INDEX admin_audit_log_created_at ON admin_audit_log (created_at DESC);
//! ```
//!
//! Insert-only. The table lives in the main data store.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::instrument;

use backoffice_core::{AuditEntryId, SubjectId};

use super::{
    AuditAction, AuditEntry, AuditFilter, AuditPage, AuditStats, AuditStore, AuditStoreError,
    NewAuditEntry, Pagination, RequestMetadata, StatsQuery,
};

#[derive(Debug, Clone)]
pub struct PostgresAuditStore {
    pool: Arc<PgPool>,
}

impl PostgresAuditStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> AuditStoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            AuditStoreError::Unavailable(format!("database error in {}: {}", operation, db_err.message()))
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::ColumnNotFound(_) => {
            AuditStoreError::Corrupt(format!("{}: {}", operation, err))
        }
        other => AuditStoreError::Unavailable(format!("{} failed: {}", operation, other)),
    }
}

fn entry_from_row(row: &sqlx::postgres::PgRow) -> Result<AuditEntry, AuditStoreError> {
    let decode = |e| map_sqlx_error("decode_audit_row", e);

    let action: String = row.try_get("action").map_err(decode)?;
    let action: AuditAction = action
        .parse()
        .map_err(|e: backoffice_core::DomainError| AuditStoreError::Corrupt(e.to_string()))?;

    Ok(AuditEntry {
        id: AuditEntryId::from_uuid(row.try_get("id").map_err(decode)?),
        actor_id: SubjectId::new(row.try_get::<String, _>("admin_id").map_err(decode)?),
        actor_email: row.try_get("admin_email").map_err(decode)?,
        action,
        target_type: row.try_get("target_type").map_err(decode)?,
        target_id: row.try_get("target_id").map_err(decode)?,
        before_value: row.try_get("old_values").map_err(decode)?,
        after_value: row.try_get("new_values").map_err(decode)?,
        reason: row.try_get("reason").map_err(decode)?,
        request_metadata: RequestMetadata {
            ip_address: row.try_get("ip_address").map_err(decode)?,
            user_agent: row.try_get("user_agent").map_err(decode)?,
        },
        created_at: row.try_get("created_at").map_err(decode)?,
    })
}

// Optional filters use `$n IS NULL OR ...` so a single parameterized query
// covers every combination.
const FILTER_CLAUSE: &str = r#"
    WHERE ($1::text IS NULL OR admin_id = $1)
      AND ($2::text IS NULL OR action = $2)
      AND ($3::text IS NULL OR target_type = $3)
      AND ($4::text IS NULL OR target_id = $4)
      AND ($5::timestamptz IS NULL OR created_at >= $5)
      AND ($6::timestamptz IS NULL OR created_at <= $6)
"#;

struct FilterParams {
    actor_id: Option<String>,
    action: Option<&'static str>,
    target_type: Option<String>,
    target_id: Option<String>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
}

impl From<AuditFilter> for FilterParams {
    fn from(f: AuditFilter) -> Self {
        Self {
            actor_id: f.actor_id.map(|a| a.as_str().to_string()),
            action: f.action.map(|a| a.as_str()),
            target_type: f.target_type,
            target_id: f.target_id,
            start: f.start,
            end: f.end,
        }
    }
}

#[async_trait::async_trait]
impl AuditStore for PostgresAuditStore {
    #[instrument(skip(self, entry), fields(action = %entry.action, actor_id = %entry.actor_id), err)]
    async fn append(&self, entry: NewAuditEntry) -> Result<AuditEntry, AuditStoreError> {
        let id = AuditEntryId::new();

        let row = sqlx::query(
            r#"
            INSERT INTO admin_audit_log (
                id, admin_id, admin_email, action, target_type, target_id,
                old_values, new_values, reason, ip_address, user_agent
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING created_at
            "#,
        )
        .bind(id.as_uuid())
        .bind(entry.actor_id.as_str())
        .bind(entry.actor_email.as_deref())
        .bind(entry.action.as_str())
        .bind(entry.target_type.as_deref())
        .bind(entry.target_id.as_deref())
        .bind(entry.before_value.clone())
        .bind(entry.after_value.clone())
        .bind(entry.reason.as_deref())
        .bind(entry.request_metadata.ip_address.as_deref())
        .bind(entry.request_metadata.user_agent.as_deref())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("append_audit", e))?;

        let created_at: DateTime<Utc> = row
            .try_get("created_at")
            .map_err(|e| map_sqlx_error("append_audit", e))?;

        Ok(entry.into_entry(id, created_at))
    }

    #[instrument(skip(self), err)]
    async fn query(
        &self,
        filter: AuditFilter,
        pagination: Pagination,
    ) -> Result<AuditPage, AuditStoreError> {
        let p = FilterParams::from(filter);

        let count_sql = format!("SELECT COUNT(*) AS total FROM admin_audit_log {FILTER_CLAUSE}");
        let count_row = sqlx::query(&count_sql)
            .bind(p.actor_id.as_deref())
            .bind(p.action)
            .bind(p.target_type.as_deref())
            .bind(p.target_id.as_deref())
            .bind(p.start)
            .bind(p.end)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_audit", e))?;
        let total: i64 = count_row
            .try_get("total")
            .map_err(|e| map_sqlx_error("count_audit", e))?;

        let page_sql = format!(
            r#"
            SELECT id, admin_id, admin_email, action, target_type, target_id,
                   old_values, new_values, reason, ip_address, user_agent, created_at
            FROM admin_audit_log
            {FILTER_CLAUSE}
            ORDER BY created_at DESC, id DESC
            LIMIT $7 OFFSET $8
            "#
        );
        let rows = sqlx::query(&page_sql)
            .bind(p.actor_id.as_deref())
            .bind(p.action)
            .bind(p.target_type.as_deref())
            .bind(p.target_id.as_deref())
            .bind(p.start)
            .bind(p.end)
            .bind(i64::from(pagination.limit))
            .bind(i64::from(pagination.offset))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("query_audit", e))?;

        let entries = rows
            .iter()
            .map(entry_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        let has_more = total > i64::from(pagination.offset) + i64::from(pagination.limit);

        Ok(AuditPage {
            entries,
            total: total as u64,
            pagination,
            has_more,
        })
    }

    #[instrument(skip(self), err)]
    async fn stats(&self, query: StatsQuery<'_>) -> Result<AuditStats, AuditStoreError> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total_actions,
                COUNT(DISTINCT admin_id) AS distinct_actors,
                COUNT(*) FILTER (WHERE action LIKE '%ban%' OR action LIKE '%delete%') AS destructive_actions,
                COUNT(*) FILTER (WHERE created_at >= NOW() - INTERVAL '1 day' * $1) AS recent_actions
            FROM admin_audit_log
            WHERE ($2::text IS NULL OR admin_id = $2)
            "#,
        )
        .bind(i32::try_from(query.window_days).unwrap_or(i32::MAX))
        .bind(query.actor_id.map(|a| a.as_str()))
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("audit_stats", e))?;

        let count = |name: &str| -> Result<u64, AuditStoreError> {
            let n: i64 = row.try_get(name).map_err(|e| map_sqlx_error("audit_stats", e))?;
            Ok(n.max(0) as u64)
        };

        Ok(AuditStats {
            total_actions: count("total_actions")?,
            distinct_actors: count("distinct_actors")?,
            destructive_actions: count("destructive_actions")?,
            recent_actions: count("recent_actions")?,
            window_days: query.window_days,
        })
    }
}
