//! Connection pools and idempotent schema bootstrap.
//!
//! The registry and the main data store are separate databases with separate
//! pools; nothing here ever joins across them.

use std::str::FromStr;
use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

const MAX_CONNECTIONS: u32 = 10;

/// Open a pool that fails fast when the database is unreachable.
///
/// The URL is never logged; it may carry credentials.
pub async fn connect(url: &str, acquire_timeout: Duration) -> Result<PgPool, sqlx::Error> {
    let options = PgConnectOptions::from_str(url)?;
    PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .acquire_timeout(acquire_timeout)
        .connect_with(options)
        .await
}

const REGISTRY_SCHEMA: &[&str] = &[r#"
    CREATE TABLE IF NOT EXISTS admin_registry (
        subject_id   TEXT PRIMARY KEY,
        email        TEXT,
        display_name TEXT,
        roles        TEXT[] NOT NULL DEFAULT '{}',
        active       BOOLEAN NOT NULL DEFAULT TRUE,
        banned       BOOLEAN NOT NULL DEFAULT FALSE,
        created_by   TEXT,
        created_at   TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at   TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#];

const MAIN_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS admin_audit_log (
        id          UUID PRIMARY KEY,
        admin_id    TEXT NOT NULL,
        admin_email TEXT,
        action      TEXT NOT NULL,
        target_type TEXT,
        target_id   TEXT,
        old_values  JSONB,
        new_values  JSONB,
        reason      TEXT,
        ip_address  TEXT,
        user_agent  TEXT,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS admin_audit_log_created_at ON admin_audit_log (created_at DESC)",
    "CREATE INDEX IF NOT EXISTS admin_audit_log_admin_id ON admin_audit_log (admin_id)",
    r#"
    CREATE TABLE IF NOT EXISTS admin_invites (
        code        TEXT PRIMARY KEY,
        role        TEXT NOT NULL,
        used        BOOLEAN NOT NULL DEFAULT FALSE,
        created_by  TEXT NOT NULL,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        used_by     TEXT,
        used_at     TIMESTAMPTZ,
        expires_at  TIMESTAMPTZ
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id         TEXT PRIMARY KEY,
        email      TEXT,
        username   TEXT,
        banned_at  TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
];

async fn apply(pool: &PgPool, statements: &[&str]) -> Result<(), sqlx::Error> {
    for statement in statements {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

pub async fn ensure_registry_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    apply(pool, REGISTRY_SCHEMA).await
}

/// Audit log, invites and the account columns the back office touches.
pub async fn ensure_main_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    apply(pool, MAIN_SCHEMA).await
}
