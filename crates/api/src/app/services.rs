use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use backoffice_auth::MasterList;
use backoffice_infra::{
    IdentityResolver,
    accounts::{AccountStore, InMemoryAccountStore, PostgresAccountStore},
    audit::{AuditRecorder, AuditStore, InMemoryAuditStore, PostgresAuditStore},
    config::AppConfig,
    db,
    invites::{InMemoryInviteStore, InviteStore, PostgresInviteStore},
    registry::{AdminRegistry, InMemoryAdminRegistry, PostgresAdminRegistry},
};

/// Shared handles for handlers.
///
/// The registry and the main-store handles are distinct and constructed from
/// distinct settings; nothing here hands a main-store pool to the registry.
#[derive(Clone)]
pub struct AppServices {
    pub registry: Arc<dyn AdminRegistry>,
    pub accounts: Arc<dyn AccountStore>,
    pub invites: Arc<dyn InviteStore>,
    pub audit: AuditRecorder,
    pub masters: Arc<MasterList>,
    pub invite_ttl: Option<chrono::Duration>,
    /// Bound on every datastore call made by a handler.
    pub timeout: Duration,
}

impl AppServices {
    /// Everything in memory (dev and tests).
    pub fn in_memory(masters: MasterList, timeout: Duration) -> Self {
        Self {
            registry: Arc::new(InMemoryAdminRegistry::new()),
            accounts: Arc::new(InMemoryAccountStore::new()),
            invites: Arc::new(InMemoryInviteStore::new()),
            audit: AuditRecorder::new(Arc::new(InMemoryAuditStore::new()), timeout),
            masters: Arc::new(masters),
            invite_ttl: None,
            timeout,
        }
    }

    /// Wire stores from configuration. Each datastore falls back to memory
    /// when its URL is unset.
    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let timeout = config.external_call_timeout;

        let registry: Arc<dyn AdminRegistry> = match &config.registry_database_url {
            Some(url) => {
                let pool = db::connect(url, timeout)
                    .await
                    .context("failed to connect to admin registry database")?;
                db::ensure_registry_schema(&pool)
                    .await
                    .context("failed to prepare admin registry schema")?;
                Arc::new(PostgresAdminRegistry::new(pool))
            }
            None => {
                tracing::warn!("ADMIN_REGISTRY_DATABASE_URL not set; admin registry is in-memory");
                Arc::new(InMemoryAdminRegistry::new())
            }
        };

        let (accounts, invites, audit_store): (
            Arc<dyn AccountStore>,
            Arc<dyn InviteStore>,
            Arc<dyn AuditStore>,
        ) = match &config.database_url {
            Some(url) => {
                let pool = db::connect(url, timeout)
                    .await
                    .context("failed to connect to main database")?;
                db::ensure_main_schema(&pool)
                    .await
                    .context("failed to prepare main schema")?;
                (
                    Arc::new(PostgresAccountStore::new(pool.clone())),
                    Arc::new(PostgresInviteStore::new(pool.clone())),
                    Arc::new(PostgresAuditStore::new(pool)),
                )
            }
            None => {
                tracing::warn!("DATABASE_URL not set; accounts, invites and audit log are in-memory");
                (
                    Arc::new(InMemoryAccountStore::new()),
                    Arc::new(InMemoryInviteStore::new()),
                    Arc::new(InMemoryAuditStore::new()),
                )
            }
        };

        tracing::info!(masters = config.masters.len(), "master accounts loaded");

        Ok(Self {
            registry,
            accounts,
            invites,
            audit: AuditRecorder::new(audit_store, timeout),
            masters: Arc::new(config.masters.clone()),
            invite_ttl: config.invite_ttl,
            timeout,
        })
    }

    /// Resolver sharing this instance's registry and master list.
    pub fn resolver(&self) -> IdentityResolver {
        IdentityResolver::new(Arc::clone(&self.masters), Arc::clone(&self.registry), self.timeout)
    }

    /// Run a datastore call under the handler timeout.
    pub async fn bounded<T, E, F>(&self, fut: F) -> Result<Result<T, E>, tokio::time::error::Elapsed>
    where
        F: Future<Output = Result<T, E>>,
    {
        tokio::time::timeout(self.timeout, fut).await
    }
}
