//! Process configuration, read once from the environment at startup.

use std::net::SocketAddr;
use std::time::Duration;

use backoffice_auth::MasterList;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEV_JWT_SECRET: &str = "dev-secret";
pub const DEFAULT_EXTERNAL_CALL_TIMEOUT_MS: u64 = 5_000;

/// `APP_ENV` values that unlock development defaults.
const DEV_ENVIRONMENTS: &[&str] = &["dev", "development", "local"];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("{var} must be set (or APP_ENV=dev for local development)")]
    Missing { var: &'static str },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    /// True when `JWT_SECRET` was unset and the dev default is in use.
    /// Only possible with `APP_ENV=dev`.
    pub jwt_secret_is_default: bool,
    pub jwt_issuer: Option<String>,
    pub registry_database_url: Option<String>,
    pub database_url: Option<String>,
    pub external_call_timeout: Duration,
    pub invite_ttl: Option<chrono::Duration>,
    pub masters: MasterList,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let bind_addr = non_blank("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                var: "BIND_ADDR",
                reason: e.to_string(),
            })?;

        let dev = non_blank("APP_ENV")
            .is_some_and(|env| DEV_ENVIRONMENTS.iter().any(|d| env.eq_ignore_ascii_case(d)));

        let (jwt_secret, jwt_secret_is_default) = match non_blank("JWT_SECRET") {
            Some(secret) => (secret, false),
            None if dev => (DEV_JWT_SECRET.to_string(), true),
            None => return Err(ConfigError::Missing { var: "JWT_SECRET" }),
        };

        let timeout_ms = match non_blank("EXTERNAL_CALL_TIMEOUT_MS") {
            Some(raw) => parse_positive("EXTERNAL_CALL_TIMEOUT_MS", &raw)?,
            None => DEFAULT_EXTERNAL_CALL_TIMEOUT_MS,
        };

        let invite_ttl = non_blank("INVITE_TTL_HOURS")
            .map(|raw| parse_positive("INVITE_TTL_HOURS", &raw))
            .transpose()?
            .map(|hours| chrono::Duration::hours(hours as i64));

        Ok(Self {
            bind_addr,
            jwt_secret,
            jwt_secret_is_default,
            jwt_issuer: non_blank("JWT_ISSUER"),
            registry_database_url: non_blank("ADMIN_REGISTRY_DATABASE_URL"),
            database_url: non_blank("DATABASE_URL"),
            external_call_timeout: Duration::from_millis(timeout_ms),
            invite_ttl,
            masters: MasterList::from_lookup(&lookup),
        })
    }
}

fn parse_positive(var: &'static str, raw: &str) -> Result<u64, ConfigError> {
    match raw.parse::<u64>() {
        Ok(0) => Err(ConfigError::Invalid {
            var,
            reason: "must be greater than zero".to_string(),
        }),
        Ok(n) if n > i32::MAX as u64 => Err(ConfigError::Invalid {
            var,
            reason: "value too large".to_string(),
        }),
        Ok(n) => Ok(n),
        Err(e) => Err(ConfigError::Invalid {
            var,
            reason: e.to_string(),
        }),
    }
}
