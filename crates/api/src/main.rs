use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;

use backoffice_api::{app, authz::AuthState};
use backoffice_auth::Hs256TokenVerifier;
use backoffice_infra::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    backoffice_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    if config.jwt_secret_is_default {
        tracing::warn!("JWT_SECRET not set; APP_ENV is dev, using the insecure dev default");
    }

    let services = Arc::new(app::services::AppServices::from_config(&config).await?);

    let mut verifier = Hs256TokenVerifier::new(config.jwt_secret.as_bytes());
    if let Some(issuer) = &config.jwt_issuer {
        verifier = verifier.with_issuer(issuer);
    }
    let auth = AuthState::new(Arc::new(verifier), services.resolver(), config.external_call_timeout);

    let app = app::build_app(services, auth);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
