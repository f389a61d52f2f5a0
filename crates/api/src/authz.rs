//! Authorization guard.
//!
//! Plain sequential composition: each step returns a `Result` and the first
//! failure short-circuits the rest. A banned caller never reaches the role
//! check, an unverified one never reaches the registry.

use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderMap;

use backoffice_auth::{AuthzError, Identity, TokenError, TokenVerifier, VerifiedToken, admit};
use backoffice_infra::{IdentityResolver, ResolveError};

/// Everything the guard needs, built once at startup and shared.
#[derive(Clone)]
pub struct AuthState {
    pub verifier: Arc<dyn TokenVerifier>,
    pub resolver: IdentityResolver,
    /// Bound on the identity-provider call. The resolver carries its own.
    pub timeout: Duration,
}

impl AuthState {
    pub fn new(verifier: Arc<dyn TokenVerifier>, resolver: IdentityResolver, timeout: Duration) -> Self {
        Self {
            verifier,
            resolver,
            timeout,
        }
    }
}

/// Step 1. Anything other than `Authorization: Bearer <non-empty>` counts as
/// no credential at all.
pub fn extract_bearer(headers: &HeaderMap) -> Result<&str, AuthzError> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(AuthzError::NoCredential)?;

    let header = header.to_str().map_err(|_| AuthzError::NoCredential)?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or(AuthzError::NoCredential)?
        .trim();

    if token.is_empty() {
        return Err(AuthzError::NoCredential);
    }

    Ok(token)
}

/// Steps 1-2. Re-verified on every request; nothing is cached.
pub async fn verify_bearer(headers: &HeaderMap, state: &AuthState) -> Result<VerifiedToken, AuthzError> {
    let token = extract_bearer(headers)?;

    match tokio::time::timeout(state.timeout, state.verifier.verify(token)).await {
        Ok(Ok(verified)) => Ok(verified),
        Ok(Err(TokenError::Expired | TokenError::Invalid(_))) => Err(AuthzError::InvalidCredential),
        Ok(Err(TokenError::Unavailable(reason))) => {
            tracing::error!(%reason, "identity provider unavailable");
            Err(AuthzError::provider_failed())
        }
        Err(_) => {
            tracing::error!(
                timeout_ms = state.timeout.as_millis() as u64,
                "identity provider timed out"
            );
            Err(AuthzError::provider_failed())
        }
    }
}

/// The full guard: verify, resolve, then admit (ban check before role check).
pub async fn authorize(headers: &HeaderMap, state: &AuthState) -> Result<Identity, AuthzError> {
    let verified = verify_bearer(headers, state).await?;

    let identity = state
        .resolver
        .resolve(&verified.subject_id, verified.email.as_deref())
        .await
        .map_err(|e| match e {
            ResolveError::NotFound => AuthzError::NotAnAdmin,
            ResolveError::ResolutionFailed(reason) => {
                tracing::error!(subject_id = %verified.subject_id, %reason, "identity resolution failed");
                AuthzError::resolution_failed()
            }
        })?;

    admit(identity)
}
