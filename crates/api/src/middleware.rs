use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, State},
    middleware::Next,
    response::Response,
};

use crate::app::errors;
use crate::authz::{self, AuthState};
use crate::context::{AdminContext, VerifiedSubject, request_metadata};

type Request = axum::http::Request<axum::body::Body>;

fn peer(req: &Request) -> Option<SocketAddr> {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

/// Full admin guard. On success the handler finds an [`AdminContext`] in
/// the request extensions.
pub async fn admin_auth_middleware(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Response {
    let identity = match authz::authorize(req.headers(), &state).await {
        Ok(identity) => identity,
        Err(e) => {
            tracing::warn!(
                code = e.code(),
                method = %req.method(),
                path = %req.uri().path(),
                "admin request denied"
            );
            return errors::authz_error_response(&e);
        }
    };

    let metadata = request_metadata(req.headers(), peer(&req));
    req.extensions_mut().insert(AdminContext::new(identity, metadata));

    next.run(req).await
}

/// Token verification only; no registry lookup. Used where the caller is
/// about to become an admin.
pub async fn token_auth_middleware(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Response {
    let verified = match authz::verify_bearer(req.headers(), &state).await {
        Ok(verified) => verified,
        Err(e) => {
            tracing::warn!(code = e.code(), path = %req.uri().path(), "token rejected");
            return errors::authz_error_response(&e);
        }
    };

    let metadata = request_metadata(req.headers(), peer(&req));
    req.extensions_mut().insert(VerifiedSubject::new(verified, metadata));

    next.run(req).await
}
