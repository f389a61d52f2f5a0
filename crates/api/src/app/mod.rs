//! HTTP application wiring (Axum router + service wiring).
//!
//! - `services.rs`: datastore handles shared by handlers
//! - `routes/`: handlers, one file per area
//! - `dto.rs`: request/response shapes
//! - `errors.rs`: consistent error bodies

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use crate::authz::AuthState;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (used by `main.rs` and the black-box tests).
pub fn build_app(services: Arc<services::AppServices>, auth: AuthState) -> Router {
    let admin = routes::admin_router().layer(axum::middleware::from_fn_with_state(
        auth.clone(),
        middleware::admin_auth_middleware,
    ));

    let token_only = routes::token_router().layer(axum::middleware::from_fn_with_state(
        auth,
        middleware::token_auth_middleware,
    ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(admin)
        .merge(token_only)
        .layer(ServiceBuilder::new().layer(Extension(services)))
}
