//! Read-only view of the role matrix, for debugging "why was I denied?".

use axum::{
    Json,
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

use backoffice_auth::{Capability, describe_matrix, has_capability};

use crate::app::dto::CapabilityCheckQuery;
use crate::context::AdminContext;

/// GET /admin/rbac/roles - every role and what it grants
pub async fn list_roles() -> axum::response::Response {
    (StatusCode::OK, Json(json!({ "roles": describe_matrix() }))).into_response()
}

/// GET /admin/rbac/check?capability=x - does the caller hold `x`?
pub async fn check_capability(
    Extension(ctx): Extension<AdminContext>,
    Query(query): Query<CapabilityCheckQuery>,
) -> axum::response::Response {
    let capability = Capability::new(query.capability.trim().to_string());
    let allowed = has_capability(ctx.identity().roles(), &capability);

    (
        StatusCode::OK,
        Json(json!({
            "capability": capability,
            "allowed": allowed,
            "roles": ctx.identity().roles(),
        })),
    )
        .into_response()
}
