use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};

use crate::app::dto::MeResponse;
use crate::context::AdminContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// GET /admin/me - the identity resolved for this request
pub async fn me(Extension(ctx): Extension<AdminContext>) -> impl IntoResponse {
    Json(MeResponse::from(ctx.identity()))
}
