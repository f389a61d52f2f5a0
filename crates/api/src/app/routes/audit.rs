use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
};

use backoffice_auth::capability;
use backoffice_core::SubjectId;
use backoffice_infra::audit::{DEFAULT_STATS_WINDOW_DAYS, StatsQuery};

use crate::app::dto::{AuditLogQuery, AuditStatsQuery, parse_subject};
use crate::app::routes::common::require;
use crate::app::{errors, services::AppServices};
use crate::context::AdminContext;

/// Longest trailing window the stats endpoint will compute.
const MAX_STATS_WINDOW_DAYS: u32 = 365;

/// GET /admin/audit-logs - filtered, paginated, newest first
pub async fn list_audit_logs(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AdminContext>,
    Query(query): Query<AuditLogQuery>,
) -> axum::response::Response {
    if let Err(resp) = require(&ctx, &capability::AUDIT_READ) {
        return resp;
    }

    let (filter, pagination) = match query.into_parts() {
        Ok(parts) => parts,
        Err(e) => return errors::validation_error(e),
    };

    match services.audit.query(filter, pagination).await {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(e) => errors::audit_error_response(e),
    }
}

/// GET /admin/audit-logs/stats - dashboard counters
pub async fn audit_stats(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AdminContext>,
    Query(query): Query<AuditStatsQuery>,
) -> axum::response::Response {
    if let Err(resp) = require(&ctx, &capability::AUDIT_READ) {
        return resp;
    }

    let actor: Option<SubjectId> = match query.actor_id.as_deref().map(parse_subject).transpose() {
        Ok(a) => a,
        Err(e) => return errors::validation_error(e),
    };
    let window_days = query
        .days
        .unwrap_or(DEFAULT_STATS_WINDOW_DAYS)
        .clamp(1, MAX_STATS_WINDOW_DAYS);

    let stats_query = StatsQuery {
        window_days,
        actor_id: actor.as_ref(),
    };
    match services.audit.stats(stats_query).await {
        Ok(stats) => (StatusCode::OK, Json(stats)).into_response(),
        Err(e) => errors::audit_error_response(e),
    }
}
