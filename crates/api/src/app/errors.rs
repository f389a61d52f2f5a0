//! Error → HTTP mapping.
//!
//! Every body is `{"error": CODE, "message": text}`. Store failures are
//! logged here and surface as a bare code; internal error text never
//! reaches the caller.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use backoffice_auth::AuthzError;
use backoffice_core::DomainError;
use backoffice_infra::accounts::AccountStoreError;
use backoffice_infra::audit::AuditStoreError;
use backoffice_infra::invites::InviteError;
use backoffice_infra::registry::RegistryError;

pub const DB_ERROR: &str = "DB_ERROR";
pub const TIMEOUT: &str = "TIMEOUT";

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn authz_error_response(err: &AuthzError) -> axum::response::Response {
    let status = StatusCode::from_u16(err.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut body = json!({
        "error": err.code(),
        "message": err.to_string(),
    });
    if let (Some(details), Some(obj)) = (err.details(), body.as_object_mut()) {
        obj.insert("required".to_string(), json!(details.required));
        obj.insert("userRoles".to_string(), json!(details.user_roles));
    }

    (status, axum::Json(body)).into_response()
}

pub fn validation_error(err: DomainError) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", err.to_string())
}

fn unavailable(what: &'static str, detail: &dyn std::fmt::Display) -> axum::response::Response {
    tracing::error!(error = %detail, "{what} failure");
    json_error(StatusCode::INTERNAL_SERVER_ERROR, DB_ERROR, "datastore unavailable")
}

pub fn timeout_response(what: &'static str) -> axum::response::Response {
    tracing::error!("{what} call timed out");
    json_error(StatusCode::INTERNAL_SERVER_ERROR, TIMEOUT, "datastore timed out")
}

pub fn registry_error_response(err: RegistryError) -> axum::response::Response {
    match err {
        RegistryError::NotFound(_) => json_error(StatusCode::NOT_FOUND, "NOT_FOUND", "no admin record for user"),
        RegistryError::PreconditionFailed(_) => {
            authz_error_response(&AuthzError::Unsafe(backoffice_auth::SafetyViolation::SelfDemotion))
        }
        RegistryError::Unavailable(detail) => unavailable("registry", &detail),
    }
}

pub fn account_error_response(err: AccountStoreError) -> axum::response::Response {
    match err {
        AccountStoreError::NotFound(_) => json_error(StatusCode::NOT_FOUND, "NOT_FOUND", "user not found"),
        AccountStoreError::Unavailable(detail) => unavailable("account store", &detail),
    }
}

pub fn invite_error_response(err: InviteError) -> axum::response::Response {
    match err {
        InviteError::NotFound => json_error(StatusCode::NOT_FOUND, "INVITE_NOT_FOUND", "invite not found"),
        InviteError::AlreadyUsed => {
            json_error(StatusCode::CONFLICT, "INVITE_ALREADY_USED", "invite already used")
        }
        InviteError::Expired => json_error(StatusCode::GONE, "INVITE_EXPIRED", "invite expired"),
        InviteError::Duplicate => json_error(StatusCode::CONFLICT, "INVITE_CONFLICT", "invite code already exists"),
        InviteError::Unavailable(detail) => unavailable("invite store", &detail),
    }
}

pub fn audit_error_response(err: AuditStoreError) -> axum::response::Response {
    match err {
        AuditStoreError::Timeout => timeout_response("audit store"),
        other => unavailable("audit store", &other),
    }
}
