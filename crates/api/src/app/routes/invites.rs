use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;

use backoffice_auth::{AuthzError, Identity, IdentitySource, Role, SafetyViolation, capability};
use backoffice_infra::audit::{AuditAction, NewAuditEntry};
use backoffice_infra::invites::{InviteCode, InviteError, NewInvite};
use backoffice_infra::registry::AdminRecordPatch;

use crate::app::dto::{CreateInviteRequest, RedeemInviteRequest, parse_admin_role};
use crate::app::routes::common::require;
use crate::app::{errors, services::AppServices};
use crate::context::{AdminContext, VerifiedSubject};

const CREATE_ATTEMPTS: usize = 3;

/// GET /admin/invites - all invites, newest first
pub async fn list_invites(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AdminContext>,
) -> axum::response::Response {
    if let Err(resp) = require(&ctx, &capability::INVITES_READ) {
        return resp;
    }

    match services.bounded(services.invites.list()).await {
        Ok(Ok(invites)) => (StatusCode::OK, Json(json!({ "invites": invites }))).into_response(),
        Ok(Err(e)) => errors::invite_error_response(e),
        Err(_) => errors::timeout_response("invite store"),
    }
}

/// POST /admin/invites - mint a single-use code for a role
pub async fn create_invite(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AdminContext>,
    body: Option<Json<CreateInviteRequest>>,
) -> axum::response::Response {
    if let Err(resp) = require(&ctx, &capability::INVITES_CREATE) {
        return resp;
    }
    let body = body.map(|Json(b)| b).unwrap_or_default();

    let role = match body.role.as_deref() {
        Some(raw) => match parse_admin_role(raw) {
            Ok(r) => r,
            Err(e) => return errors::validation_error(e),
        },
        None => Role::GLOBAL_ADMIN,
    };
    if role.is_super_admin() && !ctx.is_super_admin() {
        return errors::authz_error_response(&AuthzError::Unsafe(SafetyViolation::SuperAdminRequired));
    }

    let expires_at = body
        .expires_in_hours
        .map(|h| chrono::Duration::hours(i64::from(h)))
        .or(services.invite_ttl)
        .map(|ttl| Utc::now() + ttl);

    // Codes are short; a collision is possible but rare, so retry a few times.
    let mut last_err = InviteError::Duplicate;
    for _ in 0..CREATE_ATTEMPTS {
        let new_invite = NewInvite {
            code: InviteCode::generate(),
            role: role.clone(),
            created_by: ctx.subject_id().clone(),
            expires_at,
        };

        match services.bounded(services.invites.create(new_invite)).await {
            Ok(Ok(invite)) => {
                tracing::info!(actor = %ctx.subject_id(), code = %invite.code, role = %invite.role, "invite created");
                services.audit.record(
                    ctx.audit(AuditAction::InviteCreated)
                        .target("invite", invite.code.as_str())
                        .after(json!({
                            "code": invite.code,
                            "role": invite.role,
                            "expires_at": invite.expires_at,
                        })),
                );
                return (StatusCode::CREATED, Json(json!({ "invite": invite }))).into_response();
            }
            Ok(Err(InviteError::Duplicate)) => continue,
            Ok(Err(e)) => {
                last_err = e;
                break;
            }
            Err(_) => return errors::timeout_response("invite store"),
        }
    }

    errors::invite_error_response(last_err)
}

/// DELETE /admin/invites/:code
pub async fn delete_invite(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AdminContext>,
    Path(code): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = require(&ctx, &capability::INVITES_DELETE) {
        return resp;
    }
    let code: InviteCode = match code.parse() {
        Ok(c) => c,
        Err(e) => return errors::validation_error(e),
    };

    let deleted = match services.bounded(services.invites.delete(&code)).await {
        Ok(Ok(invite)) => invite,
        Ok(Err(e)) => return errors::invite_error_response(e),
        Err(_) => return errors::timeout_response("invite store"),
    };

    services.audit.record(
        ctx.audit(AuditAction::InviteDeleted)
            .target("invite", code.as_str())
            .before(json!({
                "code": deleted.code,
                "role": deleted.role,
                "used": deleted.used,
            })),
    );

    (StatusCode::OK, Json(json!({ "deleted": code }))).into_response()
}

/// POST /admin/invites/redeem - consume a code and become an admin
///
/// Requires a verified token only. The invite is consumed first with an
/// atomic check-and-set; only the winner goes on to touch the registry.
pub async fn redeem_invite(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<VerifiedSubject>,
    Json(body): Json<RedeemInviteRequest>,
) -> axum::response::Response {
    let code: InviteCode = match body.code.parse() {
        Ok(c) => c,
        Err(e) => return errors::validation_error(e),
    };

    let invite = match services
        .bounded(services.invites.redeem(&code, caller.subject_id(), Utc::now()))
        .await
    {
        Ok(Ok(invite)) => invite,
        Ok(Err(e)) => {
            tracing::warn!(subject_id = %caller.subject_id(), code = %code, error = %e, "invite redemption refused");
            return errors::invite_error_response(e);
        }
        Err(_) => return errors::timeout_response("invite store"),
    };

    let patch = AdminRecordPatch {
        email: caller.email().map(str::to_string),
        display_name: body.display_name.filter(|n| !n.trim().is_empty()),
        add_roles: [invite.role.clone()].into(),
        active: Some(true),
        created_by: Some(invite.created_by.to_string()),
    };
    let record = match services
        .bounded(services.registry.upsert_merge(caller.subject_id(), patch))
        .await
    {
        Ok(Ok(record)) => record,
        Ok(Err(e)) => {
            tracing::error!(subject_id = %caller.subject_id(), code = %code, "invite consumed but registry write failed");
            return errors::registry_error_response(e);
        }
        Err(_) => return errors::timeout_response("registry"),
    };

    tracing::info!(subject_id = %caller.subject_id(), role = %invite.role, "invite redeemed");

    // The redeemer is the actor of this entry.
    let actor = Identity {
        subject_id: record.subject_id.clone(),
        email: record.email.clone(),
        display_name: record.display_name.clone(),
        roles: record.roles.clone(),
        banned: record.banned,
        source: IdentitySource::Registry,
    };
    services.audit.record(
        NewAuditEntry::by(&actor, AuditAction::InviteRedeemed)
            .target("invite", code.as_str())
            .after(json!({ "role": invite.role, "roles": record.roles }))
            .metadata(caller.metadata().clone()),
    );

    (
        StatusCode::OK,
        Json(json!({
            "granted_role": invite.role,
            "roles": record.roles,
        })),
    )
        .into_response()
}
