//! Privileged user mutations: role changes, bans, deletion.
//!
//! Order in every handler: capability, safety rules, mutation, audit. The
//! registry write goes first since it decides access; the account store
//! follows. The audit write is dispatched once something has committed and
//! is never awaited.

use std::sync::Arc;

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use serde_json::{Value, json};

use backoffice_auth::{
    AuthzError, RoleChange, SafetyTarget, SafetyViolation, capability, check_ban, check_deletion,
    check_role_change,
};
use backoffice_core::SubjectId;
use backoffice_infra::accounts::Account;
use backoffice_infra::audit::AuditAction;
use backoffice_infra::registry::{AdminRecord, AdminRecordPatch, RegistryError, RemovalGuard};

use crate::app::dto::{RoleChangeRequest, UserAction, UserActionRequest, parse_admin_role, parse_subject};
use crate::app::routes::common::require;
use crate::app::{errors, services::AppServices};
use crate::context::AdminContext;

fn unsafe_response(violation: SafetyViolation) -> axum::response::Response {
    errors::authz_error_response(&AuthzError::Unsafe(violation))
}

/// Registry record and account row of a mutation target; either may be absent.
struct LoadedTarget {
    record: Option<AdminRecord>,
    account: Option<Account>,
}

impl LoadedTarget {
    fn roles(&self) -> std::collections::BTreeSet<backoffice_auth::Role> {
        self.record.as_ref().map(|r| r.roles.clone()).unwrap_or_default()
    }

    fn email(&self) -> Option<&str> {
        self.account
            .as_ref()
            .and_then(|a| a.email.as_deref())
            .or_else(|| self.record.as_ref().and_then(|r| r.email.as_deref()))
    }

    fn exists(&self) -> bool {
        self.record.is_some() || self.account.is_some()
    }
}

async fn load_target(
    services: &AppServices,
    target: &SubjectId,
) -> Result<LoadedTarget, axum::response::Response> {
    let record = match services.bounded(services.registry.get(target)).await {
        Ok(Ok(record)) => record,
        Ok(Err(e)) => return Err(errors::registry_error_response(e)),
        Err(_) => return Err(errors::timeout_response("registry")),
    };
    let account = match services.bounded(services.accounts.get(target)).await {
        Ok(Ok(account)) => account,
        Ok(Err(e)) => return Err(errors::account_error_response(e)),
        Err(_) => return Err(errors::timeout_response("account store")),
    };
    Ok(LoadedTarget { record, account })
}

/// PUT /admin/users/roles - grant or revoke an administrative role
pub async fn change_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AdminContext>,
    Json(body): Json<RoleChangeRequest>,
) -> axum::response::Response {
    if let Err(resp) = require(&ctx, &capability::USERS_UPDATE) {
        return resp;
    }

    let target = match parse_subject(&body.user_id) {
        Ok(t) => t,
        Err(e) => return errors::validation_error(e),
    };
    let role = match parse_admin_role(&body.role) {
        Ok(r) => r,
        Err(e) => return errors::validation_error(e),
    };

    let loaded = match load_target(&services, &target).await {
        Ok(loaded) => loaded,
        Err(resp) => return resp,
    };
    let before_roles = loaded.roles();

    let safety_target = SafetyTarget::new(&target, &before_roles).with_email(loaded.email());
    if let Err(v) = check_role_change(ctx.identity(), &services.masters, safety_target, &role, body.action) {
        tracing::warn!(
            actor = %ctx.subject_id(),
            target = %target,
            role = %role,
            code = v.code(),
            "role change refused"
        );
        return unsafe_response(v);
    }

    let (result, action) = match body.action {
        RoleChange::Grant => (
            services.bounded(services.registry.add_role(&target, &role)).await,
            AuditAction::UserRoleGranted,
        ),
        RoleChange::Revoke => {
            // The pre-check read may be stale; the datastore re-checks the
            // self-demotion rule in the same write.
            let guard = if ctx.subject_id() == &target {
                RemovalGuard::KeepAdminRole
            } else {
                RemovalGuard::Unconditional
            };
            (
                services
                    .bounded(services.registry.remove_role(&target, &role, guard))
                    .await,
                AuditAction::UserRoleRevoked,
            )
        }
    };

    let after_roles = match result {
        Ok(Ok(roles)) => roles,
        Ok(Err(RegistryError::PreconditionFailed(_))) => {
            return unsafe_response(SafetyViolation::SelfDemotion);
        }
        Ok(Err(e)) => return errors::registry_error_response(e),
        Err(_) => return errors::timeout_response("registry"),
    };

    tracing::info!(
        actor = %ctx.subject_id(),
        target = %target,
        role = %role,
        action = %action,
        "role changed"
    );

    services.audit.record(
        ctx.audit(action)
            .target("user", target.as_str())
            .before(json!({ "roles": before_roles }))
            .after(json!({ "roles": after_roles }))
            .reason(body.reason),
    );

    (
        StatusCode::OK,
        Json(json!({
            "user_id": target,
            "roles": after_roles,
        })),
    )
        .into_response()
}

/// POST /admin/users/actions - ban, unban or delete an account
///
/// The target may have an account row, a registry record, or both. Admins
/// onboarded by invite only have the latter.
pub async fn user_action(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AdminContext>,
    Json(body): Json<UserActionRequest>,
) -> axum::response::Response {
    let required = match body.action {
        UserAction::Ban | UserAction::Unban => &capability::USERS_BAN,
        UserAction::Delete => &capability::USERS_DELETE,
    };
    if let Err(resp) = require(&ctx, required) {
        return resp;
    }

    let target = match parse_subject(&body.user_id) {
        Ok(t) => t,
        Err(e) => return errors::validation_error(e),
    };

    let loaded = match load_target(&services, &target).await {
        Ok(loaded) => loaded,
        Err(resp) => return resp,
    };

    let target_roles = loaded.roles();
    let safety_target = SafetyTarget::new(&target, &target_roles).with_email(loaded.email());
    let safety = match body.action {
        UserAction::Ban | UserAction::Unban => check_ban(ctx.identity(), &services.masters, safety_target),
        UserAction::Delete => check_deletion(ctx.identity(), &services.masters, safety_target),
    };
    if let Err(v) = safety {
        tracing::warn!(actor = %ctx.subject_id(), target = %target, code = v.code(), "user action refused");
        return unsafe_response(v);
    }

    if !loaded.exists() {
        return errors::json_error(StatusCode::NOT_FOUND, "NOT_FOUND", "user not found");
    }

    match body.action {
        UserAction::Ban | UserAction::Unban => {
            let banned = body.action == UserAction::Ban;
            ban_or_unban(&services, &ctx, target, loaded, banned, body.reason).await
        }
        UserAction::Delete => delete_user(&services, &ctx, target, loaded, body.reason).await,
    }
}

/// The registry step committed but the account step did not. Record what did
/// change before surfacing the failure.
fn record_partial(
    services: &AppServices,
    ctx: &AdminContext,
    action: AuditAction,
    target: &SubjectId,
    before: Value,
    after: Value,
    reason: Option<String>,
) {
    tracing::error!(
        actor = %ctx.subject_id(),
        target = %target,
        action = %action,
        "account store write failed after registry write"
    );
    services.audit.record(
        ctx.audit(action)
            .target("user", target.as_str())
            .before(before)
            .after(after)
            .reason(reason),
    );
}

async fn ban_or_unban(
    services: &AppServices,
    ctx: &AdminContext,
    target: SubjectId,
    loaded: LoadedTarget,
    banned: bool,
    reason: Option<String>,
) -> axum::response::Response {
    let action = if banned {
        AuditAction::UserBanned
    } else {
        AuditAction::UserUnbanned
    };
    let before = json!({
        "banned_at": loaded.account.as_ref().and_then(|a| a.banned_at),
        "registry_banned": loaded.record.as_ref().map(|r| r.banned),
    });

    // Lockout first, so a banned admin loses access even if the account
    // store is down.
    let registry_banned = match loaded.record {
        Some(_) => match services.bounded(services.registry.set_banned(&target, banned)).await {
            Ok(Ok(_)) => Some(banned),
            Ok(Err(e)) => return errors::registry_error_response(e),
            Err(_) => return errors::timeout_response("registry"),
        },
        None => None,
    };

    let banned_at = match loaded.account {
        Some(_) => match services
            .bounded(services.accounts.set_banned(&target, banned, Utc::now()))
            .await
        {
            Ok(Ok(account)) => account.banned_at,
            Ok(Err(e)) => {
                if registry_banned.is_some() {
                    let after = json!({ "registry_banned": registry_banned, "account_updated": false });
                    record_partial(services, ctx, action, &target, before, after, reason);
                }
                return errors::account_error_response(e);
            }
            Err(_) => {
                if registry_banned.is_some() {
                    let after = json!({ "registry_banned": registry_banned, "account_updated": false });
                    record_partial(services, ctx, action, &target, before, after, reason);
                }
                return errors::timeout_response("account store");
            }
        },
        None => None,
    };

    tracing::info!(actor = %ctx.subject_id(), target = %target, action = %action, "user ban state changed");

    services.audit.record(
        ctx.audit(action)
            .target("user", target.as_str())
            .before(before)
            .after(json!({ "banned_at": banned_at, "registry_banned": registry_banned }))
            .reason(reason),
    );

    (
        StatusCode::OK,
        Json(json!({
            "user_id": target,
            "banned": banned,
            "banned_at": banned_at,
        })),
    )
        .into_response()
}

async fn delete_user(
    services: &AppServices,
    ctx: &AdminContext,
    target: SubjectId,
    loaded: LoadedTarget,
    reason: Option<String>,
) -> axum::response::Response {
    let before = json!({
        "account": loaded.account,
        "registry_active": loaded.record.as_ref().map(|r| r.active),
    });

    // A deleted user keeps no administrative access. Revoke that first.
    let registry_active = match loaded.record {
        Some(_) => {
            let patch = AdminRecordPatch {
                active: Some(false),
                ..Default::default()
            };
            match services.bounded(services.registry.upsert_merge(&target, patch)).await {
                Ok(Ok(record)) => Some(record.active),
                Ok(Err(e)) => return errors::registry_error_response(e),
                Err(_) => return errors::timeout_response("registry"),
            }
        }
        None => None,
    };

    let account_deleted = match loaded.account {
        Some(_) => match services.bounded(services.accounts.delete(&target)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                if registry_active.is_some() {
                    let after = json!({ "registry_active": registry_active, "account_deleted": false });
                    record_partial(services, ctx, AuditAction::UserDeleted, &target, before, after, reason);
                }
                return errors::account_error_response(e);
            }
            Err(_) => {
                if registry_active.is_some() {
                    let after = json!({ "registry_active": registry_active, "account_deleted": false });
                    record_partial(services, ctx, AuditAction::UserDeleted, &target, before, after, reason);
                }
                return errors::timeout_response("account store");
            }
        },
        None => false,
    };

    tracing::info!(actor = %ctx.subject_id(), target = %target, "user deleted");

    services.audit.record(
        ctx.audit(AuditAction::UserDeleted)
            .target("user", target.as_str())
            .before(before)
            .after(json!({ "registry_active": registry_active, "account_deleted": account_deleted }))
            .reason(reason),
    );

    (
        StatusCode::OK,
        Json(json!({ "user_id": target, "deleted": true })),
    )
        .into_response()
}
