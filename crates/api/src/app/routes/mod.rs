use axum::{
    Router,
    routing::{delete, get, post, put},
};

pub mod audit;
pub mod common;
pub mod invites;
pub mod rbac;
pub mod system;
pub mod users;

/// Routes behind the full admin guard.
pub fn admin_router() -> Router {
    Router::new()
        .route("/admin/me", get(system::me))
        .route("/admin/users/roles", put(users::change_role))
        .route("/admin/users/actions", post(users::user_action))
        .route("/admin/invites", get(invites::list_invites).post(invites::create_invite))
        .route("/admin/invites/:code", delete(invites::delete_invite))
        .route("/admin/audit-logs", get(audit::list_audit_logs))
        .route("/admin/audit-logs/stats", get(audit::audit_stats))
        .route("/admin/rbac/roles", get(rbac::list_roles))
        .route("/admin/rbac/check", get(rbac::check_capability))
}

/// Routes that need a verified token but not an admin identity.
pub fn token_router() -> Router {
    Router::new().route("/admin/invites/redeem", post(invites::redeem_invite))
}
