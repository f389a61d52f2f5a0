use axum::response::Response;

use backoffice_auth::Capability;

use crate::app::errors;
use crate::context::AdminContext;

/// Capability gate for a handler; the denial response carries `required`
/// and `userRoles`.
pub fn require(ctx: &AdminContext, capability: &Capability) -> Result<(), Response> {
    ctx.require(capability).map_err(|e| {
        tracing::warn!(
            subject_id = %ctx.subject_id(),
            required = %capability,
            "capability check failed"
        );
        errors::authz_error_response(&e)
    })
}
