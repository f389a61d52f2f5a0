use std::net::SocketAddr;

use axum::http::HeaderMap;

use backoffice_auth::{Capability, Identity, VerifiedToken};
use backoffice_core::SubjectId;
use backoffice_infra::audit::{AuditAction, NewAuditEntry, RequestMetadata};

/// Admin context for a request: the freshly resolved identity plus where the
/// request came from.
///
/// Present on every route behind the admin guard.
#[derive(Debug, Clone)]
pub struct AdminContext {
    identity: Identity,
    metadata: RequestMetadata,
}

impl AdminContext {
    pub fn new(identity: Identity, metadata: RequestMetadata) -> Self {
        Self { identity, metadata }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn subject_id(&self) -> &SubjectId {
        self.identity.subject_id()
    }

    pub fn is_super_admin(&self) -> bool {
        self.identity.is_super_admin()
    }

    pub fn metadata(&self) -> &RequestMetadata {
        &self.metadata
    }

    pub fn require(&self, capability: &Capability) -> Result<(), backoffice_auth::AuthzError> {
        backoffice_auth::require_capability(&self.identity, capability)
    }

    /// Audit entry attributed to this actor, carrying the request metadata.
    pub fn audit(&self, action: AuditAction) -> NewAuditEntry {
        NewAuditEntry::by(&self.identity, action).metadata(self.metadata.clone())
    }
}

/// A verified token holder who is not (yet) required to be an admin.
/// Only the invite redemption route sees this.
#[derive(Debug, Clone)]
pub struct VerifiedSubject {
    token: VerifiedToken,
    metadata: RequestMetadata,
}

impl VerifiedSubject {
    pub fn new(token: VerifiedToken, metadata: RequestMetadata) -> Self {
        Self { token, metadata }
    }

    pub fn subject_id(&self) -> &SubjectId {
        &self.token.subject_id
    }

    pub fn email(&self) -> Option<&str> {
        self.token.email.as_deref()
    }

    pub fn metadata(&self) -> &RequestMetadata {
        &self.metadata
    }
}

const FORWARDED_FOR: &str = "x-forwarded-for";
const REAL_IP: &str = "x-real-ip";

/// Client address from `x-forwarded-for` (first hop), then `x-real-ip`, then
/// the socket peer. User agent from the header of the same name.
pub fn request_metadata(headers: &HeaderMap, peer: Option<SocketAddr>) -> RequestMetadata {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let ip_address = header(FORWARDED_FOR)
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| header(REAL_IP))
        .map(str::to_string)
        .or_else(|| peer.map(|p| p.ip().to_string()));

    RequestMetadata {
        ip_address,
        user_agent: header(axum::http::header::USER_AGENT.as_str()).map(str::to_string),
    }
}
