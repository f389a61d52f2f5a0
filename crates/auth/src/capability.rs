use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Fine-grained capability string (e.g. `users:ban`).
///
/// The sentinel `"*"` stands for "all capabilities"; only the matrix should
/// ever hand it out.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capability(Cow<'static, str>);

impl Capability {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == WILDCARD.as_str()
    }
}

impl core::fmt::Display for Capability {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

pub const WILDCARD: Capability = Capability::from_static("*");

/// Baseline capability every administrative role carries.
pub const ADMIN_ACCESS: Capability = Capability::from_static("admin:access");

pub const USERS_READ: Capability = Capability::from_static("users:read");
pub const USERS_UPDATE: Capability = Capability::from_static("users:update");
pub const USERS_BAN: Capability = Capability::from_static("users:ban");
pub const USERS_DELETE: Capability = Capability::from_static("users:delete");

pub const CONTENT_READ: Capability = Capability::from_static("content:read");
pub const CONTENT_DELETE: Capability = Capability::from_static("content:delete");
pub const CONTENT_MODERATE: Capability = Capability::from_static("content:moderate");

pub const ANALYTICS_READ: Capability = Capability::from_static("analytics:read");

pub const SETTINGS_READ: Capability = Capability::from_static("settings:read");
pub const SETTINGS_UPDATE: Capability = Capability::from_static("settings:update");

pub const SCHOOLS_READ: Capability = Capability::from_static("schools:read");
pub const SCHOOLS_CREATE: Capability = Capability::from_static("schools:create");
pub const SCHOOLS_UPDATE: Capability = Capability::from_static("schools:update");
pub const SCHOOLS_DELETE: Capability = Capability::from_static("schools:delete");

pub const STUDENTS_READ: Capability = Capability::from_static("students:read");
pub const STUDENTS_UPDATE: Capability = Capability::from_static("students:update");

pub const INVITES_READ: Capability = Capability::from_static("invites:read");
pub const INVITES_CREATE: Capability = Capability::from_static("invites:create");
pub const INVITES_DELETE: Capability = Capability::from_static("invites:delete");

pub const AUDIT_READ: Capability = Capability::from_static("audit:read");
