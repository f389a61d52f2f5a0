//! `backoffice-auth`: pure authorization boundary for the back-office.
//!
//! Role matrix, identity model, master accounts, privilege-change safety
//! rules and the token verification seam. Decoupled from HTTP and storage.

pub mod authorize;
pub mod capability;
pub mod identity;
pub mod master;
pub mod matrix;
pub mod roles;
pub mod safety;
pub mod token;

pub use authorize::{AuthzDetails, AuthzError, admit, require_capability};
pub use capability::Capability;
pub use identity::{Identity, IdentitySource};
pub use master::{MasterEntry, MasterList};
pub use matrix::{RoleDescriptor, RoleGrant, describe_matrix, has_capability, role_capabilities};
pub use roles::{Role, all_roles};
pub use safety::{RoleChange, SafetyTarget, SafetyViolation, check_ban, check_deletion, check_role_change};
pub use token::{Hs256TokenVerifier, TokenClaims, TokenError, TokenVerifier, VerifiedToken};
