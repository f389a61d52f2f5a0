//! `backoffice-core`: shared identifiers and the domain error model.
//!
//! No IO, no HTTP, no storage.

pub mod error;
pub mod id;

pub use error::DomainError;
pub use id::{AuditEntryId, SubjectId};
