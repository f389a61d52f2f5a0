//! Infrastructure layer: datastores, identity resolution, audit, config.

pub mod accounts;
pub mod audit;
pub mod config;
pub mod db;
pub mod identity;
pub mod invites;
pub mod registry;

pub use identity::{IdentityResolver, ResolveError};
