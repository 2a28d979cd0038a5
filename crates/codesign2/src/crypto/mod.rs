//! Signing identities and the detached signature backend.

pub mod backend;
pub mod identity;

pub use backend::{OpensslCms, SigningBackend};
pub use identity::{Identity, IdentityStore};
