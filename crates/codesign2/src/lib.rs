//! App bundle resource sealing and identity-based detached signing.
//!
//! [`bundle`] builds the `_CodeSignature/CodeResources` manifest for a `.app`
//! directory and the special slot digests an embedder needs. [`crypto`]
//! resolves named identities from a directory store and signs byte buffers
//! through an external `openssl cms` process.

pub mod builder;
pub mod bundle;
pub mod codesign;
pub mod crypto;
pub mod error;

pub use builder::CodeSign;
pub use bundle::{AppBundle, CodeResources, CodeResourcesBuilder, ManifestFormat, SealedResources};
pub use codesign::SpecialSlots;
pub use crypto::{Identity, IdentityStore, OpensslCms, SigningBackend};
pub use error::Error;

pub type Result<T> = std::result::Result<T, Error>;
