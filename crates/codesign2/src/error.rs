//! Error types for codesign2 operations.
//!
//! This module defines the [`enum@Error`] enum covering every failure case
//! in bundle validation, resource scanning, manifest generation, identity
//! lookup, and detached signing.
//!
//! # See Also
//!
//! - [`crate::Result`] - Convenience type alias using this error

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Error type for codesign2 operations.
///
/// All public functions in this crate return [`crate::Result<T>`], which uses this error type.
/// Nothing is retried internally; match on variants to decide whether to
/// retry, skip, or abort.
///
/// # Examples
///
/// ```no_run
/// use codesign2::{Error, IdentityStore};
///
/// match IdentityStore::default().resolve("release") {
///     Ok(identity) => println!("Using {}", identity.directory().display()),
///     Err(Error::IdentityNotFound { name, .. }) => eprintln!("No identity named {name:?}"),
///     Err(e) => eprintln!("Other error: {e}"),
/// }
/// ```
#[derive(Debug, Error)]
pub enum Error {
    /// I/O operation failed outside the bundle and signing paths below.
    ///
    /// Occurs when reading a caller-supplied payload file.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The path is not an app bundle.
    ///
    /// The root is missing, is not a directory, or its final component does
    /// not end with [`crate::bundle::BUNDLE_SUFFIX`].
    #[error("Invalid bundle {}: {reason}", path.display())]
    BundleInvalid { path: PathBuf, reason: String },

    /// A directory inside the bundle could not be read.
    ///
    /// Scanning has no partial-result policy; one unreadable directory fails
    /// the whole scan.
    #[error("Failed to scan {}: {source}", path.display())]
    ScanFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A resource file could not be opened or mapped for hashing.
    #[error("Failed to hash {}: {source}", path.display())]
    HashFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The signature directory or the `CodeResources` file could not be written.
    #[error("Failed to write manifest {}: {source}", path.display())]
    ManifestWriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// No usable identity exists under the requested name.
    ///
    /// Returned for an empty name, a template that expands to nothing, or a
    /// resolved path that does not exist or is not a directory.
    #[error("Identity not found: {name:?} ({reason})")]
    IdentityNotFound { name: String, reason: String },

    /// The external signing backend could not produce a signature.
    ///
    /// Covers spawn failures, non-zero or signal exits, missing key material,
    /// and a missing or unreadable output file.
    #[error("Signing backend failed: {0}")]
    SigningBackendFailed(String),

    /// Property list parsing or serialization failed.
    ///
    /// Raised for a malformed `Info.plist` or an unreadable `CodeResources`
    /// document.
    #[error("Plist error: {0}")]
    Plist(#[from] plist::Error),

    /// A property list parsed but does not have the expected shape.
    #[error("Invalid metadata: {0}")]
    Metadata(String),
}
