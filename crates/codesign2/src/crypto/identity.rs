//! Signing identities stored as plain directories.
//!
//! Each identity is a directory named after it under the store root:
//!
//! ```text
//! ~/.codesign2/identities/<name>/
//!     privateKey.pem
//!     publicCert.pem
//!     password        (optional, passed to the backend as a file)
//! ```
//!
//! This is a convention, not a keychain. Keys are unencrypted unless the key
//! file itself is, and access control is whatever the filesystem enforces.

use crate::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Store root used when none is configured.
pub const DEFAULT_IDENTITY_STORE: &str = "~/.codesign2/identities";

/// Private key file inside an identity directory.
pub const PRIVATE_KEY_FILE: &str = "privateKey.pem";

/// Signer certificate file inside an identity directory.
pub const CERTIFICATE_FILE: &str = "publicCert.pem";

/// Optional key password file inside an identity directory.
pub const PASSWORD_FILE: &str = "password";

/// Resolves identity names to key material directories.
#[derive(Debug, Clone)]
pub struct IdentityStore {
    root: StoreRoot,
}

#[derive(Debug, Clone)]
enum StoreRoot {
    /// `~` and `$VAR` are expanded at lookup time.
    Template(String),
    /// Used as is.
    Directory(PathBuf),
}

impl Default for IdentityStore {
    fn default() -> Self {
        Self::new(DEFAULT_IDENTITY_STORE)
    }
}

impl IdentityStore {
    /// Create a store rooted at `root`.
    ///
    /// `root` may use `~` and `$VAR`/`${VAR}`, expanded on every lookup. The
    /// expansion is one path and is never split on whitespace.
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: StoreRoot::Template(root.into()),
        }
    }

    /// Create a store rooted at an already-resolved directory.
    pub fn from_path(root: impl Into<PathBuf>) -> Self {
        Self {
            root: StoreRoot::Directory(root.into()),
        }
    }

    /// Store root as configured, before expansion.
    pub fn root(&self) -> &Path {
        match &self.root {
            StoreRoot::Template(template) => Path::new(template),
            StoreRoot::Directory(path) => path,
        }
    }

    /// Look up the identity called `name`.
    ///
    /// Fails with [`Error::IdentityNotFound`] if `name` is empty, the root or
    /// the name does not expand, or the resulting path does not canonicalize
    /// to an existing directory.
    pub fn resolve(&self, name: &str) -> Result<Identity> {
        let not_found = |reason: String| Error::IdentityNotFound {
            name: name.to_string(),
            reason,
        };

        if name.is_empty() {
            return Err(not_found("empty identity name".into()));
        }

        let root = match &self.root {
            StoreRoot::Template(template) => shellexpand::full(template)
                .map(|expanded| PathBuf::from(expanded.into_owned()))
                .map_err(|e| not_found(format!("cannot expand {template:?}: {e}")))?,
            StoreRoot::Directory(path) => path.clone(),
        };

        let expanded_name = shellexpand::full(name)
            .map_err(|e| not_found(format!("cannot expand {name:?}: {e}")))?;
        // Like a shell word expansion, only the first word is a candidate.
        let word = expanded_name
            .split_whitespace()
            .next()
            .ok_or_else(|| not_found(format!("{name:?} expands to nothing")))?;

        let candidate = root.join(word);
        let directory = candidate
            .canonicalize()
            .map_err(|e| not_found(format!("{}: {e}", candidate.display())))?;
        if !directory.is_dir() {
            return Err(not_found(format!("{} is not a directory", directory.display())));
        }

        debug!(identity = %name, path = %directory.display(), "resolved identity");
        Ok(Identity {
            name: name.to_string(),
            directory,
        })
    }
}

/// A resolved signing identity. Read-only and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    name: String,
    directory: PathBuf,
}

impl Identity {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Canonical identity directory.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn private_key_path(&self) -> PathBuf {
        self.directory.join(PRIVATE_KEY_FILE)
    }

    pub fn certificate_path(&self) -> PathBuf {
        self.directory.join(CERTIFICATE_FILE)
    }

    /// Password file, if the identity has one.
    pub fn password_path(&self) -> Option<PathBuf> {
        let path = self.directory.join(PASSWORD_FILE);
        path.exists().then_some(path)
    }
}
