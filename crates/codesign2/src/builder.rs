//! CodeSign builder API
//!
//! Provides a builder pattern interface over the bundle sealing and
//! identity signing operations, carrying the configuration both need.

use crate::bundle::{AppBundle, ManifestFormat, SealedResources};
use crate::crypto::{Identity, IdentityStore, OpensslCms, SigningBackend};
use crate::Result;
use std::ffi::OsStr;
use std::path::Path;

/// Bundle sealing and detached signing with builder pattern API.
///
/// # Example
///
/// ```no_run
/// use codesign2::CodeSign;
///
/// let codesign = CodeSign::new().identity_store("~/.codesign2/identities");
/// let sealed = codesign.seal_bundle("MyApp.app")?;
/// let manifest = std::fs::read("MyApp.app/_CodeSignature/CodeResources")?;
/// let signature = codesign.sign("release", &manifest)?;
/// # let _ = (sealed, signature);
/// # Ok::<(), codesign2::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct CodeSign<B = OpensslCms> {
    identity_store: IdentityStore,
    backend: B,
    format: ManifestFormat,
}

impl CodeSign {
    /// Create a builder using the default identity store and `openssl` from `PATH`.
    pub fn new() -> Self {
        Self {
            identity_store: IdentityStore::default(),
            backend: OpensslCms::default(),
            format: ManifestFormat::default(),
        }
    }

    /// Set the `openssl` executable used for signing.
    pub fn openssl_program(mut self, program: impl AsRef<OsStr>) -> Self {
        self.backend = self.backend.program(program);
        self
    }

    /// Set the directory for the backend's scratch files.
    pub fn temp_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.backend = self.backend.temp_dir(dir);
        self
    }
}

impl Default for CodeSign {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: SigningBackend> CodeSign<B> {
    /// Set the identity store root (`~` and `$VAR` are expanded).
    pub fn identity_store(mut self, root: impl Into<String>) -> Self {
        self.identity_store = IdentityStore::new(root);
        self
    }

    /// Set the encoding of the written `CodeResources`.
    pub fn format(mut self, format: ManifestFormat) -> Self {
        self.format = format;
        self
    }

    /// Replace the signing backend.
    pub fn backend<C: SigningBackend>(self, backend: C) -> CodeSign<C> {
        CodeSign {
            identity_store: self.identity_store,
            backend,
            format: self.format,
        }
    }

    pub fn store(&self) -> &IdentityStore {
        &self.identity_store
    }

    /// Generate `_CodeSignature/CodeResources` for the bundle at `bundle_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The path is not a valid `.app` bundle
    /// - A directory cannot be scanned or a resource cannot be hashed
    /// - The signature directory or manifest cannot be written
    pub fn seal_bundle(&self, bundle_path: impl AsRef<Path>) -> Result<SealedResources> {
        AppBundle::open(bundle_path)?.generate_code_signature_directory(self.format)
    }

    /// Look up an identity in the configured store.
    pub fn resolve_identity(&self, name: &str) -> Result<Identity> {
        self.identity_store.resolve(name)
    }

    /// Produce a detached signature over `data` with the identity `name`.
    pub fn sign(&self, name: &str, data: &[u8]) -> Result<Vec<u8>> {
        let identity = self.resolve_identity(name)?;
        self.backend.sign(&identity, data)
    }

    /// Sign the contents of the file at `path`.
    pub fn sign_file(&self, name: &str, path: impl AsRef<Path>) -> Result<Vec<u8>> {
        let identity = self.resolve_identity(name)?;
        let data = std::fs::read(path)?;
        self.backend.sign(&identity, &data)
    }
}
