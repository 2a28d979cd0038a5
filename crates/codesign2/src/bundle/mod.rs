//! App bundle handling for code signing.
//!
//! This module provides functionality to:
//! - Validate a `.app` directory and read its `Info.plist`
//! - Walk bundle directories and hash files
//! - Generate the `CodeResources` plist with file hashes and resource rules
//! - Fill the special hash slots consumed by the signature embedder
//!
//! # CodeResources Plist Structure
//!
//! The generated plist contains four top-level keys:
//!
//! | Key | Description |
//! |-----|-------------|
//! | `files` | Generation-1 resource digests |
//! | `files2` | Generation-2 resource digests (currently identical) |
//! | `rules` | Legacy inclusion/exclusion patterns |
//! | `rules2` | Extended inclusion/exclusion patterns |
//!
//! # Examples
//!
//! ```no_run
//! use codesign2::bundle::{AppBundle, ManifestFormat};
//!
//! let bundle = AppBundle::open("/path/to/MyApp.app")?;
//! let sealed = bundle.generate_code_signature_directory(ManifestFormat::Xml)?;
//! println!("{} resources", sealed.manifest.files().len());
//! # Ok::<(), codesign2::Error>(())
//! ```

pub mod code_resources;
pub mod digest;
pub mod optionality;
pub mod rules;
pub mod scanner;

pub use code_resources::{generate, CodeResources, CodeResourcesBuilder, ManifestFormat, ResourceEntry};
pub use rules::{Rule, RuleFlags, RuleTable};

use crate::codesign::slots::{SpecialSlots, CSSLOT_INFOSLOT, CSSLOT_RESOURCEDIR};
use crate::{Error, Result};
use plist::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Directory name suffix that marks an app bundle.
pub const BUNDLE_SUFFIX: &str = ".app";

/// Signature output directory at the bundle root.
pub const CODE_SIGNATURE_DIR: &str = "_CodeSignature";

/// Manifest file inside [`CODE_SIGNATURE_DIR`].
pub const CODE_RESOURCES: &str = "CodeResources";

/// Bundle metadata file.
pub const INFO_PLIST: &str = "Info.plist";

/// Package type and creator file.
pub const PKG_INFO: &str = "PkgInfo";

/// Returns `true` if `path` is an existing directory whose name ends in `.app`.
///
/// Trailing slashes are ignored.
pub fn is_app_bundle(path: impl AsRef<Path>) -> bool {
    check_bundle(path.as_ref()).is_ok()
}

fn check_bundle(path: &Path) -> Result<()> {
    let invalid = |reason: &str| Error::BundleInvalid {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => return Err(invalid("not a directory")),
        Err(_) => return Err(invalid("does not exist")),
    }

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    if name.len() <= BUNDLE_SUFFIX.len() || !name.ends_with(BUNDLE_SUFFIX) {
        return Err(invalid("name does not end in .app"));
    }
    Ok(())
}

/// An app bundle on disk.
#[derive(Debug, Clone)]
pub struct AppBundle {
    /// Canonical absolute root
    root: PathBuf,
    /// Final path component, e.g. `MyApp.app`
    display_name: String,
    /// Display name without the suffix
    app_name: String,
    /// `CFBundleIdentifier`
    identifier: Option<String>,
    /// `CFBundleExecutable`
    executable: Option<String>,
}

/// Result of sealing a bundle's resources.
#[derive(Debug, Clone)]
pub struct SealedResources {
    /// The manifest written to `_CodeSignature/CodeResources`.
    pub manifest: CodeResources,
    /// Info.plist and CodeResources digests.
    pub special_slots: SpecialSlots,
}

impl AppBundle {
    /// Validate `path` and load the bundle's metadata.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        check_bundle(path)?;

        let root = path.canonicalize().map_err(|e| Error::BundleInvalid {
            path: path.to_path_buf(),
            reason: format!("cannot canonicalize: {e}"),
        })?;

        let display_name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        // A symlink may point at a directory that does not end in .app.
        let app_name = display_name
            .strip_suffix(BUNDLE_SUFFIX)
            .ok_or_else(|| Error::BundleInvalid {
                path: root.clone(),
                reason: "name does not end in .app".into(),
            })?
            .to_string();

        let (identifier, executable) = read_info_plist(&root.join(INFO_PLIST))?;

        Ok(Self {
            root,
            display_name,
            app_name,
            identifier,
            executable,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    /// Executable name from `Info.plist`, if present.
    pub fn executable(&self) -> Option<&str> {
        self.executable.as_deref()
    }

    /// Absolute path of the main executable, if `Info.plist` names one.
    pub fn executable_path(&self) -> Option<PathBuf> {
        self.executable.as_ref().map(|name| self.root.join(name))
    }

    pub fn info_plist_path(&self) -> PathBuf {
        self.root.join(INFO_PLIST)
    }

    pub fn signature_dir(&self) -> PathBuf {
        self.root.join(CODE_SIGNATURE_DIR)
    }

    pub fn code_resources_path(&self) -> PathBuf {
        self.signature_dir().join(CODE_RESOURCES)
    }

    /// Relative path left out of the manifest.
    ///
    /// The executable named in `Info.plist`, or the app name when metadata
    /// does not name one.
    pub fn excluded_entry(&self) -> &str {
        self.executable.as_deref().unwrap_or(&self.app_name)
    }

    /// Recreate `_CodeSignature`, write `CodeResources`, and hash the special slots.
    ///
    /// Any previous contents of the signature directory are discarded. On
    /// failure the directory may be missing or empty, but never holds a
    /// partially written manifest.
    pub fn generate_code_signature_directory(&self, format: ManifestFormat) -> Result<SealedResources> {
        let signature_dir = self.signature_dir();
        let write_failed = |source| Error::ManifestWriteFailed {
            path: signature_dir.clone(),
            source,
        };

        let removed = match fs::symlink_metadata(&signature_dir) {
            Ok(meta) if meta.is_dir() => fs::remove_dir_all(&signature_dir),
            Ok(_) => fs::remove_file(&signature_dir),
            Err(e) => Err(e),
        };
        match removed {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(write_failed(e)),
        }
        fs::create_dir(&signature_dir).map_err(write_failed)?;

        let manifest = generate(&self.root, self.excluded_entry())?;
        let code_resources_path = self.code_resources_path();
        manifest.write_to(&code_resources_path, format)?;

        let mut special_slots = SpecialSlots::default();
        let info_plist = self.info_plist_path();
        if info_plist.is_file() {
            special_slots.set(CSSLOT_INFOSLOT, digest::hash_file(&info_plist)?);
        }
        special_slots.set(CSSLOT_RESOURCEDIR, digest::hash_file(&code_resources_path)?);

        info!(
            bundle = %self.display_name,
            resources = manifest.files().len(),
            "sealed bundle resources"
        );
        Ok(SealedResources {
            manifest,
            special_slots,
        })
    }
}

/// Read `CFBundleIdentifier` and `CFBundleExecutable`.
///
/// A missing or empty file yields no metadata.
fn read_info_plist(path: &Path) -> Result<(Option<String>, Option<String>)> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "bundle has no Info.plist");
            return Ok((None, None));
        }
        Err(e) => {
            return Err(Error::Metadata(format!("cannot read {}: {e}", path.display())));
        }
    };
    if data.is_empty() {
        return Ok((None, None));
    }

    let plist: Value = plist::from_bytes(&data)?;
    let dict = plist
        .as_dictionary()
        .ok_or_else(|| Error::Metadata(format!("{} is not a dictionary", path.display())))?;

    let string_field = |key: &str| dict.get(key).and_then(Value::as_string).map(str::to_string);
    Ok((string_field("CFBundleIdentifier"), string_field("CFBundleExecutable")))
}
