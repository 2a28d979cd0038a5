//! CodeResources generation for app bundle signing
//!
//! Builds the `CodeResources` manifest: a SHA-1 digest for every resource in
//! the bundle, an optionality flag per resource, and the two fixed rule
//! tables a verifier uses to decide how strictly each path is checked.

use super::digest::{hash_file, Digest, DIGEST_LEN};
use super::optionality::is_optional;
use super::rules::RuleTable;
use super::scanner::scan_resources;
use crate::{Error, Result};
use plist::{Dictionary, Value};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Property list encoding used when writing a manifest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ManifestFormat {
    /// XML property list, as produced by Apple's tools.
    #[default]
    Xml,
    /// Binary property list (`bplist00`).
    Binary,
}

/// Digest and optionality of a single resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceEntry {
    pub digest: Digest,
    /// The resource may be absent without failing verification.
    pub optional: bool,
}

impl ResourceEntry {
    /// Mandatory entries are a bare `<data>` digest; optional ones are a
    /// `{hash, optional}` dictionary. Verifiers depend on this asymmetry.
    pub fn to_value(&self) -> Value {
        let hash = Value::Data(self.digest.to_vec());
        if !self.optional {
            return hash;
        }

        let mut dict = Dictionary::new();
        dict.insert("hash".to_string(), hash);
        dict.insert("optional".to_string(), Value::Boolean(true));
        Value::Dictionary(dict)
    }

    fn from_value(path: &str, value: &Value) -> Result<Self> {
        let (hash, optional) = match value {
            Value::Data(data) => (data.as_slice(), false),
            Value::Dictionary(dict) => {
                let hash = dict
                    .get("hash")
                    .and_then(Value::as_data)
                    .ok_or_else(|| Error::Metadata(format!("{path}: entry has no hash")))?;
                let optional = dict
                    .get("optional")
                    .and_then(Value::as_boolean)
                    .unwrap_or(false);
                (hash, optional)
            }
            _ => return Err(Error::Metadata(format!("{path}: unexpected entry type"))),
        };

        let digest: Digest = hash.try_into().map_err(|_| {
            Error::Metadata(format!(
                "{path}: digest is {} bytes, expected {DIGEST_LEN}",
                hash.len()
            ))
        })?;
        Ok(Self { digest, optional })
    }
}

/// A generated resource manifest.
///
/// `files` and `files2` are kept as separate maps even though they are built
/// identical, so the two generations can diverge later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeResources {
    files: BTreeMap<String, ResourceEntry>,
    files2: BTreeMap<String, ResourceEntry>,
}

impl CodeResources {
    /// Generation-1 entries (`files`).
    pub fn files(&self) -> &BTreeMap<String, ResourceEntry> {
        &self.files
    }

    /// Generation-2 entries (`files2`).
    pub fn files2(&self) -> &BTreeMap<String, ResourceEntry> {
        &self.files2
    }

    /// The rule table written under `rules`.
    pub fn rules(&self) -> &'static RuleTable {
        RuleTable::legacy()
    }

    /// The rule table written under `rules2`.
    pub fn rules2(&self) -> &'static RuleTable {
        RuleTable::extended()
    }

    /// The full document: `files`, `files2`, `rules`, `rules2`.
    pub fn to_value(&self) -> Value {
        let mut root = Dictionary::new();
        root.insert("files".to_string(), Value::Dictionary(entries_dict(&self.files)));
        root.insert("files2".to_string(), Value::Dictionary(entries_dict(&self.files2)));
        root.insert("rules".to_string(), Value::Dictionary(self.rules().to_dictionary()));
        root.insert("rules2".to_string(), Value::Dictionary(self.rules2().to_dictionary()));
        Value::Dictionary(root)
    }

    /// Serialize to an XML property list.
    pub fn to_xml(&self) -> Result<Vec<u8>> {
        self.to_bytes(ManifestFormat::Xml)
    }

    /// Serialize to a binary property list.
    pub fn to_binary(&self) -> Result<Vec<u8>> {
        self.to_bytes(ManifestFormat::Binary)
    }

    pub fn to_bytes(&self, format: ManifestFormat) -> Result<Vec<u8>> {
        let value = self.to_value();
        let mut buf = Vec::new();
        match format {
            ManifestFormat::Xml => plist::to_writer_xml(&mut buf, &value)?,
            ManifestFormat::Binary => plist::to_writer_binary(&mut buf, &value)?,
        }
        Ok(buf)
    }

    /// Parse an existing `CodeResources` document (XML or binary).
    ///
    /// Rule tables are fixed and are not read back.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let value: Value = plist::from_bytes(data)?;
        let root = value
            .as_dictionary()
            .ok_or_else(|| Error::Metadata("CodeResources is not a dictionary".into()))?;

        Ok(Self {
            files: parse_entries(root, "files")?,
            files2: parse_entries(root, "files2")?,
        })
    }

    /// Write the manifest to `path`.
    ///
    /// The document is written to a temporary file next to `path` and renamed
    /// into place, so `path` either holds a complete manifest or is untouched.
    pub fn write_to(&self, path: &Path, format: ManifestFormat) -> Result<()> {
        let bytes = self.to_bytes(format)?;
        let write_failed = |source| Error::ManifestWriteFailed {
            path: path.to_path_buf(),
            source,
        };

        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir).map_err(write_failed)?;
        tmp.write_all(&bytes).map_err(write_failed)?;
        tmp.as_file().sync_all().map_err(write_failed)?;
        tmp.persist(path).map_err(|e| write_failed(e.error))?;

        info!(path = %path.display(), files = self.files.len(), "wrote CodeResources");
        Ok(())
    }
}

fn entries_dict(entries: &BTreeMap<String, ResourceEntry>) -> Dictionary {
    let mut dict = Dictionary::new();
    for (path, entry) in entries {
        dict.insert(path.clone(), entry.to_value());
    }
    dict
}

fn parse_entries(root: &Dictionary, key: &str) -> Result<BTreeMap<String, ResourceEntry>> {
    let dict = root
        .get(key)
        .and_then(Value::as_dictionary)
        .ok_or_else(|| Error::Metadata(format!("CodeResources has no {key} dictionary")))?;

    let mut entries = BTreeMap::new();
    for (path, value) in dict.iter() {
        entries.insert(path.clone(), ResourceEntry::from_value(path, value)?);
    }
    Ok(entries)
}

/// Builder for generating CodeResources
pub struct CodeResourcesBuilder {
    /// Root bundle path
    bundle_path: PathBuf,
    /// Hashed resources keyed by relative path
    files: BTreeMap<String, ResourceEntry>,
    /// Relative paths left out of the manifest (the main executable)
    exclusions: Vec<String>,
}

impl CodeResourcesBuilder {
    /// Create a new CodeResources builder for the given bundle path
    pub fn new(bundle_path: impl AsRef<Path>) -> Self {
        Self {
            bundle_path: bundle_path.as_ref().to_path_buf(),
            files: BTreeMap::new(),
            exclusions: Vec::new(),
        }
    }

    /// Leave the resource at `relative_path` out of both generations.
    pub fn exclude(mut self, relative_path: impl Into<String>) -> Self {
        self.exclusions.push(relative_path.into());
        self
    }

    /// Walk the bundle and hash all files
    pub fn scan(&mut self) -> Result<&mut Self> {
        for (relative_path, path) in scan_resources(&self.bundle_path)? {
            let digest = hash_file(&path)?;
            self.add_file(relative_path, digest);
        }
        Ok(self)
    }

    /// Add a resource with a known digest. Optionality follows the bundle policy.
    pub fn add_file(&mut self, relative_path: impl Into<String>, digest: Digest) {
        let relative_path = relative_path.into();
        let optional = is_optional(&relative_path);
        self.files
            .insert(relative_path, ResourceEntry { digest, optional });
    }

    /// Get the number of scanned files, before exclusions
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Assemble the manifest.
    pub fn build(&self) -> CodeResources {
        let mut files = self.files.clone();
        for excluded in &self.exclusions {
            if files.remove(excluded).is_some() {
                debug!(path = %excluded, "excluded from CodeResources");
            }
        }

        let files2 = files.clone();
        CodeResources { files, files2 }
    }
}

/// Scan `bundle_root`, hash every resource, and build the manifest without
/// the entry at `exclude`.
pub fn generate(bundle_root: &Path, exclude: &str) -> Result<CodeResources> {
    let mut builder = CodeResourcesBuilder::new(bundle_root).exclude(exclude);
    builder.scan()?;
    Ok(builder.build())
}
