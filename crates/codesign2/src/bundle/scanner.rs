//! Recursive discovery of bundle resource files.

use super::CODE_SIGNATURE_DIR;
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Resource files keyed by bundle-relative POSIX path, mapped to their absolute path.
///
/// Directory enumeration order is unspecified, so results are collected into
/// an ordered map; serializing from it is byte-stable across runs.
pub type ResourcePaths = BTreeMap<String, PathBuf>;

/// Walk `root` and collect every regular file beneath it.
///
/// At every level, entries whose name starts with `.` are skipped. At the
/// top level, the `_CodeSignature` directory is skipped so earlier signing
/// output never ends up in its own manifest. Symlinks are followed; dangling
/// ones are skipped with a warning.
///
/// Any unreadable directory fails the whole scan with [`Error::ScanFailed`].
pub fn scan_resources(root: &Path) -> Result<ResourcePaths> {
    let mut resources = ResourcePaths::new();

    let walker = WalkDir::new(root)
        .follow_links(true)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_skipped(entry));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                if let Some(path) = dangling_symlink(&err) {
                    warn!(path = %path.display(), "skipping dangling symlink");
                    continue;
                }
                let path = err.path().unwrap_or(root).to_path_buf();
                return Err(Error::ScanFailed {
                    path,
                    source: io::Error::from(err),
                });
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let Some(relative) = relative_path(root, entry.path()) else {
            warn!(path = %entry.path().display(), "skipping resource with non-UTF-8 name");
            continue;
        };
        debug!(path = %relative, "found resource");
        resources.insert(relative, entry.into_path());
    }

    Ok(resources)
}

fn is_skipped(entry: &DirEntry) -> bool {
    if entry.depth() == 0 {
        return false;
    }

    let name = entry.file_name().to_string_lossy();
    if name.starts_with('.') {
        return true;
    }

    entry.depth() == 1 && name == CODE_SIGNATURE_DIR
}

/// Returns the path of a symlink whose target does not exist.
fn dangling_symlink(err: &walkdir::Error) -> Option<&Path> {
    let not_found = err
        .io_error()
        .is_some_and(|io| io.kind() == io::ErrorKind::NotFound);
    if !not_found {
        return None;
    }

    let path = err.path()?;
    let is_symlink = fs::symlink_metadata(path)
        .map(|meta| meta.file_type().is_symlink())
        .unwrap_or(false);
    is_symlink.then_some(path)
}

/// Join the components of `path` below `root` with `/`.
///
/// Returns `None` if any component is not valid UTF-8.
fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let mut parts = Vec::new();
    for component in relative.components() {
        if let Component::Normal(part) = component {
            parts.push(part.to_str()?);
        }
    }
    Some(parts.join("/"))
}
