//! Which resources a verifier may tolerate being absent.

use super::{INFO_PLIST, PKG_INFO};

/// Embedded provisioning profile shipped inside device builds.
pub const EMBEDDED_PROVISION: &str = "embedded.mobileprovision";

/// Settings bundle whose property lists are always required.
const SETTINGS_BUNDLE_PREFIX: &str = "Settings.bundle/";

const PLIST_EXTENSION: &str = ".plist";

/// Shortest path that can name a property list inside the settings bundle.
const SETTINGS_PLIST_MIN_LEN: usize = 23;

/// Returns `true` if the resource at `relative_path` may be missing.
///
/// The bundle metadata, provisioning profile, package info, and every
/// `.plist` under `Settings.bundle/` are mandatory. Everything else is
/// optional.
pub fn is_optional(relative_path: &str) -> bool {
    if matches!(relative_path, INFO_PLIST | EMBEDDED_PROVISION | PKG_INFO) {
        return false;
    }

    if relative_path.len() >= SETTINGS_PLIST_MIN_LEN
        && relative_path.starts_with(SETTINGS_BUNDLE_PREFIX)
        && relative_path.ends_with(PLIST_EXTENSION)
    {
        return false;
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_names_are_mandatory() {
        assert!(!is_optional("Info.plist"));
        assert!(!is_optional("embedded.mobileprovision"));
        assert!(!is_optional("PkgInfo"));
    }

    #[test]
    fn test_settings_bundle_plists_are_mandatory() {
        assert!(!is_optional("Settings.bundle/Root.plist"));
        assert!(!is_optional("Settings.bundle/en.lproj/Root.plist"));
    }

    #[test]
    fn test_settings_bundle_other_files_are_optional() {
        assert!(is_optional("Settings.bundle/en.lproj/Root.strings"));
        assert!(is_optional("Settings.bundle/icon.png"));
    }

    #[test]
    fn test_short_settings_plist_is_optional() {
        // 22 bytes, one short of the minimum
        assert_eq!("Settings.bundle/.plist".len(), 22);
        assert!(is_optional("Settings.bundle/.plist"));
        assert!(!is_optional("Settings.bundle/a.plist"));
    }

    #[test]
    fn test_everything_else_is_optional() {
        assert!(is_optional("Assets.car"));
        assert!(is_optional("Frameworks/Foo.framework/Info.plist"));
        assert!(is_optional("en.lproj/Localizable.strings"));
        assert!(is_optional("Other.bundle/Root.plist"));
    }
}
