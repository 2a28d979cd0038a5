//! End-to-end tests for sealing app bundles.
//!
//! Each test builds a bundle in a temporary directory, generates
//! `_CodeSignature/CodeResources` through the public API, and checks the
//! written document.

use codesign2::bundle::{ManifestFormat, CODE_SIGNATURE_DIR};
use codesign2::codesign::slots::{CSSLOT_INFOSLOT, CSSLOT_RESOURCEDIR};
use codesign2::{AppBundle, CodeResources, CodeSign, Error};
use plist::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn make_bundle(name: &str, executable: Option<&str>) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let app = dir.path().join(name);
    fs::create_dir(&app).unwrap();

    if let Some(executable) = executable {
        let mut info = plist::Dictionary::new();
        info.insert(
            "CFBundleIdentifier".to_string(),
            Value::String("com.example.sealing".to_string()),
        );
        info.insert(
            "CFBundleExecutable".to_string(),
            Value::String(executable.to_string()),
        );
        Value::Dictionary(info)
            .to_file_binary(app.join("Info.plist"))
            .unwrap();
        fs::write(app.join(executable), b"\xcf\xfa\xed\xfe executable").unwrap();
    }

    (dir, app)
}

fn write(root: &Path, relative: &str, contents: &[u8]) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn read_manifest(app: &Path) -> CodeResources {
    let data = fs::read(app.join("_CodeSignature/CodeResources")).unwrap();
    CodeResources::from_bytes(&data).unwrap()
}

#[test]
fn test_hidden_files_and_signature_dir_excluded() {
    let (_dir, app) = make_bundle("Scenario.app", None);
    write(&app, "A", b"a");
    write(&app, ".hidden", b"hidden");
    write(&app, "_CodeSignature/CodeResources", b"previous run");

    CodeSign::new().seal_bundle(&app).unwrap();

    let manifest = read_manifest(&app);
    let keys: Vec<_> = manifest.files().keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["A"]);
}

#[test]
fn test_main_executable_never_in_manifest() {
    let (_dir, app) = make_bundle("Game.app", Some("GameBinary"));
    write(&app, "Game", b"same name as the bundle, not the executable");
    write(&app, "Frameworks/Engine.framework/Engine", b"engine");

    let sealed = CodeSign::new().seal_bundle(&app).unwrap();

    for files in [sealed.manifest.files(), sealed.manifest.files2()] {
        assert!(!files.contains_key("GameBinary"));
        assert!(files.keys().all(|k| !k.starts_with(CODE_SIGNATURE_DIR)));
        // Only the executable named in Info.plist is excluded.
        assert!(files.contains_key("Game"));
        assert!(files.contains_key("Frameworks/Engine.framework/Engine"));
    }
}

#[test]
fn test_entry_shapes_follow_optionality() {
    let (_dir, app) = make_bundle("Shapes.app", Some("Shapes"));
    write(&app, "PkgInfo", b"APPL????");
    write(&app, "embedded.mobileprovision", b"profile");
    write(&app, "Settings.bundle/Root.plist", b"settings");
    write(&app, "Settings.bundle/en.lproj/Root.strings", b"strings");
    write(&app, "en.lproj/Main.strings", b"main");

    CodeSign::new().seal_bundle(&app).unwrap();

    let data = fs::read(app.join("_CodeSignature/CodeResources")).unwrap();
    let value: Value = plist::from_bytes(&data).unwrap();
    let root = value.as_dictionary().unwrap();

    for key in ["files", "files2"] {
        let files = root.get(key).unwrap().as_dictionary().unwrap();
        for mandatory in [
            "Info.plist",
            "PkgInfo",
            "embedded.mobileprovision",
            "Settings.bundle/Root.plist",
        ] {
            assert!(
                matches!(files.get(mandatory), Some(Value::Data(d)) if d.len() == 20),
                "{key}/{mandatory} should be a bare digest"
            );
        }
        for optional in ["Settings.bundle/en.lproj/Root.strings", "en.lproj/Main.strings"] {
            let entry = files.get(optional).unwrap().as_dictionary().unwrap();
            assert_eq!(entry.get("optional"), Some(&Value::Boolean(true)));
            assert!(matches!(entry.get("hash"), Some(Value::Data(d)) if d.len() == 20));
        }
    }
}

#[test]
fn test_document_has_exactly_four_keys() {
    let (_dir, app) = make_bundle("Keys.app", Some("Keys"));
    CodeSign::new().seal_bundle(&app).unwrap();

    let data = fs::read(app.join("_CodeSignature/CodeResources")).unwrap();
    assert!(data.starts_with(b"<?xml"));
    let value: Value = plist::from_bytes(&data).unwrap();
    let keys: Vec<_> = value.as_dictionary().unwrap().keys().cloned().collect();
    assert_eq!(keys, vec!["files", "files2", "rules", "rules2"]);
}

#[test]
fn test_repeated_generation_is_stable() {
    let (_dir, app) = make_bundle("Stable.app", Some("Stable"));
    for i in 0..20 {
        write(&app, &format!("Resources/item{i}.dat"), format!("{i}").as_bytes());
    }

    let codesign = CodeSign::new();
    codesign.seal_bundle(&app).unwrap();
    let first = fs::read(app.join("_CodeSignature/CodeResources")).unwrap();
    codesign.seal_bundle(&app).unwrap();
    let second = fs::read(app.join("_CodeSignature/CodeResources")).unwrap();

    assert_eq!(first, second);
    let manifest = CodeResources::from_bytes(&first).unwrap();
    assert_eq!(manifest.files(), manifest.files2());
    assert_eq!(manifest.files().len(), 21);
}

#[test]
fn test_content_change_changes_only_that_entry() {
    let (_dir, app) = make_bundle("Change.app", Some("Change"));
    write(&app, "a.txt", b"alpha");
    write(&app, "b.txt", b"beta");

    let codesign = CodeSign::new();
    let before = codesign.seal_bundle(&app).unwrap();
    write(&app, "b.txt", b"betb");
    let after = codesign.seal_bundle(&app).unwrap();

    assert_eq!(before.manifest.files()["a.txt"], after.manifest.files()["a.txt"]);
    assert_ne!(before.manifest.files()["b.txt"], after.manifest.files()["b.txt"]);
    assert_ne!(
        before.special_slots.get(CSSLOT_RESOURCEDIR),
        after.special_slots.get(CSSLOT_RESOURCEDIR)
    );
    assert_eq!(
        before.special_slots.get(CSSLOT_INFOSLOT),
        after.special_slots.get(CSSLOT_INFOSLOT)
    );
}

#[test]
fn test_binary_format() {
    let (_dir, app) = make_bundle("Binary.app", Some("Binary"));
    write(&app, "data.bin", b"data");

    let sealed = CodeSign::new()
        .format(ManifestFormat::Binary)
        .seal_bundle(&app)
        .unwrap();

    let data = fs::read(app.join("_CodeSignature/CodeResources")).unwrap();
    assert!(data.starts_with(b"bplist00"));
    assert_eq!(CodeResources::from_bytes(&data).unwrap(), sealed.manifest);
}

#[test]
fn test_trailing_slash_accepted() {
    let (_dir, app) = make_bundle("Slash.app", Some("Slash"));
    let with_slash = format!("{}/", app.display());

    let bundle = AppBundle::open(&with_slash).unwrap();
    assert_eq!(bundle.display_name(), "Slash.app");
    assert_eq!(bundle.app_name(), "Slash");
    assert_eq!(bundle.identifier(), Some("com.example.sealing"));
}

#[test]
fn test_invalid_bundles_rejected() {
    let dir = TempDir::new().unwrap();
    let not_app = dir.path().join("Folder");
    fs::create_dir(&not_app).unwrap();
    let file_app = dir.path().join("File.app");
    fs::write(&file_app, b"not a directory").unwrap();

    for path in [not_app, file_app, dir.path().join("Missing.app")] {
        assert!(matches!(
            CodeSign::new().seal_bundle(&path),
            Err(Error::BundleInvalid { .. })
        ));
    }
}

#[test]
#[cfg(unix)]
fn test_unreadable_directory_fails_scan() {
    use std::os::unix::fs::PermissionsExt;

    let (_dir, app) = make_bundle("Locked.app", Some("Locked"));
    write(&app, "Locked.bundle/secret", b"secret");
    let locked = app.join("Locked.bundle");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    // Privileged users can read the directory anyway.
    let readable = fs::read_dir(&locked).is_ok();
    let result = CodeSign::new().seal_bundle(&app);
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

    if !readable {
        assert!(matches!(result, Err(Error::ScanFailed { .. })));
        // No manifest was written.
        assert!(!app.join("_CodeSignature/CodeResources").exists());
    }
}
