//! Detached CMS signatures produced by an external `openssl` process.
//!
//! The backend writes the payload to a private temporary directory, runs
//!
//! ```text
//! openssl cms -sign -binary -outform DER -md SHA1 \
//!     -signer <publicCert.pem> -inkey <privateKey.pem> \
//!     -in <input> -out <output> [-passin file:<password>]
//! ```
//!
//! and reads the DER signature back. The temporary directory is removed when
//! the call returns, whether it succeeded or not. There is no timeout: a hung
//! backend blocks the caller.

use super::identity::Identity;
use crate::{Error, Result};
use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;
use tracing::{debug, info};

/// Program looked up on `PATH` when none is configured.
pub const DEFAULT_OPENSSL: &str = "openssl";

const INPUT_FILE: &str = "payload.bin";
const OUTPUT_FILE: &str = "signature.der";

/// Produces a detached signature over a byte buffer.
pub trait SigningBackend {
    fn sign(&self, identity: &Identity, data: &[u8]) -> Result<Vec<u8>>;
}

/// [`SigningBackend`] that shells out to `openssl cms`.
#[derive(Debug, Clone)]
pub struct OpensslCms {
    program: OsString,
    temp_dir: Option<PathBuf>,
}

impl Default for OpensslCms {
    fn default() -> Self {
        Self {
            program: DEFAULT_OPENSSL.into(),
            temp_dir: None,
        }
    }
}

impl OpensslCms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different `openssl` executable.
    pub fn program(mut self, program: impl AsRef<OsStr>) -> Self {
        self.program = program.as_ref().to_os_string();
        self
    }

    /// Create scratch files under `dir` instead of the system temp directory.
    pub fn temp_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.temp_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    fn scratch_dir(&self) -> std::io::Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("codesign2-");
        match &self.temp_dir {
            Some(dir) => builder.tempdir_in(dir),
            None => builder.tempdir(),
        }
    }

    /// Argument vector passed to the backend, after the program name.
    pub fn arguments(
        identity: &Identity,
        certificate: &Path,
        private_key: &Path,
        input: &Path,
        output: &Path,
    ) -> Vec<OsString> {
        let mut args: Vec<OsString> = [
            "cms", "-sign", "-binary", "-outform", "DER", "-md", "SHA1", "-signer",
        ]
        .iter()
        .map(OsString::from)
        .collect();
        args.push(certificate.into());
        args.push("-inkey".into());
        args.push(private_key.into());
        args.push("-in".into());
        args.push(input.into());
        args.push("-out".into());
        args.push(output.into());

        if let Some(password) = identity.password_path() {
            let mut source = OsString::from("file:");
            source.push(password);
            args.push("-passin".into());
            args.push(source);
        }
        args
    }
}

impl SigningBackend for OpensslCms {
    fn sign(&self, identity: &Identity, data: &[u8]) -> Result<Vec<u8>> {
        let certificate = canonical_key_material(&identity.certificate_path())?;
        let private_key = canonical_key_material(&identity.private_key_path())?;

        // Dropping the directory removes both files on every return path.
        let scratch = self
            .scratch_dir()
            .map_err(|e| Error::SigningBackendFailed(format!("cannot create temp directory: {e}")))?;
        let input = scratch.path().join(INPUT_FILE);
        let output = scratch.path().join(OUTPUT_FILE);

        fs::write(&input, data).map_err(|e| {
            Error::SigningBackendFailed(format!("cannot write {}: {e}", input.display()))
        })?;

        let args = Self::arguments(identity, &certificate, &private_key, &input, &output);
        debug!(program = ?self.program, args = ?args, "running signing backend");

        let result = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                Error::SigningBackendFailed(format!("cannot run {:?}: {e}", self.program))
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            if !stderr.is_empty() {
                debug!(stderr = %stderr.trim(), "signing backend stderr");
            }
            return Err(Error::SigningBackendFailed(match result.status.code() {
                Some(code) => format!("{:?} exited with status {code}", self.program),
                None => format!("{:?} was terminated by a signal", self.program),
            }));
        }

        let signature = fs::read(&output).map_err(|e| {
            Error::SigningBackendFailed(format!("cannot read {}: {e}", output.display()))
        })?;

        info!(
            identity = %identity.name(),
            input_len = data.len(),
            signature_len = signature.len(),
            "produced detached signature"
        );
        Ok(signature)
    }
}

fn canonical_key_material(path: &Path) -> Result<PathBuf> {
    path.canonicalize().map_err(|e| {
        Error::SigningBackendFailed(format!("missing key material {}: {e}", path.display()))
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::crypto::identity::{IdentityStore, PASSWORD_FILE};
    use std::os::unix::fs::PermissionsExt;
    use tempfile::{tempdir, TempDir};

    /// Stand-in for `openssl` that logs its arguments next to itself and
    /// writes `SIG:` followed by the input to the `-out` path.
    const FAKE_OPENSSL: &str = r#"#!/bin/sh
log="$(dirname "$0")/args.log"
: > "$log"
for arg in "$@"; do printf '%s\n' "$arg" >> "$log"; done
while [ $# -gt 0 ]; do
    case "$1" in
        -in) input="$2"; shift ;;
        -out) output="$2"; shift ;;
    esac
    shift
done
printf 'SIG:' > "$output"
cat "$input" >> "$output"
"#;

    const FAILING_OPENSSL: &str = "#!/bin/sh\necho 'unable to load key' >&2\nexit 3\n";

    struct Fixture {
        _root: TempDir,
        store: IdentityStore,
        bin: PathBuf,
        scratch: PathBuf,
    }

    fn fixture(script: &str) -> Fixture {
        let root = tempdir().unwrap();
        let identities = root.path().join("identities");
        let identity = identities.join("dev");
        fs::create_dir_all(&identity).unwrap();
        fs::write(identity.join("privateKey.pem"), b"key").unwrap();
        fs::write(identity.join("publicCert.pem"), b"cert").unwrap();

        let bin = root.path().join("bin");
        fs::create_dir(&bin).unwrap();
        let program = bin.join("openssl");
        fs::write(&program, script).unwrap();
        fs::set_permissions(&program, fs::Permissions::from_mode(0o755)).unwrap();

        let scratch = root.path().join("scratch");
        fs::create_dir(&scratch).unwrap();

        Fixture {
            store: IdentityStore::from_path(&identities),
            bin,
            scratch,
            _root: root,
        }
    }

    impl Fixture {
        fn backend(&self) -> OpensslCms {
            OpensslCms::new()
                .program(self.bin.join("openssl"))
                .temp_dir(&self.scratch)
        }

        fn scratch_is_empty(&self) -> bool {
            fs::read_dir(&self.scratch).unwrap().next().is_none()
        }

        fn logged_args(&self) -> Vec<String> {
            fs::read_to_string(self.bin.join("args.log"))
                .unwrap()
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    #[test]
    fn test_sign_returns_output_and_cleans_up() {
        let fx = fixture(FAKE_OPENSSL);
        let identity = fx.store.resolve("dev").unwrap();

        let signature = fx.backend().sign(&identity, b"payload").unwrap();
        assert_eq!(signature, b"SIG:payload");
        assert!(fx.scratch_is_empty());
    }

    #[test]
    fn test_argument_protocol() {
        let fx = fixture(FAKE_OPENSSL);
        let identity = fx.store.resolve("dev").unwrap();
        fx.backend().sign(&identity, b"x").unwrap();

        let args = fx.logged_args();
        assert_eq!(
            &args[..8],
            ["cms", "-sign", "-binary", "-outform", "DER", "-md", "SHA1", "-signer"]
        );
        assert_eq!(args[8], identity.certificate_path().display().to_string());
        assert_eq!(args[9], "-inkey");
        assert_eq!(args[10], identity.private_key_path().display().to_string());
        assert_eq!(args[11], "-in");
        assert_eq!(args[13], "-out");
        assert_eq!(args.len(), 15);
        assert_ne!(args[12], args[14]);
    }

    #[test]
    fn test_password_file_is_passed() {
        let fx = fixture(FAKE_OPENSSL);
        let identity = fx.store.resolve("dev").unwrap();
        fs::write(identity.directory().join(PASSWORD_FILE), b"secret").unwrap();

        fx.backend().sign(&identity, b"x").unwrap();

        let args = fx.logged_args();
        assert_eq!(args.len(), 17);
        assert_eq!(args[15], "-passin");
        assert_eq!(
            args[16],
            format!("file:{}", identity.directory().join("password").display())
        );
    }

    #[test]
    fn test_backend_failure_cleans_up() {
        let fx = fixture(FAILING_OPENSSL);
        let identity = fx.store.resolve("dev").unwrap();

        let err = fx.backend().sign(&identity, b"payload").unwrap_err();
        assert!(matches!(err, Error::SigningBackendFailed(ref msg) if msg.contains("status 3")));
        assert!(fx.scratch_is_empty());
    }

    #[test]
    fn test_missing_program_fails() {
        let fx = fixture(FAKE_OPENSSL);
        let identity = fx.store.resolve("dev").unwrap();

        let backend = fx.backend().program(fx.bin.join("does-not-exist"));
        assert!(matches!(
            backend.sign(&identity, b"payload"),
            Err(Error::SigningBackendFailed(_))
        ));
        assert!(fx.scratch_is_empty());
    }

    #[test]
    fn test_missing_key_material_fails() {
        let fx = fixture(FAKE_OPENSSL);
        let identity = fx.store.resolve("dev").unwrap();
        fs::remove_file(identity.private_key_path()).unwrap();

        assert!(matches!(
            fx.backend().sign(&identity, b"payload"),
            Err(Error::SigningBackendFailed(ref msg)) if msg.contains("privateKey.pem")
        ));
    }

    #[test]
    fn test_missing_output_fails() {
        let fx = fixture("#!/bin/sh\nexit 0\n");
        let identity = fx.store.resolve("dev").unwrap();

        assert!(matches!(
            fx.backend().sign(&identity, b"payload"),
            Err(Error::SigningBackendFailed(_))
        ));
        assert!(fx.scratch_is_empty());
    }
}
