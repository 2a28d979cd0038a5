//! Command-line interface for codesign2.
//!
//! Seals app bundles (writes `_CodeSignature/CodeResources`) and produces
//! detached signatures with identities from the identity store.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use codesign2::bundle::ManifestFormat;
use codesign2::crypto::identity::DEFAULT_IDENTITY_STORE;
use codesign2::CodeSign;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "codesign2")]
#[command(about = "App bundle resource sealing and detached signing")]
struct Cli {
    /// Identity store root (`~` and `$VAR` are expanded)
    #[arg(long, env = "CODESIGN2_IDENTITY_STORE", default_value = DEFAULT_IDENTITY_STORE, global = true)]
    identity_store: String,

    /// openssl executable used for signing
    #[arg(long, default_value = "openssl", global = true)]
    openssl: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate _CodeSignature/CodeResources and print the special slot digests
    Resources {
        /// App bundle (.app directory)
        bundle: PathBuf,

        /// Property list encoding of CodeResources
        #[arg(long, value_enum, default_value_t = Format::Xml)]
        format: Format,
    },

    /// Write a detached DER signature over a file
    Sign {
        /// Identity name in the identity store
        #[arg(short, long)]
        identity: String,

        /// File to sign
        input: PathBuf,

        /// Signature output file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the directory an identity resolves to
    Identity {
        /// Identity name in the identity store
        name: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Xml,
    Binary,
}

impl From<Format> for ManifestFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Xml => ManifestFormat::Xml,
            Format::Binary => ManifestFormat::Binary,
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let codesign = CodeSign::new()
        .openssl_program(&cli.openssl)
        .identity_store(cli.identity_store);

    match cli.command {
        Command::Resources { bundle, format } => {
            let sealed = codesign
                .format(format.into())
                .seal_bundle(&bundle)
                .with_context(|| format!("failed to seal {}", bundle.display()))?;

            println!("Sealed: {} resources", sealed.manifest.files().len());
            for (slot, digest) in sealed.special_slots.populated() {
                println!("slot {slot}: {}", hex::encode(digest));
            }
        }
        Command::Sign {
            identity,
            input,
            output,
        } => {
            let signature = codesign
                .sign_file(&identity, &input)
                .with_context(|| format!("failed to sign {}", input.display()))?;

            let output = output.unwrap_or_else(|| {
                let mut out = input.clone().into_os_string();
                out.push(".sig");
                PathBuf::from(out)
            });
            std::fs::write(&output, &signature)
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!("Signed: {}", output.display());
        }
        Command::Identity { name } => {
            let identity = codesign.resolve_identity(&name)?;
            println!("{}", identity.directory().display());
        }
    }

    Ok(())
}
