//! pkgseal CLI
//!
//! Entry point for the `pkgseal` command-line tool.

use clap::{Args, Parser, Subcommand};
use pkgseal::build::{ABI_REVISION_KEY, META_CONTENTS, META_PACKAGE};
use pkgseal::{
    AbiRevision, BuildConfig, BuildError, ConfigError, ConfigLayer, ErrorKind, Manifest,
    PackageManifest, Pipeline,
};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pkgseal")]
#[command(about = "Build sealed, content-addressed packages", version)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the package identity record
    Init {
        #[command(flatten)]
        build: BuildArgs,
    },

    /// Hash content files and write the content index
    Update {
        #[command(flatten)]
        build: BuildArgs,
    },

    /// Check that required metadata is present
    Validate {
        #[command(flatten)]
        build: BuildArgs,
    },

    /// Archive the metadata and write the digest sidecar
    Seal {
        #[command(flatten)]
        build: BuildArgs,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Run init, update, validate and seal
    Build {
        #[command(flatten)]
        build: BuildArgs,

        /// Also write a package manifest to this path
        #[arg(long)]
        package_manifest: Option<PathBuf>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Check a sealed archive against its digest sidecar
    Verify {
        #[command(flatten)]
        build: BuildArgs,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug, Default)]
struct BuildArgs {
    /// Path to a pkgseal.toml config file
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Package name (default: base name of the output directory)
    #[arg(long = "name", short = 'n')]
    pkg_name: Option<String>,

    /// ABI revision to embed (decimal or 0x-prefixed hex)
    #[arg(long)]
    abi_revision: Option<String>,

    /// Output directory
    #[arg(long, short = 'o')]
    output_dir: Option<PathBuf>,

    /// Scratch directory
    #[arg(long)]
    temp_dir: Option<PathBuf>,

    /// Repository identifier
    #[arg(long)]
    repository: Option<String>,

    /// Build manifest file or directory
    #[arg(long, short = 'm')]
    manifest: Option<PathBuf>,

    /// Glob pattern to skip when the manifest is a directory (repeatable)
    #[arg(long = "exclude", short = 'x')]
    exclude: Vec<String>,
}

impl BuildArgs {
    fn to_config(&self) -> Result<BuildConfig, ConfigError> {
        let mut layers = Vec::new();
        if let Some(path) = &self.config {
            layers.push(ConfigLayer::from_toml_file(path)?);
        }

        let abi_revision = match &self.abi_revision {
            Some(s) => Some(s.parse::<AbiRevision>()?),
            None => None,
        };
        layers.push(ConfigLayer {
            pkg_name: self.pkg_name.clone(),
            abi_revision,
            output_dir: self.output_dir.clone(),
            temp_dir: self.temp_dir.clone(),
            repository: self.repository.clone(),
            manifest_path: self.manifest.clone(),
            exclude: if self.exclude.is_empty() {
                None
            } else {
                Some(self.exclude.clone())
            },
        });

        BuildConfig::from_layers(layers)
    }
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    let result = match cli.command {
        Commands::Init { build } => with_pipeline(&build, run_init),
        Commands::Update { build } => with_pipeline(&build, run_update),
        Commands::Validate { build } => with_pipeline(&build, run_validate),
        Commands::Seal { build, json } => with_pipeline(&build, |p| run_seal(p, json)),
        Commands::Build {
            build,
            package_manifest,
            json,
        } => with_pipeline(&build, |p| run_build(p, package_manifest.as_ref(), json)),
        Commands::Verify { build, json } => with_pipeline(&build, |p| run_verify(p, json)),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        let code = match e.kind() {
            ErrorKind::InvalidRepositoryIdentifier => 2,
            _ => 1,
        };
        process::exit(code);
    }
}

fn with_pipeline<F>(args: &BuildArgs, run: F) -> Result<(), BuildError>
where
    F: FnOnce(&Pipeline) -> Result<(), BuildError>,
{
    let config = match args.to_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(1);
        }
    };
    run(&Pipeline::new(config))
}

/// Load the configured manifest plus metadata written by earlier
/// invocations into the output directory.
fn load_manifest(pipeline: &Pipeline) -> Result<Manifest, BuildError> {
    let mut manifest = pipeline.load_manifest()?;
    for path in [META_PACKAGE, META_CONTENTS, ABI_REVISION_KEY] {
        let local = pipeline.config().output_path(path);
        if !manifest.contains(path) && local.is_file() {
            manifest.add_meta(path, local)?;
        }
    }
    Ok(manifest)
}

fn run_init(pipeline: &Pipeline) -> Result<(), BuildError> {
    let mut manifest = pipeline.load_manifest()?;
    let identity = pipeline.init(&mut manifest)?;
    eprintln!("Initialized package {} (version {})", identity.name, identity.version);
    Ok(())
}

fn run_update(pipeline: &Pipeline) -> Result<(), BuildError> {
    let mut manifest = load_manifest(pipeline)?;
    let index = pipeline.update(&mut manifest)?;
    eprintln!("Updated content index: {} entries", index.len());
    Ok(())
}

fn run_validate(pipeline: &Pipeline) -> Result<(), BuildError> {
    let manifest = load_manifest(pipeline)?;
    pipeline.validate(&manifest)?;
    eprintln!("Package manifest valid: {} entries", manifest.len());
    Ok(())
}

fn run_seal(pipeline: &Pipeline, json: bool) -> Result<(), BuildError> {
    let manifest = load_manifest(pipeline)?;
    let sealed = pipeline.seal_with_digest(&manifest)?;
    print_sealed(&sealed.archive_path, &sealed.digest.to_hex(), json);
    Ok(())
}

fn run_build(
    pipeline: &Pipeline,
    package_manifest: Option<&PathBuf>,
    json: bool,
) -> Result<(), BuildError> {
    let mut manifest = pipeline.load_manifest()?;
    pipeline.init(&mut manifest)?;
    pipeline.update(&mut manifest)?;
    let sealed = pipeline.seal_with_digest(&manifest)?;

    if let Some(path) = package_manifest {
        PackageManifest::from_sealed(pipeline.config(), &manifest)?.write_to_file(path)?;
        eprintln!("Wrote package manifest: {}", path.display());
    }
    print_sealed(&sealed.archive_path, &sealed.digest.to_hex(), json);
    Ok(())
}

fn run_verify(pipeline: &Pipeline, json: bool) -> Result<(), BuildError> {
    let digest = pipeline.verify()?;
    let archive = pipeline.config().output_path(pkgseal::META_FAR);
    if json {
        print_sealed(&archive, &digest.to_hex(), true);
    } else {
        println!("OK {} {}", digest, archive.display());
    }
    Ok(())
}

fn print_sealed(archive: &std::path::Path, digest: &str, json: bool) {
    if json {
        let output = serde_json::json!({
            "archive": archive,
            "digest": digest,
        });
        match serde_json::to_string_pretty(&output) {
            Ok(s) => println!("{}", s),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                process::exit(1);
            }
        }
    } else {
        println!("{}", archive.display());
        println!("{}", digest);
    }
}
