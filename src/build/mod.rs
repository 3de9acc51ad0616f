//! Package build pipeline
//!
//! Four stages run in order against one `BuildConfig` and one `Manifest`:
//!
//! 1. `init` writes the identity record `meta/package`
//! 2. (caller adds content entries to the manifest)
//! 3. `update` hashes content and writes `meta/contents`, plus the ABI
//!    revision record when configured
//! 4. `validate` checks the required metadata is registered
//! 5. `seal` archives the metadata into `meta.far` and writes the archive
//!    digest to `meta.far.merkle`
//!
//! Stages abort on the first error and never roll back files they already
//! wrote; after a failure the build state is undefined until re-run from
//! `init`.

mod init;
mod seal;
mod update;
mod validate;
mod verify;

pub use init::PackageIdentity;
pub use seal::SealedArchive;
pub use validate::{missing_required_files, validate, REQUIRED_FILES};
pub use verify::verify_sealed;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use pkgseal_digest::{ContentHasher, Sha256Hasher};

use crate::config::BuildConfig;
use crate::contents::ContentIndex;
use crate::error::{io_error, BuildError, Result};
use crate::manifest::{ExcludeError, ExcludeRules, Manifest};

/// Identity record
pub const META_PACKAGE: &str = "meta/package";

/// Content index
pub const META_CONTENTS: &str = "meta/contents";

/// ABI revision record (8 bytes, little-endian)
pub const ABI_REVISION_KEY: &str = "meta/fuchsia.pkg/abi-revision";

/// Sealed archive, relative to the output directory
pub const META_FAR: &str = "meta.far";

/// Archive digest sidecar, relative to the output directory
pub const META_FAR_MERKLE: &str = "meta.far.merkle";

/// Per-directory ignore file read when a directory is the build manifest
pub const IGNORE_FILE: &str = ".pkgsealignore";

/// Runs build stages for one configuration
#[derive(Debug, Clone)]
pub struct Pipeline<H = Sha256Hasher> {
    config: BuildConfig,
    hasher: H,
}

impl Pipeline<Sha256Hasher> {
    pub fn new(config: BuildConfig) -> Self {
        Self::with_hasher(config, Sha256Hasher)
    }
}

impl<H: ContentHasher> Pipeline<H> {
    pub fn with_hasher(config: BuildConfig, hasher: H) -> Self {
        Self { config, hasher }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn hasher(&self) -> &H {
        &self.hasher
    }

    /// Load the manifest named by `config.manifest_path` (a manifest file or
    /// a directory), or start empty when none is configured.
    ///
    /// A directory is filtered by the default excludes, `config.exclude` and
    /// the directory's own `.pkgsealignore`, which is never packaged itself.
    pub fn load_manifest(&self) -> Result<Manifest> {
        match &self.config.manifest_path {
            Some(path) if path.is_dir() => {
                let rules = self
                    .exclude_rules(path)
                    .map_err(|e| BuildError::malformed(path.display(), e))?;
                Manifest::from_directory(path, &rules)
            }
            Some(path) => Manifest::from_file(path),
            None => Ok(Manifest::new()),
        }
    }

    fn exclude_rules(&self, dir: &Path) -> Result<ExcludeRules, ExcludeError> {
        let patterns: Vec<&str> = self.config.exclude.iter().map(String::as_str).collect();
        let rules = ExcludeRules::new()?
            .with_patterns(&[IGNORE_FILE])?
            .with_patterns(&patterns)?;

        let ignore_file = dir.join(IGNORE_FILE);
        if ignore_file.is_file() {
            rules.with_ignore_file(&ignore_file)
        } else {
            Ok(rules)
        }
    }

    /// Required metadata check; see [`validate`]
    pub fn validate(&self, manifest: &Manifest) -> Result<()> {
        validate(manifest)
    }
}

/// Write the identity record with the default hasher
pub fn init(config: &BuildConfig, manifest: &mut Manifest) -> Result<PackageIdentity> {
    Pipeline::new(config.clone()).init(manifest)
}

/// Compute digests and write the content index with the default hasher
pub fn update(config: &BuildConfig, manifest: &mut Manifest) -> Result<ContentIndex> {
    Pipeline::new(config.clone()).update(manifest)
}

/// Archive the metadata and write the digest sidecar with the default hasher
pub fn seal(config: &BuildConfig, manifest: &Manifest) -> Result<PathBuf> {
    Pipeline::new(config.clone()).seal(manifest)
}

/// Replace `path` with `bytes` via a temp file in the same directory,
/// creating parent directories as needed.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(io_error(parent))?;

    let mut file = NamedTempFile::new_in(parent).map_err(io_error(parent))?;
    file.write_all(bytes).map_err(io_error(path))?;
    file.as_file().sync_all().map_err(io_error(path))?;
    file.persist(path).map_err(|e| io_error(path)(e.error))?;
    Ok(())
}
