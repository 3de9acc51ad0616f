//! Seal stage: metadata archive and digest sidecar

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use pkgseal_archive::ArchiveBuilder;
use pkgseal_digest::{ContentDigest, ContentHasher};

use super::{validate, write_atomic, Pipeline, META_FAR, META_FAR_MERKLE};
use crate::config::RepositoryId;
use crate::error::{io_error, Result};
use crate::manifest::Manifest;

/// Outputs of a successful seal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedArchive {
    /// `meta.far` under the output directory
    pub archive_path: PathBuf,
    /// `meta.far.merkle` under the output directory
    pub digest_path: PathBuf,
    /// Digest of the archive bytes
    pub digest: ContentDigest,
    /// Repository the package was sealed for
    pub repository: RepositoryId,
}

impl<H: ContentHasher> Pipeline<H> {
    /// Seal the package and return the archive path
    pub fn seal(&self, manifest: &Manifest) -> Result<PathBuf> {
        Ok(self.seal_with_digest(manifest)?.archive_path)
    }

    /// Seal the package.
    ///
    /// The repository identifier and required entries are checked before
    /// anything is written. Every metadata entry is archived under its
    /// package path; the archive's digest is written, bare hex with no
    /// trailing newline, to the sidecar.
    pub fn seal_with_digest(&self, manifest: &Manifest) -> Result<SealedArchive> {
        let config = self.config();
        let repository = config.repository_id()?;
        validate(manifest)?;

        let mut builder = ArchiveBuilder::new();
        for (path, source) in manifest.meta() {
            builder.add_file(path, source)?;
        }
        let bytes = builder.build()?;
        let digest = self.hasher().digest_bytes(&bytes);

        let archive_path = config.output_path(META_FAR);
        stage_and_persist(&config.temp_dir, &archive_path, &bytes)?;

        let digest_path = config.output_path(META_FAR_MERKLE);
        write_atomic(&digest_path, digest.to_hex().as_bytes())?;

        info!(
            path = %archive_path.display(),
            entries = builder.len(),
            digest = %digest,
            repository = %repository,
            "sealed package"
        );
        Ok(SealedArchive {
            archive_path,
            digest_path,
            digest,
            repository,
        })
    }
}

/// Write `bytes` to a temp file in `temp_dir` and move it to `dest`. When
/// the move fails (e.g. `temp_dir` is on another filesystem) the bytes are
/// written next to `dest` instead.
fn stage_and_persist(temp_dir: &Path, dest: &Path, bytes: &[u8]) -> Result<()> {
    fs::create_dir_all(temp_dir).map_err(io_error(temp_dir))?;
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }

    let mut staged = NamedTempFile::new_in(temp_dir).map_err(io_error(temp_dir))?;
    staged.write_all(bytes).map_err(io_error(staged.path()))?;

    match staged.persist(dest) {
        Ok(_) => Ok(()),
        Err(e) => {
            debug!(error = %e.error, "staged archive could not be moved, writing in place");
            write_atomic(dest, bytes)
        }
    }
}
