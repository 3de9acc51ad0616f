//! Independent check of a sealed archive against its sidecar

use std::fs;
use std::path::Path;

use pkgseal_digest::{ContentDigest, ContentHasher, Sha256Hasher};

use super::{Pipeline, META_FAR, META_FAR_MERKLE};
use crate::error::{read_error, BuildError, Result};

impl<H: ContentHasher> Pipeline<H> {
    /// Re-hash the sealed archive in the output directory and compare it
    /// with the sidecar
    pub fn verify(&self) -> Result<ContentDigest> {
        verify_with(self.hasher(), &self.config().output_dir)
    }
}

/// Re-hash `output_dir/meta.far` and compare it with `meta.far.merkle`.
///
/// The sidecar must hold exactly the lowercase hex digest, with no
/// surrounding whitespace.
pub fn verify_sealed(output_dir: &Path) -> Result<ContentDigest> {
    verify_with(&Sha256Hasher, output_dir)
}

fn verify_with<H: ContentHasher>(hasher: &H, output_dir: &Path) -> Result<ContentDigest> {
    let archive_path = output_dir.join(META_FAR);
    let sidecar_path = output_dir.join(META_FAR_MERKLE);

    let archive = fs::read(&archive_path).map_err(read_error(&archive_path))?;
    let recorded = fs::read_to_string(&sidecar_path).map_err(read_error(&sidecar_path))?;

    let actual = hasher.digest_bytes(&archive);
    if recorded != actual.to_hex() {
        return Err(BuildError::DigestMismatch {
            path: archive_path,
            expected: recorded,
            actual: actual.to_hex(),
        });
    }
    Ok(actual)
}
