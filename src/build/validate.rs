//! Validate stage: required metadata

use tracing::debug;

use super::{META_CONTENTS, META_PACKAGE};
use crate::error::{BuildError, Result};
use crate::manifest::Manifest;

/// Metadata entries every package must register before sealing
pub const REQUIRED_FILES: &[&str] = &[META_PACKAGE, META_CONTENTS];

/// Fail with `MissingRequiredFile` naming the first required entry absent
/// from `manifest`. Never mutates anything.
pub fn validate(manifest: &Manifest) -> Result<()> {
    match missing_required_files(manifest).first() {
        Some(missing) => Err(BuildError::MissingRequiredFile(missing.to_string())),
        None => {
            debug!(entries = manifest.len(), "manifest has all required files");
            Ok(())
        }
    }
}

/// Every required entry absent from `manifest`, in `REQUIRED_FILES` order
pub fn missing_required_files(manifest: &Manifest) -> Vec<&'static str> {
    REQUIRED_FILES
        .iter()
        .copied()
        .filter(|path| !manifest.contains(path))
        .collect()
}
