//! Init stage: package identity record

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

use pkgseal_digest::ContentHasher;

use super::{write_atomic, Pipeline, META_PACKAGE};
use crate::error::{io_error, BuildError, Result};
use crate::manifest::Manifest;

/// Identity version written by this builder
pub const PACKAGE_VERSION: &str = "0";

/// Contents of `meta/package`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageIdentity {
    pub name: String,
    pub version: String,
}

impl PackageIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: PACKAGE_VERSION.to_string(),
        }
    }
}

impl<H: ContentHasher> Pipeline<H> {
    /// Write `meta/package` under the output directory and register it.
    ///
    /// The package name is `config.pkg_name`, or the base name of the output
    /// directory when that is empty. Running `init` again rewrites the record.
    pub fn init(&self, manifest: &mut Manifest) -> Result<PackageIdentity> {
        let config = self.config();
        fs::create_dir_all(&config.output_dir).map_err(io_error(&config.output_dir))?;

        let name = if config.pkg_name.is_empty() {
            default_package_name(&config.output_dir)?
        } else {
            config.pkg_name.clone()
        };
        let identity = PackageIdentity::new(name);

        let json = serde_json::to_vec(&identity).map_err(|e| BuildError::malformed(META_PACKAGE, e))?;
        let path = config.output_path(META_PACKAGE);
        write_atomic(&path, &json)?;
        manifest.add_meta(META_PACKAGE, path)?;

        info!(name = %identity.name, version = %identity.version, "initialized package");
        Ok(identity)
    }
}

/// Base name of the output directory, resolving `.`-style paths first
fn default_package_name(output_dir: &Path) -> Result<String> {
    let resolved;
    let dir = if output_dir.file_name().is_some() {
        output_dir
    } else {
        resolved = fs::canonicalize(output_dir).map_err(io_error(output_dir))?;
        resolved.as_path()
    };

    dir.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            BuildError::invalid_path(
                &output_dir.display().to_string(),
                "output directory has no usable base name for the package name",
            )
        })
}
