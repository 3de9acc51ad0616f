//! Package manifest (`package_manifest.json`)
//!
//! A serialized description of a built package's blobs and their content
//! digests. Downstream tools load it to validate or reproduce a build without
//! re-hashing every file.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use pkgseal_digest::ContentDigest;

use crate::build::{write_atomic, PackageIdentity, META_CONTENTS, META_FAR, META_FAR_MERKLE, META_PACKAGE};
use crate::config::BuildConfig;
use crate::contents::ContentIndex;
use crate::error::{io_error, read_error, BuildError, Result};
use crate::manifest::Manifest;

/// The only package manifest version this crate reads or writes
pub const PACKAGE_MANIFEST_VERSION: &str = "1";

/// Package path under which the sealed archive is listed
pub const META_FAR_BLOB_PATH: &str = "meta/";

/// One blob of a package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobInfo {
    /// Local file the blob was built from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<PathBuf>,

    /// Package-relative path (`meta/` for the sealed archive)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Content digest of the blob
    pub merkle: ContentDigest,

    /// Size in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// Package manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageManifest {
    /// Format version, always `"1"`
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<PackageIdentity>,

    /// Blobs in package order: the sealed archive first, then content
    #[serde(default)]
    pub blobs: Vec<BlobInfo>,
}

/// Load and check a package manifest.
///
/// Missing file is `NotFound`; anything that is not the expected JSON shape,
/// including a digest that does not decode, is `MalformedManifest`; a
/// `version` other than the string `"1"` (or no `version`) is
/// `IncompatibleVersion`.
pub fn load_package_manifest(path: &Path) -> Result<PackageManifest> {
    let bytes = fs::read(path).map_err(read_error(path))?;
    let value: Value =
        serde_json::from_slice(&bytes).map_err(|e| BuildError::malformed(path.display(), e))?;

    let fields = value
        .as_object()
        .ok_or_else(|| BuildError::malformed(path.display(), "expected a JSON object"))?;

    match fields.get("version") {
        Some(Value::String(v)) if v == PACKAGE_MANIFEST_VERSION => {}
        Some(other) => {
            return Err(BuildError::IncompatibleVersion {
                path: path.to_path_buf(),
                found: other.to_string(),
            })
        }
        None => {
            return Err(BuildError::IncompatibleVersion {
                path: path.to_path_buf(),
                found: "<missing>".to_string(),
            })
        }
    }

    serde_json::from_value(value).map_err(|e| BuildError::malformed(path.display(), e))
}

impl PackageManifest {
    /// Describe a sealed build: the archive digest from the sidecar and the
    /// content digests from `meta/contents`.
    pub fn from_sealed(config: &BuildConfig, manifest: &Manifest) -> Result<Self> {
        let identity_path = required_source(manifest, META_PACKAGE)?;
        let identity_bytes = fs::read(identity_path).map_err(read_error(identity_path))?;
        let identity: PackageIdentity = serde_json::from_slice(&identity_bytes)
            .map_err(|e| BuildError::malformed(META_PACKAGE, e))?;

        let contents_path = required_source(manifest, META_CONTENTS)?;
        let contents = fs::read_to_string(contents_path).map_err(read_error(contents_path))?;
        let index = ContentIndex::parse(&contents)?;

        let archive_path = config.output_path(META_FAR);
        let sidecar_path = config.output_path(META_FAR_MERKLE);
        let sidecar = fs::read_to_string(&sidecar_path).map_err(read_error(&sidecar_path))?;
        let archive_digest: ContentDigest = sidecar
            .parse()
            .map_err(|e| BuildError::malformed(sidecar_path.display(), e))?;

        let mut blobs = vec![BlobInfo {
            size: Some(file_size(&archive_path)?),
            source_path: Some(archive_path),
            path: Some(META_FAR_BLOB_PATH.to_string()),
            merkle: archive_digest,
        }];

        for (path, digest) in index.iter() {
            let source = manifest.source(path).ok_or_else(|| {
                BuildError::malformed(META_CONTENTS, format!("{} is not in the build manifest", path))
            })?;
            blobs.push(BlobInfo {
                source_path: Some(source.to_path_buf()),
                path: Some(path.to_string()),
                merkle: *digest,
                size: Some(file_size(source)?),
            });
        }

        Ok(Self {
            version: PACKAGE_MANIFEST_VERSION.to_string(),
            repository: Some(config.repository_id()?.to_string()),
            package: Some(identity),
            blobs,
        })
    }

    /// The sealed archive's blob, if listed
    pub fn meta_far(&self) -> Option<&BlobInfo> {
        self.blobs
            .iter()
            .find(|b| b.path.as_deref() == Some(META_FAR_BLOB_PATH))
    }

    /// Write as pretty JSON
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| BuildError::malformed(path.display(), e))?;
        write_atomic(path, &json)
    }
}

fn required_source<'a>(manifest: &'a Manifest, path: &str) -> Result<&'a Path> {
    manifest
        .source(path)
        .ok_or_else(|| BuildError::MissingRequiredFile(path.to_string()))
}

fn file_size(path: &Path) -> Result<u64> {
    Ok(fs::metadata(path).map_err(io_error(path))?.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    const ZERO: &str = "0000000000000000000000000000000000000000000000000000000000000000";

    fn load(contents: Option<&str>) -> Result<PackageManifest> {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("package_manifest.json");
        if let Some(contents) = contents {
            fs::write(&path, contents).unwrap();
        }
        load_package_manifest(&path)
    }

    #[test]
    fn test_load_valid() {
        let manifest = load(Some(&format!(
            r#"{{ "version": "1", "blobs": [ {{ "merkle": "{}" }} ] }}"#,
            ZERO
        )))
        .unwrap();

        assert_eq!(manifest.version, "1");
        assert_eq!(manifest.blobs.len(), 1);
        assert_eq!(manifest.blobs[0].merkle, ContentDigest::from_bytes([0; 32]));
        assert!(manifest.blobs[0].path.is_none());
    }

    #[test]
    fn test_load_missing_file() {
        assert_eq!(load(None).unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_load_incompatible_versions() {
        for body in [
            r#"{ "version": "2", "blobs": [] }"#,
            r#"{ "version": 1, "blobs": [] }"#,
            r#"{ "version": "", "blobs": [] }"#,
            r#"{ "blobs": [] }"#,
        ] {
            assert_eq!(
                load(Some(body)).unwrap_err().kind(),
                ErrorKind::IncompatibleVersion,
                "{}",
                body
            );
        }
    }

    #[test]
    fn test_load_malformed() {
        for body in [
            "{ Oops. This is not valid json. }",
            r#"{ "version": "2", }"#,
            r#"["version", "1"]"#,
            r#"{ "version": "1", "blobs": [ { "merkle": "abc" } ] }"#,
            r#"{ "version": "1", "blobs": [ {} ] }"#,
            r#"{ "version": "1", "blobs": {} }"#,
        ] {
            assert_eq!(
                load(Some(body)).unwrap_err().kind(),
                ErrorKind::MalformedManifest,
                "{}",
                body
            );
        }
    }

    #[test]
    fn test_write_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out/package_manifest.json");
        let manifest = PackageManifest {
            version: PACKAGE_MANIFEST_VERSION.to_string(),
            repository: Some("fuchsia.com".into()),
            package: Some(PackageIdentity::new("hello")),
            blobs: vec![BlobInfo {
                source_path: Some(dir.path().join("meta.far")),
                path: Some(META_FAR_BLOB_PATH.into()),
                merkle: ZERO.parse().unwrap(),
                size: Some(12),
            }],
        };

        manifest.write_to_file(&path).unwrap();
        let loaded = load_package_manifest(&path).unwrap();
        assert_eq!(loaded, manifest);
        assert_eq!(loaded.meta_far().unwrap().size, Some(12));
    }
}
