//! Loading build manifests from disk

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use super::{ExcludeRules, Manifest};
use crate::error::{read_error, BuildError, Result};

impl Manifest {
    /// Load a build manifest file.
    ///
    /// Each non-empty line maps a package path to a local file as
    /// `package/path=local/path`. Lines starting with `#` are comments. A
    /// package path may appear only once.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(read_error(path))?;
        let mut manifest = Manifest::new();

        for (idx, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let location = format!("{}:{}", path.display(), idx + 1);

            let (package_path, source) = line
                .split_once('=')
                .ok_or_else(|| BuildError::malformed(&location, "expected package/path=local/path"))?;
            let (package_path, source) = (package_path.trim(), source.trim());

            if source.is_empty() {
                return Err(BuildError::malformed(&location, "empty source path"));
            }
            if manifest.contains(package_path) {
                return Err(BuildError::malformed(
                    &location,
                    format!("duplicate package path {:?}", package_path),
                ));
            }
            manifest
                .insert(package_path, source)
                .map_err(|e| BuildError::malformed(&location, e))?;
        }

        debug!(path = %path.display(), entries = manifest.len(), "loaded build manifest");
        Ok(manifest)
    }

    /// Build a manifest from every regular file under `dir`, skipping paths
    /// matched by `rules`. Files under `dir/meta/` become metadata entries.
    pub fn from_directory(dir: &Path, rules: &ExcludeRules) -> Result<Self> {
        if !dir.is_dir() {
            return Err(BuildError::NotFound(dir.to_path_buf()));
        }
        let mut manifest = Manifest::new();

        let walker = WalkDir::new(dir)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| match e.path().strip_prefix(dir) {
                Ok(rel) => rel.as_os_str().is_empty() || !rules.is_excluded(rel),
                Err(_) => true,
            });

        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf());
                BuildError::Io {
                    path,
                    source: io::Error::from(e),
                }
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let package_path = package_path_for(dir, entry.path())?;
            manifest.insert(&package_path, entry.path().to_path_buf())?;
        }

        debug!(dir = %dir.display(), entries = manifest.len(), "loaded directory manifest");
        Ok(manifest)
    }
}

/// Slash-separated path of `file` relative to `root`
fn package_path_for(root: &Path, file: &Path) -> Result<String> {
    let rel = file
        .strip_prefix(root)
        .map_err(|_| BuildError::malformed(file.display(), "outside of manifest directory"))?;

    let segments: Option<Vec<&str>> = rel.iter().map(|s| s.to_str()).collect();
    match segments {
        Some(segments) => Ok(segments.join("/")),
        None => Err(BuildError::malformed(
            PathBuf::from(rel).display(),
            "path is not valid UTF-8",
        )),
    }
}
