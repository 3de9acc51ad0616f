//! Build manifest: the working set of one package build
//!
//! Maps package-relative paths to the local files that provide them. Every
//! entry is tagged when it is inserted as either metadata (the `meta/`
//! namespace, archived into the sealed package) or content (payload files
//! recorded by digest in `meta/contents`).

mod exclude;
mod load;

pub use exclude::{ExcludeError, ExcludeRules};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{BuildError, Result};

/// Package path prefix reserved for metadata entries
pub const META_PREFIX: &str = "meta/";

/// Which partition of the manifest an entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Meta,
    Content,
}

impl EntryKind {
    /// Classify a package path by the `meta/` naming convention
    pub fn for_path(path: &str) -> Self {
        if path.starts_with(META_PREFIX) {
            EntryKind::Meta
        } else {
            EntryKind::Content
        }
    }
}

/// A single manifest entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub kind: EntryKind,
    /// Local file providing the entry's bytes
    pub source: PathBuf,
}

/// Mapping from package-relative path to local source file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: BTreeMap<String, ManifestEntry>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a metadata entry, replacing any previous registration of
    /// `path`. The path must live under `meta/`.
    pub fn add_meta(&mut self, path: &str, source: impl Into<PathBuf>) -> Result<()> {
        validate_package_path(path)?;
        if EntryKind::for_path(path) != EntryKind::Meta {
            return Err(BuildError::invalid_path(
                path,
                "metadata entries must be under meta/",
            ));
        }
        self.put(path, EntryKind::Meta, source.into());
        Ok(())
    }

    /// Register a content entry, replacing any previous registration of
    /// `path`. The `meta` namespace is rejected.
    pub fn add_content(&mut self, path: &str, source: impl Into<PathBuf>) -> Result<()> {
        validate_package_path(path)?;
        if EntryKind::for_path(path) != EntryKind::Content || path == "meta" {
            return Err(BuildError::invalid_path(
                path,
                "the meta namespace is reserved for package metadata",
            ));
        }
        self.put(path, EntryKind::Content, source.into());
        Ok(())
    }

    /// Register an entry, classifying it by its path
    pub fn insert(&mut self, path: &str, source: impl Into<PathBuf>) -> Result<()> {
        match EntryKind::for_path(path) {
            EntryKind::Meta => self.add_meta(path, source),
            EntryKind::Content => self.add_content(path, source),
        }
    }

    fn put(&mut self, path: &str, kind: EntryKind, source: PathBuf) {
        self.entries
            .insert(path.to_string(), ManifestEntry { kind, source });
    }

    /// Remove an entry. The build stages never call this.
    pub fn remove(&mut self, path: &str) -> Option<ManifestEntry> {
        self.entries.remove(path)
    }

    pub fn get(&self, path: &str) -> Option<&ManifestEntry> {
        self.entries.get(path)
    }

    /// Local source of `path`, if registered
    pub fn source(&self, path: &str) -> Option<&Path> {
        self.entries.get(path).map(|e| e.source.as_path())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in path order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ManifestEntry)> {
        self.entries.iter().map(|(p, e)| (p.as_str(), e))
    }

    /// Metadata entries only
    pub fn meta(&self) -> BTreeMap<&str, &Path> {
        self.view(EntryKind::Meta)
    }

    /// Content entries only
    pub fn content(&self) -> BTreeMap<&str, &Path> {
        self.view(EntryKind::Content)
    }

    fn view(&self, kind: EntryKind) -> BTreeMap<&str, &Path> {
        self.entries
            .iter()
            .filter(|(_, e)| e.kind == kind)
            .map(|(p, e)| (p.as_str(), e.source.as_path()))
            .collect()
    }
}

/// Check that `path` is a clean relative package path
pub fn validate_package_path(path: &str) -> Result<()> {
    let reason = if path.is_empty() {
        Some("empty path")
    } else if path.starts_with('/') {
        Some("absolute paths are not allowed")
    } else if path.ends_with('/') {
        Some("trailing '/'")
    } else if path.chars().any(char::is_control) {
        Some("control characters are not allowed")
    } else if path.split('/').any(|s| s.is_empty()) {
        Some("empty path segment")
    } else if path.split('/').any(|s| s == "." || s == "..") {
        Some("'.' and '..' segments are not allowed")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(BuildError::invalid_path(path, reason)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn sample() -> Manifest {
        let mut m = Manifest::new();
        m.add_meta("meta/package", "/out/meta/package").unwrap();
        m.add_content("bin/app", "/src/app").unwrap();
        m.add_content("lib/libc.so", "/src/libc.so").unwrap();
        m
    }

    #[test]
    fn test_views_partition_entries() {
        let m = sample();
        let meta: Vec<&str> = m.meta().keys().copied().collect();
        let content: Vec<&str> = m.content().keys().copied().collect();

        assert_eq!(meta, vec!["meta/package"]);
        assert_eq!(content, vec!["bin/app", "lib/libc.so"]);
        assert_eq!(m.len(), 3);
    }

    #[test]
    fn test_insert_classifies_by_prefix() {
        let mut m = Manifest::new();
        m.insert("meta/foo.cm", "/a").unwrap();
        m.insert("data/meta/x", "/b").unwrap();

        assert_eq!(m.get("meta/foo.cm").unwrap().kind, EntryKind::Meta);
        assert_eq!(m.get("data/meta/x").unwrap().kind, EntryKind::Content);
    }

    #[test]
    fn test_tag_mismatch_rejected() {
        let mut m = Manifest::new();
        assert_eq!(
            m.add_meta("bin/app", "/a").unwrap_err().kind(),
            ErrorKind::MalformedManifest
        );
        assert!(m.add_content("meta/package", "/a").is_err());
        assert!(m.add_content("meta", "/a").is_err());
        assert!(m.is_empty());
    }

    #[test]
    fn test_readd_overwrites() {
        let mut m = sample();
        m.add_meta("meta/package", "/elsewhere").unwrap();
        assert_eq!(m.source("meta/package"), Some(Path::new("/elsewhere")));
        assert_eq!(m.len(), 3);
    }

    #[test]
    fn test_remove_and_restore() {
        let mut m = sample();
        let entry = m.remove("meta/package").unwrap();
        assert!(!m.contains("meta/package"));

        m.add_meta("meta/package", entry.source).unwrap();
        assert!(m.contains("meta/package"));
    }

    #[test]
    fn test_invalid_paths() {
        for path in [
            "",
            "/bin/app",
            "bin/",
            "bin//app",
            "./app",
            "a/../b",
            "a\0b",
            "bin/app\nevil",
            "bin/app\r",
            "tab\there",
        ] {
            assert!(
                validate_package_path(path).is_err(),
                "{:?} should be rejected",
                path
            );
        }
        assert!(validate_package_path("bin/app").is_ok());
        assert!(validate_package_path(".hidden/file").is_ok());
    }

    #[test]
    fn test_line_breaks_rejected_at_insertion() {
        let mut m = Manifest::new();
        let err = m.add_content("bin/app\nevil", "/src/app").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::MalformedManifest);
        assert!(m.insert("meta/x\r", "/src/x").is_err());
        assert!(m.is_empty());
    }
}
