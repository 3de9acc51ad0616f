//! Staged package builder
//!
//! Wraps the pipeline so each stage can only run after the one before it:
//! content entries are added between `init` and `update`, and become
//! read-only once `update` has consumed the builder.

use std::path::{Path, PathBuf};

use pkgseal_digest::{ContentHasher, Sha256Hasher};

use crate::build::{Pipeline, SealedArchive};
use crate::config::BuildConfig;
use crate::contents::ContentIndex;
use crate::error::Result;
use crate::manifest::{Manifest, ManifestEntry};
use crate::package_manifest::PackageManifest;

/// An initialized package accepting content entries
#[derive(Debug)]
pub struct PackageBuilder<H = Sha256Hasher> {
    pipeline: Pipeline<H>,
    manifest: Manifest,
}

impl PackageBuilder<Sha256Hasher> {
    /// Run `init` against an empty manifest
    pub fn init(config: BuildConfig) -> Result<Self> {
        Self::init_with(Pipeline::new(config), Manifest::new())
    }
}

impl<H: ContentHasher> PackageBuilder<H> {
    /// Run `init` against an existing manifest (e.g. one loaded from disk)
    pub fn init_with(pipeline: Pipeline<H>, mut manifest: Manifest) -> Result<Self> {
        pipeline.init(&mut manifest)?;
        Ok(Self { pipeline, manifest })
    }

    /// Handle for adding or removing content entries
    pub fn content_mut(&mut self) -> ContentEntries<'_> {
        ContentEntries {
            manifest: &mut self.manifest,
        }
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn config(&self) -> &BuildConfig {
        self.pipeline.config()
    }

    /// Finalize content and run `update`
    pub fn update(mut self) -> Result<UpdatedPackage<H>> {
        let contents = self.pipeline.update(&mut self.manifest)?;
        Ok(UpdatedPackage {
            pipeline: self.pipeline,
            manifest: self.manifest,
            contents,
        })
    }
}

/// Content-only view of a manifest under construction
#[derive(Debug)]
pub struct ContentEntries<'a> {
    manifest: &'a mut Manifest,
}

impl ContentEntries<'_> {
    /// Add or replace a content entry
    pub fn add(&mut self, path: &str, source: impl Into<PathBuf>) -> Result<&mut Self> {
        self.manifest.add_content(path, source)?;
        Ok(self)
    }

    /// Remove a content entry. Metadata entries are left alone.
    pub fn remove(&mut self, path: &str) -> Option<ManifestEntry> {
        if self.manifest.content().contains_key(path) {
            self.manifest.remove(path)
        } else {
            None
        }
    }

    pub fn source(&self, path: &str) -> Option<&Path> {
        self.manifest.content().get(path).copied()
    }

    pub fn len(&self) -> usize {
        self.manifest.content().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A package whose content index has been written
#[derive(Debug)]
pub struct UpdatedPackage<H = Sha256Hasher> {
    pipeline: Pipeline<H>,
    manifest: Manifest,
    contents: ContentIndex,
}

impl<H: ContentHasher> UpdatedPackage<H> {
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn contents(&self) -> &ContentIndex {
        &self.contents
    }

    /// Check required metadata without sealing
    pub fn validate(&self) -> Result<()> {
        self.pipeline.validate(&self.manifest)
    }

    /// Run `seal`
    pub fn seal(self) -> Result<SealedPackage> {
        let archive = self.pipeline.seal_with_digest(&self.manifest)?;
        Ok(SealedPackage {
            config: self.pipeline.config().clone(),
            manifest: self.manifest,
            contents: self.contents,
            archive,
        })
    }
}

/// Result of a complete build
#[derive(Debug)]
pub struct SealedPackage {
    pub config: BuildConfig,
    pub manifest: Manifest,
    pub contents: ContentIndex,
    pub archive: SealedArchive,
}

impl SealedPackage {
    pub fn archive_path(&self) -> &Path {
        &self.archive.archive_path
    }

    /// Package manifest describing this build
    pub fn package_manifest(&self) -> Result<PackageManifest> {
        PackageManifest::from_sealed(&self.config, &self.manifest)
    }
}
