//! pkgseal - verifiable content-addressed package builder
//!
//! Turns a set of files plus package identity into a sealed metadata
//! archive (`meta.far`) and a sidecar holding the archive's content digest
//! (`meta.far.merkle`), so the package can be checked independently of how
//! it was built.

pub mod build;
pub mod builder;
pub mod config;
pub mod contents;
pub mod error;
pub mod manifest;
pub mod package_manifest;

pub use build::{
    init, seal, update, validate, verify_sealed, PackageIdentity, Pipeline, SealedArchive,
    ABI_REVISION_KEY, META_CONTENTS, META_FAR, META_FAR_MERKLE, META_PACKAGE, REQUIRED_FILES,
};
pub use builder::{ContentEntries, PackageBuilder, SealedPackage, UpdatedPackage};
pub use config::{AbiRevision, BuildConfig, ConfigError, ConfigLayer, RepositoryId};
pub use contents::ContentIndex;
pub use error::{BuildError, ErrorKind};
pub use manifest::{EntryKind, Manifest};
pub use package_manifest::{load_package_manifest, BlobInfo, PackageManifest};

pub use pkgseal_archive as archive;
pub use pkgseal_digest as digest;
