//! Build configuration
//!
//! A build is driven by one explicit `BuildConfig` value, assembled from
//! layers in precedence order:
//! 1. Built-in defaults
//! 2. Config file (TOML)
//! 3. CLI flags

mod build_config;
mod repository;

pub use build_config::{AbiRevision, BuildConfig, ConfigError, ConfigLayer};
pub use repository::{RepositoryError, RepositoryId, DEFAULT_REPOSITORY};
