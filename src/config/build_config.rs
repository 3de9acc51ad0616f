//! Build configuration values and layering

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::repository::{RepositoryError, RepositoryId};

/// Errors for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", path.display())]
    IoError { path: PathBuf, source: io::Error },

    #[error("Failed to parse config {}: {source}", path.display())]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Missing required config value: {0}")]
    MissingField(&'static str),

    #[error("Invalid ABI revision {0:?}: expected a decimal or 0x-prefixed hex u64")]
    InvalidAbiRevision(String),
}

/// Opaque 64-bit compatibility marker recorded in the package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AbiRevision(pub u64);

impl AbiRevision {
    /// The 8-byte little-endian record stored in the package
    pub fn to_le_bytes(self) -> [u8; 8] {
        self.0.to_le_bytes()
    }

    pub fn from_le_bytes(bytes: [u8; 8]) -> Self {
        Self(u64::from_le_bytes(bytes))
    }
}

impl fmt::Display for AbiRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.0)
    }
}

impl FromStr for AbiRevision {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let parsed = match trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        {
            Some(hex) => u64::from_str_radix(hex, 16),
            None => trimmed.parse::<u64>(),
        };
        parsed
            .map(AbiRevision)
            .map_err(|_| ConfigError::InvalidAbiRevision(s.to_string()))
    }
}

// TOML integers are i64, so large revisions are written as strings.
impl Serialize for AbiRevision {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for AbiRevision {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(u64),
            Str(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Int(v) => Ok(AbiRevision(v)),
            Raw::Str(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Configuration for one package build
#[derive(Debug, Clone, PartialEq)]
pub struct BuildConfig {
    /// Package name; empty means the base name of `output_dir`
    pub pkg_name: String,

    /// ABI revision to record, if any
    pub abi_revision: Option<AbiRevision>,

    /// Directory receiving metadata files, the sealed archive and its sidecar
    pub output_dir: PathBuf,

    /// Scratch directory for staging the archive
    pub temp_dir: PathBuf,

    /// Repository identifier; empty means `DEFAULT_REPOSITORY`
    pub repository: String,

    /// Build manifest file or directory listing the package contents
    pub manifest_path: Option<PathBuf>,

    /// Extra glob patterns skipped when `manifest_path` is a directory
    pub exclude: Vec<String>,
}

impl BuildConfig {
    /// Built-in defaults for a build writing into `output_dir`
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            pkg_name: String::new(),
            abi_revision: None,
            output_dir: output_dir.into(),
            temp_dir: std::env::temp_dir(),
            repository: String::new(),
            manifest_path: None,
            exclude: Vec::new(),
        }
    }

    pub fn with_pkg_name(mut self, name: impl Into<String>) -> Self {
        self.pkg_name = name.into();
        self
    }

    pub fn with_abi_revision(mut self, revision: u64) -> Self {
        self.abi_revision = Some(AbiRevision(revision));
        self
    }

    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    pub fn with_repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = repository.into();
        self
    }

    pub fn with_exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude.push(pattern.into());
        self
    }

    pub fn with_manifest_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.manifest_path = Some(path.into());
        self
    }

    /// Merge layers over the built-in defaults. Later layers win.
    pub fn from_layers<I>(layers: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = ConfigLayer>,
    {
        let merged = layers
            .into_iter()
            .fold(ConfigLayer::default(), ConfigLayer::merge);

        let output_dir = merged.output_dir.ok_or(ConfigError::MissingField("output_dir"))?;
        let mut config = BuildConfig::new(output_dir);
        if let Some(name) = merged.pkg_name {
            config.pkg_name = name;
        }
        config.abi_revision = merged.abi_revision;
        if let Some(dir) = merged.temp_dir {
            config.temp_dir = dir;
        }
        if let Some(repository) = merged.repository {
            config.repository = repository;
        }
        config.manifest_path = merged.manifest_path;
        config.exclude = merged.exclude.unwrap_or_default();
        Ok(config)
    }

    /// Load a config file on its own
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        Self::from_layers([ConfigLayer::from_toml_file(path)?])
    }

    /// Validated repository identifier
    pub fn repository_id(&self) -> Result<RepositoryId, RepositoryError> {
        RepositoryId::parse(&self.repository)
    }

    /// Local path of a package-relative metadata file under `output_dir`
    pub fn output_path(&self, package_path: &str) -> PathBuf {
        package_path
            .split('/')
            .fold(self.output_dir.clone(), |acc, seg| acc.join(seg))
    }
}

/// One configuration layer; unset fields defer to lower layers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigLayer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pkg_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abi_revision: Option<AbiRevision>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_dir: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_path: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Vec<String>>,
}

impl ConfigLayer {
    /// Parse a TOML config file. Relative paths are resolved against the
    /// directory containing the file.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::IoError {
            path: path.to_path_buf(),
            source,
        })?;
        let mut layer: ConfigLayer =
            toml::from_str(&contents).map_err(|source| ConfigError::ParseError {
                path: path.to_path_buf(),
                source,
            })?;

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        for dir in [
            &mut layer.output_dir,
            &mut layer.temp_dir,
            &mut layer.manifest_path,
        ]
        .into_iter()
        .flatten()
        {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
        Ok(layer)
    }

    /// Overlay `other` onto `self`
    pub fn merge(self, other: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            pkg_name: other.pkg_name.or(self.pkg_name),
            abi_revision: other.abi_revision.or(self.abi_revision),
            output_dir: other.output_dir.or(self.output_dir),
            temp_dir: other.temp_dir.or(self.temp_dir),
            repository: other.repository.or(self.repository),
            manifest_path: other.manifest_path.or(self.manifest_path),
            exclude: other.exclude.or(self.exclude),
        }
    }
}
