//! Repository identifiers
//!
//! A package is published under a repository host name such as
//! `fuchsia.com`. The identifier becomes the host part of package URLs, so it
//! follows host name rules: dot-separated labels of lowercase ASCII letters,
//! digits and `-`, with no label starting or ending in `-`.

use std::fmt;
use std::str::FromStr;

/// Repository used when the configuration leaves it empty
pub const DEFAULT_REPOSITORY: &str = "fuchsia.com";

const MAX_LEN: usize = 255;
const MAX_LABEL_LEN: usize = 63;

/// Errors for repository identifier validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("Invalid repository identifier {repository:?}: character {ch:?} is not allowed")]
    InvalidCharacter { repository: String, ch: char },

    #[error("Invalid repository identifier {repository:?}: empty label")]
    EmptyLabel { repository: String },

    #[error("Invalid repository identifier {repository:?}: label {label:?} starts or ends with '-'")]
    InvalidLabel { repository: String, label: String },

    #[error("Invalid repository identifier {repository:?}: longer than {max} characters")]
    TooLong { repository: String, max: usize },
}

/// A validated repository identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryId(String);

impl RepositoryId {
    /// Validate `s`; an empty string selects `DEFAULT_REPOSITORY`.
    pub fn parse(s: &str) -> Result<Self, RepositoryError> {
        if s.is_empty() {
            return Ok(Self(DEFAULT_REPOSITORY.to_string()));
        }
        if s.len() > MAX_LEN {
            return Err(RepositoryError::TooLong {
                repository: s.to_string(),
                max: MAX_LEN,
            });
        }
        if let Some(ch) = s
            .chars()
            .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-' || *c == '.'))
        {
            return Err(RepositoryError::InvalidCharacter {
                repository: s.to_string(),
                ch,
            });
        }
        for label in s.split('.') {
            if label.is_empty() {
                return Err(RepositoryError::EmptyLabel {
                    repository: s.to_string(),
                });
            }
            if label.starts_with('-') || label.ends_with('-') || label.len() > MAX_LABEL_LEN {
                return Err(RepositoryError::InvalidLabel {
                    repository: s.to_string(),
                    label: label.to_string(),
                });
            }
        }
        Ok(Self(s.to_string()))
    }

    /// Validate `s`, treating a malformed identifier as a fatal programming
    /// error.
    ///
    /// For callers that construct repository identifiers from constants and
    /// want a bad value to stop the process instead of flowing through error
    /// handling. The build pipeline itself always uses [`RepositoryId::parse`].
    ///
    /// # Panics
    ///
    /// Panics if `s` is not a valid repository identifier.
    pub fn parse_or_abort(s: &str) -> Self {
        match Self::parse(s) {
            Ok(id) => id,
            Err(e) => panic!("{}", e),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RepositoryId {
    fn default() -> Self {
        Self(DEFAULT_REPOSITORY.to_string())
    }
}

impl fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RepositoryId {
    type Err = RepositoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
