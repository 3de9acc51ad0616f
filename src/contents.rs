//! Content index (`meta/contents`)
//!
//! One `path=digest` line per content entry, sorted by path, each line
//! newline-terminated.

use std::fmt;

use pkgseal_digest::ContentDigest;

use crate::error::{BuildError, Result};

/// Typed form of the `meta/contents` record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentIndex {
    entries: Vec<(String, ContentDigest)>,
}

impl ContentIndex {
    /// Build an index, sorting entries by path
    pub fn new(mut entries: Vec<(String, ContentDigest)>) -> Self {
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Self { entries }
    }

    /// Parse the text form
    pub fn parse(text: &str) -> Result<Self> {
        let mut entries = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            if line.is_empty() {
                continue;
            }
            let location = format!("meta/contents:{}", idx + 1);
            let (path, digest) = line
                .rsplit_once('=')
                .ok_or_else(|| BuildError::malformed(&location, "expected path=digest"))?;
            let digest: ContentDigest = digest
                .parse()
                .map_err(|e| BuildError::malformed(&location, e))?;
            entries.push((path.to_string(), digest));
        }
        Ok(Self::new(entries))
    }

    pub fn get(&self, path: &str) -> Option<&ContentDigest> {
        self.entries
            .binary_search_by(|(p, _)| p.as_str().cmp(path))
            .ok()
            .map(|i| &self.entries[i].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ContentDigest)> {
        self.entries.iter().map(|(p, d)| (p.as_str(), d))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for ContentIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (path, digest) in &self.entries {
            writeln!(f, "{}={}", path, digest)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkgseal_digest::digest_bytes;

    #[test]
    fn test_render_sorted_lines() {
        let a = digest_bytes(b"a");
        let b = digest_bytes(b"b");
        let index = ContentIndex::new(vec![("z/last".into(), b), ("a/first".into(), a)]);

        assert_eq!(
            index.to_string(),
            format!("a/first={}\nz/last={}\n", a, b)
        );
    }

    #[test]
    fn test_empty_renders_empty() {
        assert_eq!(ContentIndex::default().to_string(), "");
    }

    #[test]
    fn test_parse_and_lookup() {
        let d = digest_bytes(b"payload");
        let text = format!("bin/app={}\ndata/x={}\n", d, d);
        let index = ContentIndex::parse(&text).unwrap();

        assert_eq!(index.len(), 2);
        assert_eq!(index.get("data/x"), Some(&d));
        assert_eq!(index.get("missing"), None);
        assert_eq!(index.to_string(), text);
    }

    #[test]
    fn test_parse_errors() {
        assert!(ContentIndex::parse("no-separator\n").is_err());
        assert!(ContentIndex::parse("bin/app=abc\n").is_err());
    }
}
