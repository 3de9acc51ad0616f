//! Sealed archive container
//!
//! Builds canonical tar archives from named entries and reads them back by
//! name. Canonical means the bytes depend only on the entry names and
//! contents: entries are written in name order with zeroed timestamps and
//! ownership and a fixed mode, so identical inputs give identical archives.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use tar::{Archive, Builder, EntryType, Header};
use tracing::debug;

/// File mode recorded for every entry
const ENTRY_MODE: u32 = 0o644;

/// Errors for archive operations
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Failed to read entry source {path}: {source}")]
    SourceError { path: PathBuf, source: io::Error },

    #[error("Entry not found in archive: {0}")]
    NotFound(String),

    #[error("Duplicate archive entry: {0}")]
    DuplicateEntry(String),

    #[error("Invalid archive entry name: {0:?}")]
    InvalidEntryName(String),

    #[error("Unsupported entry type for {name}")]
    UnsupportedEntry { name: String },
}

impl ArchiveError {
    /// Whether this error means the requested entry does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, ArchiveError::NotFound(_))
    }
}

/// Where the bytes for an entry come from
#[derive(Debug, Clone)]
enum EntrySource {
    File(PathBuf),
    Bytes(Vec<u8>),
}

/// Collects named entries and writes them as one canonical archive
#[derive(Debug, Default)]
pub struct ArchiveBuilder {
    entries: BTreeMap<String, EntrySource>,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry whose contents are read from `path` when the archive is
    /// written
    pub fn add_file(&mut self, name: &str, path: impl Into<PathBuf>) -> Result<(), ArchiveError> {
        self.insert(name, EntrySource::File(path.into()))
    }

    /// Add an entry with in-memory contents
    pub fn add_bytes(&mut self, name: &str, data: impl Into<Vec<u8>>) -> Result<(), ArchiveError> {
        self.insert(name, EntrySource::Bytes(data.into()))
    }

    fn insert(&mut self, name: &str, source: EntrySource) -> Result<(), ArchiveError> {
        validate_entry_name(name)?;
        if self.entries.contains_key(name) {
            return Err(ArchiveError::DuplicateEntry(name.to_string()));
        }
        self.entries.insert(name.to_string(), source);
        Ok(())
    }

    /// Number of entries added so far
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry names in the order they will be written
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Write the archive to `writer`
    pub fn write_to<W: Write>(&self, writer: W) -> Result<W, ArchiveError> {
        let mut builder = Builder::new(writer);

        // BTreeMap iteration gives the canonical name order
        for (name, source) in &self.entries {
            let contents = match source {
                EntrySource::Bytes(data) => data.clone(),
                EntrySource::File(path) => fs::read(path).map_err(|e| ArchiveError::SourceError {
                    path: path.clone(),
                    source: e,
                })?,
            };

            let mut header = Header::new_gnu();
            header.set_entry_type(EntryType::Regular);
            header.set_size(contents.len() as u64);
            header.set_mtime(0);
            header.set_uid(0);
            header.set_gid(0);
            header.set_mode(ENTRY_MODE);

            // append_data sets the path (with GNU long-name records when
            // needed) and the checksum
            builder.append_data(&mut header, name, contents.as_slice())?;
            debug!(entry = %name, size = contents.len(), "archived entry");
        }

        Ok(builder.into_inner()?)
    }

    /// Build the archive in memory
    pub fn build(&self) -> Result<Vec<u8>, ArchiveError> {
        self.write_to(Vec::new())
    }
}

/// Read-only view of an archive, indexed by entry name
#[derive(Debug, Clone)]
pub struct ArchiveReader {
    entries: BTreeMap<String, Vec<u8>>,
}

impl ArchiveReader {
    /// Parse an archive from a reader
    pub fn new<R: Read>(reader: R) -> Result<Self, ArchiveError> {
        let mut archive = Archive::new(reader);
        let mut entries = BTreeMap::new();

        for entry in archive.entries()? {
            let mut entry = entry?;
            let name = entry.path()?.to_string_lossy().into_owned();

            match entry.header().entry_type() {
                EntryType::Regular | EntryType::Continuous => {}
                _ => return Err(ArchiveError::UnsupportedEntry { name }),
            }

            let mut contents = Vec::new();
            entry.read_to_end(&mut contents)?;
            if entries.insert(name.clone(), contents).is_some() {
                return Err(ArchiveError::DuplicateEntry(name));
            }
        }

        Ok(Self { entries })
    }

    /// Parse an archive held in memory
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ArchiveError> {
        Self::new(Cursor::new(bytes))
    }

    /// Open and parse the archive file at `path`
    pub fn open(path: &Path) -> Result<Self, ArchiveError> {
        Self::new(File::open(path)?)
    }

    /// Contents of the named entry
    pub fn read_file(&self, name: &str) -> Result<&[u8], ArchiveError> {
        self.entries
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| ArchiveError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Entry names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Entry names are relative slash-separated paths without `.`/`..` segments
fn validate_entry_name(name: &str) -> Result<(), ArchiveError> {
    let bad = name.is_empty()
        || name.starts_with('/')
        || name.contains('\0')
        || name
            .split('/')
            .any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if bad {
        return Err(ArchiveError::InvalidEntryName(name.to_string()));
    }
    Ok(())
}
