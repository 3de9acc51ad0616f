//! Test fixtures for package builds
//!
//! Provides a throwaway build environment: a config whose output and temp
//! directories live under one `TempDir`, and a set of content files.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use pkgseal::{BuildConfig, Manifest};
use tempfile::TempDir;

/// ABI revision used by tests that embed one
pub const TEST_ABI_REVISION: u64 = 0xE9CACD17EA11859D;

/// Package paths of the test content files
pub const TEST_FILES: &[&str] = &["a", "b", "dir/c", "rand1", "rand2"];

/// A scratch build environment
pub struct TestEnv {
    pub dir: TempDir,
    pub config: BuildConfig,
}

impl TestEnv {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config = BuildConfig::new(dir.path().join("output"))
            .with_pkg_name("testpackage")
            .with_temp_dir(dir.path().join("tmp"));
        Self { dir, config }
    }

    pub fn source_dir(&self) -> PathBuf {
        self.dir.path().join("src")
    }

    /// Write each test file with deterministic contents and add it to a new
    /// manifest
    pub fn content_manifest(&self) -> Manifest {
        let mut manifest = Manifest::new();
        for path in TEST_FILES {
            let local = self.write_source(path, &file_body(path));
            manifest.add_content(path, local).unwrap();
        }
        manifest
    }

    pub fn write_source(&self, package_path: &str, body: &[u8]) -> PathBuf {
        let local = self.source_dir().join(package_path);
        fs::create_dir_all(local.parent().unwrap()).unwrap();
        fs::write(&local, body).unwrap();
        local
    }
}

/// 1 KiB of contents derived from the path
pub fn file_body(path: &str) -> Vec<u8> {
    path.bytes().cycle().take(1024).collect()
}

pub fn read_string(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}
