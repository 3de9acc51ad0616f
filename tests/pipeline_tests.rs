//! End-to-end pipeline tests
//!
//! Drives init, update, validate and seal against real files and checks the
//! produced metadata, archive and sidecar.

mod fixtures;

use std::fs;

use fixtures::{file_body, read_string, TestEnv, TEST_ABI_REVISION, TEST_FILES};
use pkgseal::archive::ArchiveReader;
use pkgseal::digest::{digest_bytes, digest_file};
use pkgseal::{
    load_package_manifest, validate, BuildError, ContentIndex, ErrorKind, PackageIdentity,
    PackageManifest, Pipeline, ABI_REVISION_KEY, META_CONTENTS, META_PACKAGE, REQUIRED_FILES,
};

// =============================================================================
// Init
// =============================================================================

#[test]
fn test_init_identity_record() {
    let env = TestEnv::new();
    let mut manifest = env.content_manifest();

    Pipeline::new(env.config.clone()).init(&mut manifest).unwrap();

    let path = env.config.output_dir.join("meta").join("package");
    let identity: PackageIdentity = serde_json::from_str(&read_string(&path)).unwrap();
    assert_eq!(identity.name, "testpackage");
    assert_eq!(identity.version, "0");

    // Empty name falls back to the output directory's base name
    let config = env.config.clone().with_pkg_name("");
    Pipeline::new(config).init(&mut manifest).unwrap();

    let identity: PackageIdentity = serde_json::from_str(&read_string(&path)).unwrap();
    assert_eq!(identity.name, "output");
}

// =============================================================================
// Update
// =============================================================================

#[test]
fn test_update_content_digests() {
    let env = TestEnv::new();
    let mut manifest = env.content_manifest();
    let pipeline = Pipeline::new(env.config.clone());
    pipeline.init(&mut manifest).unwrap();

    assert!(!manifest.meta().contains_key(META_CONTENTS));
    pipeline.update(&mut manifest).unwrap();

    // The ABI revision is not written by default
    assert!(!manifest.meta().contains_key(ABI_REVISION_KEY));

    let contents_path = manifest.meta()[META_CONTENTS].to_path_buf();
    let text = read_string(&contents_path);
    assert!(text.ends_with('\n'));
    let lines: Vec<&str> = text.lines().collect();

    let mut expected_paths: Vec<&str> = TEST_FILES.to_vec();
    expected_paths.sort();
    assert_eq!(lines.len(), expected_paths.len());

    for (line, path) in lines.iter().zip(&expected_paths) {
        let local = manifest.source(path).unwrap();
        let want = format!("{}={}", path, digest_file(local).unwrap());
        assert_eq!(*line, want);
    }
}

#[test]
fn test_update_reflects_changed_content() {
    let env = TestEnv::new();
    let mut manifest = env.content_manifest();
    let pipeline = Pipeline::new(env.config.clone());
    pipeline.init(&mut manifest).unwrap();
    pipeline.update(&mut manifest).unwrap();

    env.write_source("rand1", b"new bytes");
    pipeline.update(&mut manifest).unwrap();

    let index = ContentIndex::parse(&read_string(manifest.source(META_CONTENTS).unwrap())).unwrap();
    assert_eq!(index.get("rand1"), Some(&digest_bytes(b"new bytes")));
    assert_eq!(index.get("a"), Some(&digest_bytes(&file_body("a"))));
}

#[test]
fn test_update_writes_abi_revision() {
    let env = TestEnv::new();
    let config = env.config.clone().with_abi_revision(TEST_ABI_REVISION);
    let mut manifest = env.content_manifest();
    let pipeline = Pipeline::new(config);
    pipeline.init(&mut manifest).unwrap();
    pipeline.update(&mut manifest).unwrap();

    let bytes = fs::read(manifest.meta()[ABI_REVISION_KEY]).unwrap();
    assert_eq!(bytes.len(), 8);
    let value = u64::from_le_bytes(bytes.as_slice().try_into().unwrap());
    assert_eq!(value, TEST_ABI_REVISION);
}

#[test]
fn test_update_failure_detected_by_validate() {
    let env = TestEnv::new();
    let mut manifest = env.content_manifest();
    manifest
        .add_content("missing", env.dir.path().join("never-written"))
        .unwrap();
    let pipeline = Pipeline::new(env.config.clone());
    pipeline.init(&mut manifest).unwrap();

    let err = pipeline.update(&mut manifest).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);

    match validate(&manifest) {
        Err(BuildError::MissingRequiredFile(path)) => assert_eq!(path, META_CONTENTS),
        other => panic!("expected MissingRequiredFile, got {:?}", other),
    }
}

// =============================================================================
// Validate
// =============================================================================

#[test]
fn test_validate_required_files() {
    let env = TestEnv::new();
    let mut manifest = env.content_manifest();
    let pipeline = Pipeline::new(env.config.clone());
    pipeline.init(&mut manifest).unwrap();
    pipeline.update(&mut manifest).unwrap();

    pipeline.validate(&manifest).unwrap();

    for &required in REQUIRED_FILES {
        let entry = manifest.remove(required).unwrap();
        assert!(
            pipeline.validate(&manifest).is_err(),
            "expected a validation error when {:?} is missing",
            required
        );
        manifest.add_meta(required, entry.source).unwrap();
        pipeline.validate(&manifest).unwrap();
    }
}

// =============================================================================
// Seal
// =============================================================================

#[test]
fn test_seal_sidecar_matches_archive() {
    let env = TestEnv::new();
    let mut manifest = env.content_manifest();
    let pipeline = Pipeline::new(env.config.clone());
    pipeline.init(&mut manifest).unwrap();
    pipeline.update(&mut manifest).unwrap();

    let archive = pipeline.seal(&manifest).unwrap();

    assert_eq!(archive, env.config.output_dir.join("meta.far"));
    let sidecar = read_string(&env.config.output_dir.join("meta.far.merkle"));
    assert_eq!(sidecar, digest_file(&archive).unwrap().to_hex());
    assert_eq!(sidecar.len(), 64);

    // No ABI revision by default
    let reader = ArchiveReader::open(&archive).unwrap();
    let err = reader.read_file(ABI_REVISION_KEY).unwrap_err();
    assert!(err.is_not_found());
    assert!(reader.contains(META_PACKAGE));
    assert!(!reader.contains("a"));
}

#[test]
fn test_seal_embeds_abi_revision() {
    let env = TestEnv::new();
    let config = env.config.clone().with_abi_revision(TEST_ABI_REVISION);
    let mut manifest = env.content_manifest();
    let pipeline = Pipeline::new(config);
    pipeline.init(&mut manifest).unwrap();
    pipeline.update(&mut manifest).unwrap();

    let archive = pipeline.seal(&manifest).unwrap();
    let reader = ArchiveReader::open(&archive).unwrap();

    let bytes = reader.read_file(ABI_REVISION_KEY).unwrap();
    let value = u64::from_le_bytes(bytes.try_into().unwrap());
    assert_eq!(value, TEST_ABI_REVISION);
}

#[test]
fn test_seal_invalid_repository_writes_nothing() {
    let env = TestEnv::new();
    let config = env.config.clone().with_repository("x,y");
    let mut manifest = env.content_manifest();
    let pipeline = Pipeline::new(config);
    pipeline.init(&mut manifest).unwrap();
    pipeline.update(&mut manifest).unwrap();

    let err = pipeline.seal(&manifest).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidRepositoryIdentifier);
    assert!(!env.config.output_dir.join("meta.far").exists());
    assert!(!env.config.output_dir.join("meta.far.merkle").exists());
}

#[test]
fn test_builds_are_deterministic() {
    let first = TestEnv::new();
    let second = TestEnv::new();

    let mut digests = Vec::new();
    let mut archives = Vec::new();
    for env in [&first, &second] {
        let mut manifest = env.content_manifest();
        let pipeline = Pipeline::new(env.config.clone());
        pipeline.init(&mut manifest).unwrap();
        pipeline.update(&mut manifest).unwrap();
        let sealed = pipeline.seal_with_digest(&manifest).unwrap();

        archives.push(fs::read(&sealed.archive_path).unwrap());
        digests.push(read_string(&sealed.digest_path));
    }

    assert_eq!(archives[0], archives[1]);
    assert_eq!(digests[0], digests[1]);
}

#[test]
fn test_reseal_after_content_change_changes_digest() {
    let env = TestEnv::new();
    let mut manifest = env.content_manifest();
    let pipeline = Pipeline::new(env.config.clone());
    pipeline.init(&mut manifest).unwrap();
    pipeline.update(&mut manifest).unwrap();
    let before = pipeline.seal_with_digest(&manifest).unwrap().digest;

    env.write_source("b", b"different");
    pipeline.update(&mut manifest).unwrap();
    let after = pipeline.seal_with_digest(&manifest).unwrap().digest;

    assert_ne!(before, after);
    assert_eq!(pipeline.verify().unwrap(), after);
}

// =============================================================================
// Package manifest
// =============================================================================

#[test]
fn test_package_manifest_round_trip_through_loader() {
    let env = TestEnv::new();
    let mut manifest = env.content_manifest();
    let pipeline = Pipeline::new(env.config.clone());
    pipeline.init(&mut manifest).unwrap();
    pipeline.update(&mut manifest).unwrap();
    let sealed = pipeline.seal_with_digest(&manifest).unwrap();

    let path = env.dir.path().join("package_manifest.json");
    PackageManifest::from_sealed(&env.config, &manifest)
        .unwrap()
        .write_to_file(&path)
        .unwrap();

    let loaded = load_package_manifest(&path).unwrap();
    assert_eq!(loaded.blobs.len(), TEST_FILES.len() + 1);
    assert_eq!(loaded.meta_far().unwrap().merkle, sealed.digest);
    for blob in loaded.blobs.iter().skip(1) {
        let source = blob.source_path.as_ref().unwrap();
        assert_eq!(blob.merkle, digest_file(source).unwrap());
    }
}
