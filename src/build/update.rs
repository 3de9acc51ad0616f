//! Update stage: content digests and the content index

use rayon::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info};

use pkgseal_digest::ContentHasher;

use super::{write_atomic, Pipeline, ABI_REVISION_KEY, META_CONTENTS};
use crate::contents::ContentIndex;
use crate::error::{io_error, BuildError, Result};
use crate::manifest::Manifest;

impl<H: ContentHasher> Pipeline<H> {
    /// Hash every content entry and rewrite `meta/contents`.
    ///
    /// The index is recomputed from scratch on every call. When an ABI
    /// revision is configured its record is written and registered too; when
    /// it is not, an earlier registration is left alone.
    pub fn update(&self, manifest: &mut Manifest) -> Result<ContentIndex> {
        let content: Vec<(String, PathBuf)> = manifest
            .content()
            .into_iter()
            .map(|(path, source)| (path.to_string(), source.to_path_buf()))
            .collect();

        // Collecting a parallel iterator keeps input order
        let hasher = self.hasher();
        let digests = content
            .into_par_iter()
            .map(|(path, source)| {
                let digest = hasher.digest_file(&source).map_err(io_error(&source))?;
                debug!(path = %path, digest = %digest, "hashed content");
                Ok::<_, BuildError>((path, digest))
            })
            .collect::<Result<Vec<_>>>()?;
        let index = ContentIndex::new(digests);

        let config = self.config();
        let contents_path = config.output_path(META_CONTENTS);
        write_atomic(&contents_path, index.to_string().as_bytes())?;
        manifest.add_meta(META_CONTENTS, contents_path)?;

        if let Some(revision) = config.abi_revision {
            let abi_path = config.output_path(ABI_REVISION_KEY);
            write_atomic(&abi_path, &revision.to_le_bytes())?;
            manifest.add_meta(ABI_REVISION_KEY, abi_path)?;
            debug!(abi_revision = %revision, "wrote ABI revision");
        }

        info!(entries = index.len(), "updated content index");
        Ok(index)
    }
}
