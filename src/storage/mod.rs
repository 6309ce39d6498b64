// src/storage/mod.rs
use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::gateway::models::Upload;
use crate::utils::error::StorageError;

const STAGING_PREFIX: &str = "extract-";
const STAGED_STEM: &str = "upload";
const MAX_EXTENSION_LEN: usize = 8;

/// Hands uploads to extractors that need a filesystem path.
///
/// Every upload is staged inside its own freshly created directory, so the client
/// filename never decides where bytes land and two requests can't collide.
#[derive(Debug, Clone, Default)]
pub struct TransientStore {
    root: Option<PathBuf>,
}

/// A staged upload. Dropping it removes the file and its directory.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    _dir: TempDir,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TransientStore {
    /// Creates a store rooted at `root`, or at the OS temp dir when `None`.
    pub fn new(root: Option<PathBuf>) -> Result<Self, StorageError> {
        if let Some(root) = &root {
            // Create the root directory if it doesn't exist
            if !root.exists() {
                fs::create_dir_all(root).map_err(StorageError::IoError)?;
            }
        }
        Ok(Self { root })
    }

    /// Writes the upload to a unique per-request location.
    pub fn stage(&self, upload: &Upload) -> Result<StagedFile, StorageError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(STAGING_PREFIX);
        let dir = match &self.root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };

        let path = dir.path().join(staged_file_name(upload.filename.as_deref()));
        fs::write(&path, &upload.bytes)?;

        tracing::debug!(
            "Staged {} bytes (client name {:?}) at {}",
            upload.bytes.len(),
            upload.filename,
            path.display()
        );

        Ok(StagedFile { path, _dir: dir })
    }
}

/// Keeps only a short alphanumeric extension from the client filename.
fn staged_file_name(original: Option<&str>) -> String {
    let extension = original
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| {
            !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        });

    match extension {
        Some(ext) => format!("{}.{}", STAGED_STEM, ext.to_ascii_lowercase()),
        None => STAGED_STEM.to_string(),
    }
}
