//! Blob store abstraction and the filesystem implementation.
//!
//! Callers address blobs by the relative paths built in
//! `matchlens_core::storage`; every path is validated before it touches
//! the filesystem.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use matchlens_core::storage::validate_blob_path;

use crate::error::PipelineError;

/// Byte storage addressed by opaque relative paths.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<(), PipelineError>;
    async fn read(&self, path: &str) -> Result<Vec<u8>, PipelineError>;
    async fn delete(&self, path: &str) -> Result<(), PipelineError>;
    async fn exists(&self, path: &str) -> Result<bool, PipelineError>;
}

/// Blob store over a local directory tree, via `tokio::fs`.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, PipelineError> {
        validate_blob_path(path)?;
        Ok(self.root.join(path))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<(), PipelineError> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, bytes).await?;
        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, PipelineError> {
        let full = self.resolve(path)?;
        Ok(tokio::fs::read(&full).await?)
    }

    async fn delete(&self, path: &str) -> Result<(), PipelineError> {
        let full = self.resolve(path)?;
        match tokio::fs::remove_file(&full).await {
            Ok(()) => Ok(()),
            // Deleting an absent blob is a no-op.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool, PipelineError> {
        let full = self.resolve(path)?;
        Ok(Path::new(&full).exists())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use matchlens_core::CoreError;

    #[tokio::test]
    async fn put_read_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());

        store.put("videos/1/first.mp4", b"bytes").await.unwrap();
        assert!(store.exists("videos/1/first.mp4").await.unwrap());
        assert_eq!(store.read("videos/1/first.mp4").await.unwrap(), b"bytes");

        store.delete("videos/1/first.mp4").await.unwrap();
        assert!(!store.exists("videos/1/first.mp4").await.unwrap());
    }

    #[tokio::test]
    async fn delete_of_missing_blob_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());
        store.delete("results/9/tracking_first.json").await.unwrap();
    }

    #[tokio::test]
    async fn traversal_paths_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());

        let err = store.read("../escape.mp4").await.unwrap_err();
        assert_matches!(err, PipelineError::Core(CoreError::Validation(_)));

        let err = store.put("/abs/path.mp4", b"x").await.unwrap_err();
        assert_matches!(err, PipelineError::Core(CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn read_of_missing_blob_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());
        let err = store.read("videos/1/full.mp4").await.unwrap_err();
        assert_matches!(err, PipelineError::Blob(_));
    }
}
