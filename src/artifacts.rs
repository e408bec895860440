//! Image artifact storage on the local file system
//!
//! Generated bytes live under `<root>/<session_id>/<image_id>.png`. Every
//! image gets a fresh identifier, so writes never overwrite each other.

use crate::error::{InkforgeError, Result};
use std::path::{Path, PathBuf};

/// Directory-backed store for generated image bytes
#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    /// Create a store rooted at `root`; the directory is created lazily
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the store
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one session's images
    pub fn session_dir(&self, session_id: &str) -> PathBuf {
        self.root.join(session_id)
    }

    /// Path an image is stored at
    pub fn image_path(&self, session_id: &str, image_id: &str) -> PathBuf {
        self.session_dir(session_id).join(format!("{}.png", image_id))
    }

    /// Write image bytes and return the path they were written to
    pub async fn write(&self, session_id: &str, image_id: &str, bytes: &[u8]) -> Result<PathBuf> {
        let dir = self.session_dir(session_id);
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            InkforgeError::Artifact(format!("Failed to create {}: {}", dir.display(), e))
        })?;

        let path = self.image_path(session_id, image_id);
        tokio::fs::write(&path, bytes).await.map_err(|e| {
            InkforgeError::Artifact(format!("Failed to write {}: {}", path.display(), e))
        })?;

        tracing::debug!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(path)
    }

    /// Read the bytes of a stored image
    pub async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        tokio::fs::read(path).await.map_err(|e| {
            InkforgeError::Artifact(format!("Image not found: {} ({})", path.display(), e)).into()
        })
    }

    /// Remove one image file; a missing file is not an error
    pub async fn remove(&self, path: &Path) -> Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(InkforgeError::Artifact(format!(
                "Failed to remove {}: {}",
                path.display(),
                e
            ))
            .into()),
        }
    }

    /// Remove the given image files and the session directory
    ///
    /// Failures are logged and skipped; the return value counts files that
    /// were removed or already absent.
    pub async fn remove_session(&self, session_id: &str, paths: &[PathBuf]) -> usize {
        let mut removed = 0;
        for path in paths {
            match self.remove(path).await {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!("{}", e),
            }
        }

        let dir = self.session_dir(session_id);
        match tokio::fs::remove_dir(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Could not remove {}: {}", dir.display(), e),
        }
        removed
    }

    /// Copy a stored image to `dest`
    ///
    /// When `dest` is an existing directory the copy keeps the stored file
    /// name. Missing parent directories are created.
    pub async fn export(&self, source: &Path, dest: &Path) -> Result<PathBuf> {
        let dest_is_dir = tokio::fs::metadata(dest)
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false);
        let target = match source.file_name() {
            Some(name) if dest_is_dir => dest.join(name),
            _ => dest.to_path_buf(),
        };

        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                InkforgeError::Artifact(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        let bytes = tokio::fs::copy(source, &target).await.map_err(|e| {
            InkforgeError::Artifact(format!(
                "Failed to export {} to {}: {}",
                source.display(),
                target.display(),
                e
            ))
        })?;

        tracing::info!(
            "Exported {} ({} bytes) to {}",
            source.display(),
            bytes,
            target.display()
        );
        Ok(target)
    }
}
