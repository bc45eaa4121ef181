//! Media storage
//!
//! Post images are written below the configured media root as
//! `posts/images/<uuid>.<ext>` and referenced by that relative path.

use crate::config::UploadConfig;
use crate::models::POST_IMAGE_DIR;
use anyhow::Context;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

/// Error types for media operations
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("File too large: {size} bytes (maximum {max} bytes)")]
    TooLarge { size: u64, max: u64 },

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Stores and removes uploaded images
pub struct MediaService {
    config: UploadConfig,
}

impl MediaService {
    pub fn new(config: UploadConfig) -> Self {
        Self { config }
    }

    /// Directory served under `/media`
    pub fn root(&self) -> &Path {
        &self.config.path
    }

    /// Largest accepted upload in bytes
    pub fn max_file_size(&self) -> u64 {
        self.config.max_file_size
    }

    /// Check an upload before storing it, returning its lowercase extension
    pub fn check_image(&self, filename: &str, size: u64) -> Result<String, MediaError> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .filter(|e| self.config.is_extension_allowed(e))
            .ok_or_else(|| MediaError::UnsupportedType(filename.to_string()))?;

        if size > self.config.max_file_size {
            return Err(MediaError::TooLarge {
                size,
                max: self.config.max_file_size,
            });
        }

        Ok(extension)
    }

    /// Write a post image, returning its path relative to the media root
    pub async fn store_post_image(&self, filename: &str, data: &[u8]) -> Result<String, MediaError> {
        let extension = self.check_image(filename, data.len() as u64)?;

        let dir = self.config.path.join(POST_IMAGE_DIR);
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create media directory {}", dir.display()))?;

        let relative = format!("{}/{}.{}", POST_IMAGE_DIR, Uuid::new_v4(), extension);
        let target = self.config.path.join(&relative);
        fs::write(&target, data)
            .await
            .with_context(|| format!("Failed to save image {}", target.display()))?;

        tracing::debug!(path = %relative, bytes = data.len(), "Stored post image");
        Ok(relative)
    }

    /// Remove a stored image; a missing file is not an error
    pub async fn remove(&self, relative: &str) {
        let Some(path) = self.resolve(relative) else {
            tracing::warn!(path = %relative, "Refusing to remove media outside the media root");
            return;
        };
        if let Err(e) = fs::remove_file(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove image");
            }
        }
    }

    fn resolve(&self, relative: &str) -> Option<PathBuf> {
        let relative = Path::new(relative);
        let inside = relative
            .components()
            .all(|c| matches!(c, std::path::Component::Normal(_)));
        inside.then(|| self.config.path.join(relative))
    }
}
