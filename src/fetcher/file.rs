//! Local file fetcher

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::traits::{FetchError, ImageFetcher};
use crate::config::FileConfig;
use crate::image::{Image, mime_from_extension};
use crate::request::{ImageRequest, Resource};

/// Reads images from the local filesystem
///
/// Relative paths are resolved against the configured root, or the process
/// working directory when no root is set.
pub struct FileFetcher {
    config: FileConfig,
}

impl FileFetcher {
    pub fn new(config: FileConfig) -> Self {
        Self { config }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.config.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }

    async fn read(&self, path: &Path) -> Result<Image, FetchError> {
        let path = self.resolve(path);
        let not_found = |e: std::io::Error| {
            if e.kind() == ErrorKind::NotFound {
                FetchError::NotFound(path.display().to_string())
            } else {
                FetchError::Io(e)
            }
        };

        let metadata = tokio::fs::metadata(&path).await.map_err(not_found)?;
        if !metadata.is_file() {
            return Err(FetchError::NotFound(path.display().to_string()));
        }

        let limit = self.config.max_image_bytes;
        if metadata.len() > limit.as_u64() {
            return Err(FetchError::TooLarge {
                size: metadata.len(),
                limit,
            });
        }

        let data = tokio::fs::read(&path).await.map_err(not_found)?;
        debug!(path = %path.display(), size = data.len(), "File read");

        let image = Image::new(data);
        let content_type = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(mime_from_extension);
        Ok(match content_type {
            Some(content_type) => image.with_content_type(content_type),
            None => image,
        })
    }
}

#[async_trait]
impl ImageFetcher for FileFetcher {
    fn name(&self) -> &str {
        "file"
    }

    fn can_fetch(&self, request: &ImageRequest) -> bool {
        matches!(request.resource, Resource::File(_))
    }

    async fn fetch(&self, request: &ImageRequest) -> Result<Image, FetchError> {
        match &request.resource {
            Resource::File(path) => self.read(path).await,
            other => Err(FetchError::Unsupported(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::humanize::ByteSize;
    use std::fs;
    use tempfile::TempDir;

    fn fetcher_in(dir: &TempDir) -> FileFetcher {
        FileFetcher::new(FileConfig {
            root: Some(dir.path().to_path_buf()),
            ..FileConfig::default()
        })
    }

    #[tokio::test]
    async fn test_reads_relative_to_root() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("cat.png"), b"\x89PNG").unwrap();

        let image = fetcher_in(&temp_dir)
            .fetch(&ImageRequest::new(Resource::file("cat.png")))
            .await
            .unwrap();

        assert_eq!(image.len(), 4);
        assert_eq!(image.content_type(), Some(&mime::IMAGE_PNG));
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let result = fetcher_in(&temp_dir)
            .fetch(&ImageRequest::new(Resource::file("missing.png")))
            .await;

        assert!(matches!(result, Err(FetchError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_directory_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("nested")).unwrap();

        let result = fetcher_in(&temp_dir)
            .fetch(&ImageRequest::new(Resource::file("nested")))
            .await;

        assert!(matches!(result, Err(FetchError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_size_limit() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("big.gif"), vec![0u8; 64]).unwrap();

        let fetcher = FileFetcher::new(FileConfig {
            root: Some(temp_dir.path().to_path_buf()),
            max_image_bytes: ByteSize(16),
        });
        let result = fetcher
            .fetch(&ImageRequest::new(Resource::file("big.gif")))
            .await;

        assert!(matches!(result, Err(FetchError::TooLarge { size: 64, .. })));
    }

    #[test]
    fn test_can_fetch_files_only() {
        let fetcher = FileFetcher::new(FileConfig::default());
        assert!(fetcher.can_fetch(&ImageRequest::new(Resource::file("a.png"))));
        assert!(!fetcher.can_fetch(&ImageRequest::new(Resource::url("https://x/a.png"))));
    }
}
