use async_trait::async_trait;
use thiserror::Error;

use crate::humanize::ByteSize;
use crate::image::Image;
use crate::request::ImageRequest;
use crate::task::ImageInfo;

/// Fetch errors, surfaced to callers only through the completion info
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("unsupported resource: {0}")]
    Unsupported(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("HTTP {status}: {reason}")]
    Status { status: u16, reason: String },

    #[error("connection timeout")]
    Timeout,

    #[error("too many redirects")]
    TooManyRedirects,

    #[error("image too large: {size} bytes exceeds limit of {limit}")]
    TooLarge { size: u64, limit: ByteSize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    /// Stable code placed under `error_kind` in the info payload
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Unsupported(_) => "unsupported",
            FetchError::NotFound(_) => "not_found",
            FetchError::RequestFailed(_) => "network",
            FetchError::Status { .. } => "http_status",
            FetchError::Timeout => "timeout",
            FetchError::TooManyRedirects => "too_many_redirects",
            FetchError::TooLarge { .. } => "too_large",
            FetchError::Io(_) => "io",
        }
    }

    /// Transport failures and server errors are worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::RequestFailed(_) | FetchError::Timeout => true,
            FetchError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn to_info(&self) -> ImageInfo {
        ImageInfo::failure(self, self.kind())
    }
}

/// Source of encoded image bytes
///
/// Fetchers know nothing about tasks, cancellation or preheating; wrap one
/// in [`FetchingImageManager`](crate::manager::FetchingImageManager) to plug
/// it into a dispatcher.
#[async_trait]
pub trait ImageFetcher: Send + Sync + 'static {
    /// Short name used in logs and in the `manager` info key
    fn name(&self) -> &str;

    /// Cheap, side-effect free eligibility check
    fn can_fetch(&self, request: &ImageRequest) -> bool;

    /// Load the image for `request`
    async fn fetch(&self, request: &ImageRequest) -> Result<Image, FetchError>;
}
