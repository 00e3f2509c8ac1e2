//! HTTP fetcher

use async_trait::async_trait;
use bytes::BytesMut;
use mime::Mime;
use reqwest::{Client, header::CONTENT_TYPE, redirect::Policy};
use std::time::Duration;
use tracing::{debug, warn};

use super::traits::{FetchError, ImageFetcher};
use crate::config::HttpConfig;
use crate::image::{Image, mime_from_extension};
use crate::request::{ImageRequest, Resource};

type Result<T> = std::result::Result<T, FetchError>;

const MAX_REDIRECTS: usize = 10;

/// Loads `http`/`https` URLs with retry and a size limit
pub struct HttpFetcher {
    client: Client,
    config: HttpConfig,
}

impl HttpFetcher {
    pub fn new(config: HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .user_agent(config.user_agent.as_str())
            .redirect(Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| FetchError::RequestFailed(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Download with exponential backoff between attempts
    async fn download(&self, url: &str) -> Result<Image> {
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            match self.download_once(url).await {
                Ok(image) => {
                    if attempt > 1 {
                        debug!(url, attempt, "Download succeeded after retry");
                    }
                    return Ok(image);
                }
                Err(e) if e.is_retryable() && attempt < self.config.max_attempts => {
                    let backoff = self.backoff(attempt);
                    warn!(url, attempt, error = %e, ?backoff, "Download failed, retrying");
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    warn!(url, attempt, error = %e, "Download failed");
                    return Err(e);
                }
            }
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.config.retry_backoff_ms.saturating_mul(factor))
    }

    async fn download_once(&self, url: &str) -> Result<Image> {
        debug!(url, "Starting download");

        let mut response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else if e.is_redirect() {
                FetchError::TooManyRedirects
            } else {
                FetchError::RequestFailed(e.to_string())
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::GONE {
            return Err(FetchError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        let limit = self.config.max_image_bytes;
        if let Some(size) = response.content_length() {
            if size > limit.as_u64() {
                return Err(FetchError::TooLarge { size, limit });
            }
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<Mime>().ok());

        // Content-Length may be absent (chunked) or wrong, so the limit is
        // enforced while reading.
        let mut body = BytesMut::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::RequestFailed(format!("Failed to read body: {e}"))
            }
        })? {
            let size = (body.len() + chunk.len()) as u64;
            if size > limit.as_u64() {
                return Err(FetchError::TooLarge { size, limit });
            }
            body.extend_from_slice(&chunk);
        }
        let bytes = body.freeze();

        debug!(url, size = bytes.len(), "Download completed");

        let content_type = content_type.or_else(|| {
            Resource::url(url)
                .extension()
                .and_then(|ext| mime_from_extension(&ext))
        });
        let image = Image::new(bytes);
        Ok(match content_type {
            Some(content_type) => image.with_content_type(content_type),
            None => image,
        })
    }
}

#[async_trait]
impl ImageFetcher for HttpFetcher {
    fn name(&self) -> &str {
        "http"
    }

    fn can_fetch(&self, request: &ImageRequest) -> bool {
        request.options.allows_network_access
            && matches!(
                request.resource.scheme().as_deref(),
                Some("http") | Some("https")
            )
    }

    async fn fetch(&self, request: &ImageRequest) -> Result<Image> {
        match &request.resource {
            Resource::Url(url) => self.download(url).await,
            other => Err(FetchError::Unsupported(other.to_string())),
        }
    }
}
