//! Image fetchers
//!
//! A fetcher turns a request into image bytes and nothing else. Task
//! ownership, cancellation and preheating are added by
//! [`FetchingImageManager`](crate::manager::FetchingImageManager).
//!
//! - [`ImageFetcher`] - async trait implemented by every fetcher
//! - [`HttpFetcher`] - `http`/`https` URLs via reqwest
//! - [`FileFetcher`] - local files via tokio::fs

mod file;
mod http;
mod traits;

pub use file::FileFetcher;
pub use http::HttpFetcher;
pub use traits::{FetchError, ImageFetcher};
