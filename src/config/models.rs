use crate::humanize::ByteSize;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub file: FileConfig,
}

/// Built-in managers that can be placed in the dispatch chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ManagerKind {
    File,
    Http,
}

impl fmt::Display for ManagerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManagerKind::File => f.write_str("file"),
            ManagerKind::Http => f.write_str("http"),
        }
    }
}

/// Dispatcher configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DispatcherConfig {
    /// Chain order; the first manager that accepts a request handles it
    #[serde(default = "default_managers")]
    pub managers: Vec<ManagerKind>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            managers: default_managers(),
        }
    }
}

fn default_managers() -> Vec<ManagerKind> {
    vec![ManagerKind::File, ManagerKind::Http]
}

/// HTTP fetcher configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Total attempts per download, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base delay, doubled after every failed attempt
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: ByteSize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            user_agent: default_user_agent(),
            max_image_bytes: default_max_image_bytes(),
        }
    }
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_request_timeout_ms() -> u64 {
    60_000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1_000
}

fn default_user_agent() -> String {
    concat!("pixbox/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_max_image_bytes() -> ByteSize {
    ByteSize(20 * 1024 * 1024) // 20 MB
}

/// Local file fetcher configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FileConfig {
    /// Base directory for relative paths
    pub root: Option<PathBuf>,
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: ByteSize,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            root: None,
            max_image_bytes: default_max_image_bytes(),
        }
    }
}
