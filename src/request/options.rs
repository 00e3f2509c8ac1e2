use bon::Builder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Requested pixel dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetSize {
    pub width: u32,
    pub height: u32,
}

impl TargetSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// How an image should fit into the target size
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentMode {
    #[default]
    AspectFill,
    AspectFit,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    VeryLow,
    Low,
    #[default]
    Normal,
    High,
    VeryHigh,
}

/// Load options attached to a request
///
/// Only the fields below are understood by the built-in managers. Anything
/// else goes into `user_info`, which concrete managers may interpret; the
/// dispatcher never looks inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Builder)]
pub struct RequestOptions {
    /// `None` requests the largest representation available
    pub target_size: Option<TargetSize>,
    #[builder(default)]
    pub content_mode: ContentMode,
    #[builder(default)]
    pub priority: Priority,
    #[builder(default = true)]
    pub allows_network_access: bool,
    pub expiration_age: Option<Duration>,
    #[builder(default)]
    pub user_info: BTreeMap<String, String>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RequestOptions {
    /// Options asking for the maximum available size and nothing else
    pub fn maximal() -> Self {
        Self::default()
    }

    pub fn is_maximal_size(&self) -> bool {
        self.target_size.is_none()
    }
}
