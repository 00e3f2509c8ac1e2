//! Configuration management for pixbox
//!
//! Settings are layered, lowest priority first:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables
//!
//! # Usage
//!
//! ```no_run
//! use pixbox::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Manager chain: {:?}", config.dispatcher.managers);
//! ```
//!
//! # Environment Variables
//!
//! Any key can be overridden with `PIXBOX__<section>__<key>`:
//! - `PIXBOX__HTTP__MAX_ATTEMPTS=5`
//! - `PIXBOX__HTTP__MAX_IMAGE_BYTES=10MB`
//! - `PIXBOX__DISPATCHER__MANAGERS=http,file`
//!
//! # Configuration File
//!
//! Read from `config/pixbox.toml` unless `PIXBOX_CONFIG` points elsewhere.

mod models;
mod sources;
mod validation;

pub use crate::humanize::ByteSize;
pub use models::{Config, DispatcherConfig, FileConfig, HttpConfig, ManagerKind};
pub use validation::ValidationError;

use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// # Errors
    ///
    /// Returns an error if the file is malformed or validation fails
    /// (empty or duplicated manager chain, zero limits, ...).
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path plus environment overrides
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path.as_ref())?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Check an in-memory configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::validate(self)
    }
}
