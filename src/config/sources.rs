use super::models::Config;
use config::{ConfigError, Environment, File, FileFormat};
use std::env;
use std::path::{Path, PathBuf};

const CONFIG_ENV_VAR: &str = "PIXBOX_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/pixbox.toml";
const ENV_PREFIX: &str = "PIXBOX";
const ENV_SEPARATOR: &str = "__";

/// Path named by `PIXBOX_CONFIG`, or the default location
pub fn default_path() -> PathBuf {
    env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Load configuration with priority (lowest to highest):
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Variables from a `.env` file (via dotenvy)
/// 4. Process environment
pub fn load() -> Result<Config, ConfigError> {
    // A missing .env file is the normal case
    let _ = dotenvy::dotenv();
    load_from_sources(&default_path())
}

/// Load from a specific file plus environment overrides
pub fn load_from_sources(config_path: &Path) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(
            File::from(config_path)
                .format(FileFormat::Toml)
                .required(false),
        );
    } else {
        tracing::warn!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // PIXBOX__HTTP__MAX_ATTEMPTS -> http.max_attempts
    // PIXBOX__DISPATCHER__MANAGERS=http,file -> dispatcher.managers
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator(ENV_SEPARATOR)
            .separator(ENV_SEPARATOR)
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("dispatcher.managers"),
    );

    builder.build()?.try_deserialize()
}
