use super::models::{Config, ManagerKind};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("No managers configured (dispatcher.managers is empty)")]
    NoManagersConfigured,

    #[error("Manager '{0}' appears more than once in dispatcher.managers")]
    DuplicateManager(ManagerKind),

    #[error("Timeout must be positive: {field} = 0")]
    ZeroTimeout { field: &'static str },

    #[error("http.max_attempts must be at least 1")]
    NoAttempts,

    #[error("Image size limit must be positive: {section}.max_image_bytes")]
    ZeroImageLimit { section: &'static str },

    #[error("http.user_agent must not be empty")]
    EmptyUserAgent,
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_dispatcher(config)?;
    validate_http(config)?;
    validate_file(config)?;
    Ok(())
}

fn validate_dispatcher(config: &Config) -> Result<(), ValidationError> {
    let managers = &config.dispatcher.managers;
    if managers.is_empty() {
        return Err(ValidationError::NoManagersConfigured);
    }

    let mut seen = HashSet::new();
    for kind in managers {
        if !seen.insert(*kind) {
            return Err(ValidationError::DuplicateManager(*kind));
        }
    }

    Ok(())
}

fn validate_http(config: &Config) -> Result<(), ValidationError> {
    let http = &config.http;

    if http.connect_timeout_ms == 0 {
        return Err(ValidationError::ZeroTimeout {
            field: "http.connect_timeout_ms",
        });
    }
    if http.request_timeout_ms == 0 {
        return Err(ValidationError::ZeroTimeout {
            field: "http.request_timeout_ms",
        });
    }
    if http.max_attempts == 0 {
        return Err(ValidationError::NoAttempts);
    }
    if http.max_image_bytes.as_u64() == 0 {
        return Err(ValidationError::ZeroImageLimit { section: "http" });
    }
    if http.user_agent.trim().is_empty() {
        return Err(ValidationError::EmptyUserAgent);
    }

    Ok(())
}

fn validate_file(config: &Config) -> Result<(), ValidationError> {
    if config.file.max_image_bytes.as_u64() == 0 {
        return Err(ValidationError::ZeroImageLimit { section: "file" });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::humanize::ByteSize;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_empty_chain() {
        let mut config = Config::default();
        config.dispatcher.managers.clear();
        assert!(matches!(
            validate(&config),
            Err(ValidationError::NoManagersConfigured)
        ));
    }

    #[test]
    fn test_duplicate_manager() {
        let mut config = Config::default();
        config.dispatcher.managers = vec![ManagerKind::Http, ManagerKind::File, ManagerKind::Http];
        assert!(matches!(
            validate(&config),
            Err(ValidationError::DuplicateManager(ManagerKind::Http))
        ));
    }

    #[test]
    fn test_zero_timeout() {
        let mut config = Config::default();
        config.http.request_timeout_ms = 0;
        assert!(matches!(
            validate(&config),
            Err(ValidationError::ZeroTimeout {
                field: "http.request_timeout_ms"
            })
        ));
    }

    #[test]
    fn test_zero_attempts() {
        let mut config = Config::default();
        config.http.max_attempts = 0;
        assert!(matches!(validate(&config), Err(ValidationError::NoAttempts)));
    }

    #[test]
    fn test_zero_file_limit() {
        let mut config = Config::default();
        config.file.max_image_bytes = ByteSize(0);
        assert!(matches!(
            validate(&config),
            Err(ValidationError::ZeroImageLimit { section: "file" })
        ));
    }

    #[test]
    fn test_blank_user_agent() {
        let mut config = Config::default();
        config.http.user_agent = "   ".to_string();
        assert!(matches!(
            validate(&config),
            Err(ValidationError::EmptyUserAgent)
        ));
    }
}
