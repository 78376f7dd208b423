use crate::config::types::{MirrorConfig, RootUrl};
use crate::url::normalize_url;
use crate::ConfigError;
use std::collections::HashSet;

/// Highest accepted worker count
pub const MAX_PARALLEL: usize = 256;

/// Validates the entire configuration
pub fn validate(config: &MirrorConfig) -> Result<(), ConfigError> {
    validate_roots(&config.urls)?;
    validate_limits(config)?;
    validate_separator(config.separator)?;
    Ok(())
}

/// Validates root URLs: at least one, parseable, level >= 1, no duplicates
fn validate_roots(roots: &[RootUrl]) -> Result<(), ConfigError> {
    if roots.is_empty() {
        return Err(ConfigError::Validation(
            "at least one root URL is required".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for root in roots {
        let url = normalize_url(&root.url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", root.url, e)))?;

        if root.level < 1 {
            return Err(ConfigError::Validation(format!(
                "level of {} must be >= 1, got {}",
                root.url, root.level
            )));
        }

        if !seen.insert(url.to_string()) {
            return Err(ConfigError::Validation(format!(
                "root URL {} is given more than once",
                url
            )));
        }
    }

    Ok(())
}

/// Validates retry, parallelism and timeout
fn validate_limits(config: &MirrorConfig) -> Result<(), ConfigError> {
    if config.retry < 1 {
        return Err(ConfigError::Validation(format!(
            "retry must be >= 1, got {}",
            config.retry
        )));
    }

    if config.parallel < 1 || config.parallel > MAX_PARALLEL {
        return Err(ConfigError::Validation(format!(
            "parallel must be between 1 and {}, got {}",
            MAX_PARALLEL, config.parallel
        )));
    }

    if config.timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "timeout-ms must be > 0".to_string(),
        ));
    }

    Ok(())
}

/// Validates that the separator is a character kept in file names
fn validate_separator(separator: char) -> Result<(), ConfigError> {
    if separator.is_ascii_alphanumeric() || matches!(separator, '_' | '-' | '.' | '~' | '+') {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!(
            "separator must be an ASCII letter, digit or one of _-.~+, got '{}'",
            separator
        )))
    }
}
