use crate::config::types::{MirrorConfig, RootUrl};
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and validates a configuration snapshot
///
/// # Arguments
///
/// * `path` - Path to the TOML snapshot
///
/// # Returns
///
/// * `Ok(MirrorConfig)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use webmirror::config::load_config;
///
/// let config = load_config(Path::new("mirror/webmirror.toml")).unwrap();
/// println!("Workers: {}", config.parallel);
/// ```
pub fn load_config(path: &Path) -> Result<MirrorConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: MirrorConfig = toml::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}

/// Writes a configuration snapshot as TOML
pub fn save_config(path: &Path, config: &MirrorConfig) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged on `continue` so runs against a modified snapshot can be told
/// apart.
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(MirrorConfig, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

/// Parses a root URL argument of the form `'URL LEVEL DOWN_LEVEL EXT_LEVEL'`
///
/// # Example
///
/// ```
/// use webmirror::config::parse_root_url;
///
/// let root = parse_root_url("http://example.com/ 2 0 1").unwrap();
/// assert_eq!(root.level, 2);
/// assert_eq!(root.ext_level, 1);
/// ```
pub fn parse_root_url(arg: &str) -> Result<RootUrl, ConfigError> {
    let parts: Vec<&str> = arg.split_whitespace().collect();
    if parts.len() != 4 {
        return Err(ConfigError::InvalidRoot(format!(
            "expected 'URL LEVEL DOWN_LEVEL EXT_LEVEL', got '{}'",
            arg
        )));
    }

    let number = |name: &str, value: &str| {
        value.parse::<u32>().map_err(|_| {
            ConfigError::InvalidRoot(format!("{} must be a number, got '{}'", name, value))
        })
    };

    Ok(RootUrl {
        url: parts[0].to_string(),
        level: number("level", parts[1])?,
        down_level: number("down level", parts[2])?,
        ext_level: number("ext level", parts[3])?,
    })
}
