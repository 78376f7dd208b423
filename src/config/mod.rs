//! Configuration module for webmirror
//!
//! This module handles the crawl configuration: root URL argument parsing,
//! the TOML snapshot kept in the output directory, and validation.
//!
//! # Example
//!
//! ```no_run
//! use webmirror::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("mirror/webmirror.toml")).unwrap();
//! println!("Save mode: {}", config.save_mode);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{MirrorConfig, RootUrl, SaveMode};

// Re-export parser functions
pub use parser::{
    compute_config_hash, load_config, load_config_with_hash, parse_root_url, save_config,
};
pub use validation::{validate, MAX_PARALLEL};
