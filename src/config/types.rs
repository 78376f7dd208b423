use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Crawl configuration, persisted as the output directory's snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// Fetch attempts per URL (not used up by 404s)
    #[serde(default = "default_retry")]
    pub retry: u32,

    /// Redirects followed per request; 0 disables following
    #[serde(rename = "max-redirects", default)]
    pub max_redirects: u32,

    /// Per-request timeout (milliseconds)
    #[serde(rename = "timeout-ms", default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Output layout
    #[serde(rename = "save-mode", default)]
    pub save_mode: SaveMode,

    /// Number of workers
    #[serde(default = "default_parallel")]
    pub parallel: usize,

    /// Replacement for characters not allowed in file names
    #[serde(default = "default_separator")]
    pub separator: char,

    /// Root URLs with their traversal budgets
    #[serde(default)]
    pub urls: Vec<RootUrl>,
}

/// A root URL and its starting budget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootUrl {
    pub url: String,

    /// Page hops followed on the same site
    pub level: u32,

    /// Directory levels a same-site hop may climb
    #[serde(rename = "down-level", default)]
    pub down_level: u32,

    /// Hops granted to pages on other hosts
    #[serde(rename = "ext-level", default)]
    pub ext_level: u32,
}

/// How downloaded files are laid out in the output directory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SaveMode {
    /// Every file at the top level
    #[default]
    #[serde(rename = "flat")]
    Flat,

    /// Pages at the top level, other files in per-type directories
    #[serde(rename = "flat-dir", alias = "flat_dir")]
    FlatDir,

    /// The URL directory structure
    #[serde(rename = "dir")]
    Dir,

    /// The URL directory structure below one directory per site
    #[serde(rename = "site-dir", alias = "site_dir")]
    SiteDir,
}

impl SaveMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flat => "flat",
            Self::FlatDir => "flat-dir",
            Self::Dir => "dir",
            Self::SiteDir => "site-dir",
        }
    }
}

impl fmt::Display for SaveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SaveMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "flat" => Ok(Self::Flat),
            "flat-dir" | "flat_dir" => Ok(Self::FlatDir),
            "dir" => Ok(Self::Dir),
            "site-dir" | "site_dir" => Ok(Self::SiteDir),
            other => Err(format!(
                "unknown save mode '{}' (expected flat, flat-dir, dir or site-dir)",
                other
            )),
        }
    }
}

fn default_retry() -> u32 {
    3
}

fn default_timeout_ms() -> u64 {
    1000
}

fn default_parallel() -> usize {
    1
}

fn default_separator() -> char {
    '_'
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            retry: default_retry(),
            max_redirects: 0,
            timeout_ms: default_timeout_ms(),
            save_mode: SaveMode::default(),
            parallel: default_parallel(),
            separator: default_separator(),
            urls: Vec::new(),
        }
    }
}
