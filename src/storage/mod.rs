//! Storage module for the on-disk mirror
//!
//! This module handles everything the crawler persists, including:
//! - Output path allocation for downloaded resources
//! - The append-only resume log of allocations
//! - Content type to extension mapping
//! - Transliteration of URL paths into portable file names
//! - Part-file downloads renamed into place on completion

mod allocator;
mod mime;
mod resume_log;
mod translit;

pub use allocator::{Candidate, FileAllocator};
pub use mime::{default_extension, type_dir};
pub use resume_log::{LogEntry, ResumeLog};
pub use translit::sanitize;

use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Name of the resume log inside the output directory
pub const MAP_FILE: &str = "webmirror.map";

/// Name of the config snapshot inside the output directory
pub const CONFIG_FILE: &str = "webmirror.toml";

/// Suffix of files being downloaded
pub const PART_SUFFIX: &str = ".part";

/// A download in progress, written to `<target>.part`
///
/// The target only appears once `commit` renames the part file over it, so
/// an interrupted download never leaves a truncated file at the final path.
#[derive(Debug)]
pub struct PartFile {
    file: fs::File,
    part: PathBuf,
    target: PathBuf,
    written: u64,
}

impl PartFile {
    /// Creates (or truncates) the part file, creating parent directories
    pub async fn create(target: &Path) -> std::io::Result<Self> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut part = target.as_os_str().to_owned();
        part.push(PART_SUFFIX);
        let part = PathBuf::from(part);
        let file = fs::File::create(&part).await?;

        Ok(Self {
            file,
            part,
            target: target.to_path_buf(),
            written: 0,
        })
    }

    pub async fn write(&mut self, chunk: &[u8]) -> std::io::Result<()> {
        self.file.write_all(chunk).await?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    /// Flushes the part file and renames it over the target
    ///
    /// Returns the number of bytes written.
    pub async fn commit(mut self) -> std::io::Result<u64> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        drop(self.file);
        fs::rename(&self.part, &self.target).await?;
        Ok(self.written)
    }
}

/// Writes a page in place, creating parent directories as needed
pub async fn write_page(target: &Path, body: &str) -> std::io::Result<u64> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(target, body).await?;
    Ok(body.len() as u64)
}
