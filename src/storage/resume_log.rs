//! Resume log implementation
//!
//! The resume log is an append-only text file recording every filename
//! allocation as two lines:
//!
//! ```text
//! http://example.com/style.css
//! css/style.css text/css
//! ```
//!
//! Replaying it after a restart rebuilds the URL and path indexes so no
//! completed download is fetched again and no path is handed out twice.

use crate::{MirrorError, Result};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// One allocation record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub url: String,
    pub file_name: String,
    pub content_type: String,
}

impl LogEntry {
    fn to_record(&self) -> String {
        format!("{}\n{} {}\n", self.url, self.file_name, self.content_type)
    }
}

/// Append-only allocation log
#[derive(Debug)]
pub struct ResumeLog {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

fn persistence(path: &Path, err: impl std::fmt::Display) -> MirrorError {
    MirrorError::Persistence(format!("{}: {}", path.display(), err))
}

impl ResumeLog {
    /// Creates an empty log for a new crawl
    ///
    /// # Errors
    ///
    /// Returns `MirrorError::Persistence` if the file exists or cannot be
    /// created.
    pub fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| persistence(path, e))?;

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(Some(file)),
        })
    }

    /// Opens an existing log and returns its entries in append order
    ///
    /// # Errors
    ///
    /// Returns `MirrorError::Persistence` if the file cannot be read or is
    /// corrupt (incomplete trailing record, malformed path line).
    pub fn open(path: &Path) -> Result<(Self, Vec<LogEntry>)> {
        let text = std::fs::read_to_string(path).map_err(|e| persistence(path, e))?;
        let entries = parse_entries(&text).map_err(|e| persistence(path, e))?;

        let file = OpenOptions::new()
            .append(true)
            .open(path)
            .map_err(|e| persistence(path, e))?;

        let log = Self {
            path: path.to_path_buf(),
            file: Mutex::new(Some(file)),
        };
        Ok((log, entries))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one record and flushes it to the file
    pub fn append(&self, entry: &LogEntry) -> Result<()> {
        let mut guard = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        let file = guard
            .as_mut()
            .ok_or_else(|| persistence(&self.path, "log is closed"))?;

        file.write_all(entry.to_record().as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| persistence(&self.path, e))
    }

    /// Syncs and closes the log; later appends fail
    pub fn close(&self) -> Result<()> {
        let mut guard = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.take() {
            Some(file) => file.sync_all().map_err(|e| persistence(&self.path, e)),
            None => Ok(()),
        }
    }
}

/// Parses log text into entries
fn parse_entries(text: &str) -> std::result::Result<Vec<LogEntry>, String> {
    let mut entries = Vec::new();
    let mut lines = text.lines();

    while let Some(url) = lines.next() {
        let record = lines
            .next()
            .ok_or_else(|| format!("incomplete record for {}", url))?;

        let parts: Vec<&str> = record.split(' ').collect();
        if parts.len() != 2 {
            return Err(format!("fileName/contentType line malformed: {}", record));
        }

        entries.push(LogEntry {
            url: url.to_string(),
            file_name: parts[0].to_string(),
            content_type: parts[1].to_string(),
        });
    }

    Ok(entries)
}
