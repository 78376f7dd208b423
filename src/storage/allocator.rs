//! Filename allocator
//!
//! This module derives the relative output path of a task. It handles:
//! - Percent-decoding and transliterating the URL path
//! - Laying the path out according to the save mode
//! - Choosing the extension from the content type
//! - Resolving collisions with `-N` suffixes
//! - Recording each allocation in the resume log

use crate::config::SaveMode;
use crate::crawler::TaskRegistry;
use crate::state::{Task, HTML_CONTENT_TYPE};
use crate::storage::mime::{default_extension, type_dir};
use crate::storage::translit::sanitize;
use crate::storage::{LogEntry, ResumeLog};
use crate::url::site_key;
use crate::{MirrorError, Result};
use std::sync::{Arc, Mutex, PoisonError};
use url::Url;

/// A path proposal split into stem and extension for collision suffixes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: String,
    pub stem: String,
    pub ext: String,
}

/// Allocates collision-free output paths
///
/// Compute, check and claim happen under one allocator-wide lock together
/// with the resume log append, so log order equals claim order.
#[derive(Debug)]
pub struct FileAllocator {
    mode: SaveMode,
    separator: char,
    suffix_limit: u64,
    lock: Mutex<()>,
}

impl FileAllocator {
    pub fn new(mode: SaveMode, separator: char) -> Self {
        Self {
            mode,
            separator,
            suffix_limit: u64::MAX,
            lock: Mutex::new(()),
        }
    }

    /// Lowers the highest collision suffix tried before giving up
    pub fn with_suffix_limit(mut self, limit: u64) -> Self {
        self.suffix_limit = limit;
        self
    }

    pub fn mode(&self) -> SaveMode {
        self.mode
    }

    /// Computes the preferred path for a URL without checking collisions
    pub fn candidate(&self, url: &Url, content_type: &str) -> Candidate {
        let path = self.sanitize_path(url.path());

        let laid_out = match self.mode {
            SaveMode::Flat => flat_name(&path),
            SaveMode::FlatDir => {
                let name = flat_name(&path);
                match type_dir(content_type) {
                    Some(dir) => format!("{}{}", dir, name),
                    None => name,
                }
            }
            SaveMode::Dir => dir_name(&path),
            SaveMode::SiteDir => {
                format!(
                    "{}/{}",
                    sanitize(&site_key(url), self.separator),
                    dir_name(&path)
                )
            }
        };

        with_extension(&laid_out, content_type)
    }

    /// Decodes and sanitizes a URL path one segment at a time
    ///
    /// A decoded `%2F` stays inside its segment, and `.`, `..` and empty
    /// segments are replaced by the separator, so the result never leaves
    /// the mirror root. A trailing `/` is kept.
    fn sanitize_path(&self, raw: &str) -> String {
        let segments: Vec<&str> = raw.trim_start_matches('/').split('/').collect();
        let last = segments.len() - 1;

        segments
            .iter()
            .enumerate()
            .map(|(i, segment)| {
                let decoded = urlencoding::decode(segment)
                    .map(|s| s.into_owned())
                    .unwrap_or_else(|_| segment.to_string());
                let clean = sanitize(&decoded, self.separator)
                    .replace('/', &self.separator.to_string());
                let traversal = matches!(clean.as_str(), "" | "." | "..");
                if traversal && !(clean.is_empty() && i == last) {
                    self.separator.to_string()
                } else {
                    clean
                }
            })
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Assigns a unique path to a task and records it in the resume log
    ///
    /// Returns the task's existing path if it already has one.
    ///
    /// # Errors
    ///
    /// * `MirrorError::AllocationOverflow` - every suffix is taken
    /// * `MirrorError::Persistence` - the resume log append failed
    pub fn allocate(
        &self,
        task: &Arc<Task>,
        content_type: &str,
        registry: &TaskRegistry,
        log: &ResumeLog,
    ) -> Result<String> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = task.file_name() {
            return Ok(existing);
        }

        let candidate = self.candidate(task.parsed_url(), content_type);
        let path = if registry.claim_path(&candidate.path, task) {
            candidate.path
        } else {
            self.claim_with_suffix(task, &candidate, registry)?
        };

        task.assign_file(&path, content_type);
        log.append(&LogEntry {
            url: task.url().to_string(),
            file_name: path.clone(),
            content_type: content_type.to_string(),
        })?;

        Ok(path)
    }

    fn claim_with_suffix(
        &self,
        task: &Arc<Task>,
        candidate: &Candidate,
        registry: &TaskRegistry,
    ) -> Result<String> {
        let mut n: u64 = 1;
        loop {
            let path = format!("{}-{}{}", candidate.stem, n, candidate.ext);
            if registry.claim_path(&path, task) {
                return Ok(path);
            }
            n = n
                .checked_add(1)
                .filter(|next| *next <= self.suffix_limit)
                .ok_or_else(|| MirrorError::AllocationOverflow {
                    url: task.url().to_string(),
                    name: candidate.stem.clone(),
                    ext: candidate.ext.clone(),
                })?;
        }
    }
}

/// Collapses a sanitized path to one file name
fn flat_name(path: &str) -> String {
    if path.is_empty() {
        return "index".to_string();
    }
    match path.strip_suffix('/') {
        Some(dir) => {
            let parent = dir.rsplit('/').next().unwrap_or(dir);
            if parent.is_empty() {
                "index".to_string()
            } else {
                format!("index-{}", parent)
            }
        }
        None => path.rsplit('/').next().unwrap_or(path).to_string(),
    }
}

/// Keeps the directory structure, directories resolve to `index`
fn dir_name(path: &str) -> String {
    if path.is_empty() {
        "index".to_string()
    } else if path.ends_with('/') {
        format!("{}index", path)
    } else {
        path.to_string()
    }
}

/// Returns the extension of the last path element, including the dot
///
/// `a/b.tar.gz` gives `.gz`, `a.b/c` gives an empty string and `name.`
/// gives `.`.
fn split_extension(path: &str) -> (&str, &str) {
    let file_start = path.rfind('/').map_or(0, |i| i + 1);
    match path[file_start..].rfind('.') {
        Some(dot) => path.split_at(file_start + dot),
        None => (path, ""),
    }
}

/// Appends or replaces the extension based on the content type
fn with_extension(path: &str, content_type: &str) -> Candidate {
    let (stem, ext) = split_extension(path);
    let ext = if ext.is_empty() {
        default_extension(content_type)
    } else if content_type == HTML_CONTENT_TYPE && ext != ".html" && ext != ".htm" {
        ".html"
    } else {
        ext
    };

    Candidate {
        path: format!("{}{}", stem, ext),
        stem: stem.to_string(),
        ext: ext.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Budget;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        allocator: FileAllocator,
        registry: TaskRegistry,
        log: ResumeLog,
    }

    impl Fixture {
        fn new(mode: SaveMode) -> Self {
            let dir = TempDir::new().unwrap();
            let log = ResumeLog::create(&dir.path().join("webmirror.map")).unwrap();
            Self {
                _dir: dir,
                allocator: FileAllocator::new(mode, '_'),
                registry: TaskRegistry::new(),
                log,
            }
        }

        fn allocate(&self, url: &str, content_type: &str) -> Result<String> {
            let task = Task::new(Url::parse(url).unwrap(), Budget::new(1, 0, 0), 1).unwrap();
            let (task, _) = self.registry.add_or_get(task);
            self.allocator
                .allocate(&task, content_type, &self.registry, &self.log)
        }
    }

    fn check_table(mode: SaveMode, table: &[(&str, &str, &str)]) {
        let fixture = Fixture::new(mode);
        for (url, content_type, want) in table {
            let got = fixture.allocate(url, content_type).unwrap();
            assert_eq!(&got, want, "{:?} allocation for {}", mode, url);
        }
    }

    #[test]
    fn test_flat_mode() {
        check_table(
            SaveMode::Flat,
            &[
                ("http://test.com/", "text/html", "index.html"),
                ("http://test.com/test/", "text/html", "index-test.html"),
                ("http://test.com/test.html", "text/html", "test.html"),
                ("http://test.com/2/test.html", "text/html", "test-1.html"),
                ("http://test.com/3/test.html", "text/html", "test-2.html"),
                ("http://test.com/i/1", "image/gif", "1.gif"),
                ("http://test.com/1.zip", "application/zip", "1.zip"),
                ("http://test.com/index.php?p=12", "text/html", "index-1.html"),
            ],
        );
    }

    #[test]
    fn test_flat_dir_mode() {
        check_table(
            SaveMode::FlatDir,
            &[
                ("http://test.com/", "text/html", "index.html"),
                ("http://test.com/test/", "text/html", "index-test.html"),
                ("http://test.com/test.html", "text/html", "test.html"),
                ("http://test.com/2/test.html", "text/html", "test-1.html"),
                ("http://test.com/3/test.html", "text/html", "test-2.html"),
                ("http://test.com/i/1", "image/gif", "img/1.gif"),
                ("http://test.com/1.zip", "application/zip", "download/1.zip"),
                ("http://test.com/index.php?p=12", "text/html", "index-1.html"),
            ],
        );
    }

    #[test]
    fn test_dir_mode() {
        check_table(
            SaveMode::Dir,
            &[
                ("http://test.com/", "text/html", "index.html"),
                ("http://test.com/test/", "text/html", "test/index.html"),
                ("http://test.com/test.html", "text/html", "test.html"),
                ("http://test.com/2/test.html", "text/html", "2/test.html"),
                ("http://test.com/3/test.html", "text/html", "3/test.html"),
                ("http://test.com/i/1", "image/gif", "i/1.gif"),
                ("http://test.com/1.zip", "application/zip", "1.zip"),
                ("http://test.com/index.php?p=12", "text/html", "index-1.html"),
            ],
        );
    }

    #[test]
    fn test_site_dir_mode() {
        check_table(
            SaveMode::SiteDir,
            &[
                ("http://test.com/", "text/html", "test.com/index.html"),
                ("http://test.com/test/", "text/html", "test.com/test/index.html"),
                ("http://test2.com/test.html", "text/html", "test2.com/test.html"),
                ("http://test.com/2/test.html", "text/html", "test.com/2/test.html"),
                ("http://test3.com/3/test.html", "text/html", "test3.com/3/test.html"),
                ("http://test.com/i/1", "image/gif", "test.com/i/1.gif"),
                ("http://test.com/1.zip", "application/zip", "test.com/1.zip"),
                ("http://test.com/index.php?p=12", "text/html", "test.com/index-1.html"),
                ("http://test3.com/index.php?p=12", "text/html", "test3.com/index.html"),
            ],
        );
    }

    #[test]
    fn test_site_dir_includes_port() {
        let fixture = Fixture::new(SaveMode::SiteDir);
        let got = fixture
            .allocate("http://test.com:8080/a.css", "text/css")
            .unwrap();
        assert_eq!(got, "test.com_8080/a.css");
    }

    #[test]
    fn test_percent_decoded_and_transliterated() {
        let fixture = Fixture::new(SaveMode::Dir);
        let got = fixture
            .allocate(
                "http://test.com/%D0%90%D0%BB%D0%B3%D0%BE%D1%80%D0%B8%D1%82%D0%BC/a%20b",
                "text/plain",
            )
            .unwrap();
        assert_eq!(got, "Algoritm/a_b.txt");
    }

    #[test]
    fn test_encoded_slashes_stay_inside_segment() {
        let allocator = FileAllocator::new(SaveMode::Dir, '_');
        let url = Url::parse("http://test.com/x/..%2F..%2F..%2Fpwned").unwrap();
        let candidate = allocator.candidate(&url, "text/plain");

        assert!(candidate.path.starts_with("x/"));
        assert_eq!(candidate.path.matches('/').count(), 1);
        assert!(candidate.path.split('/').all(|s| s != ".." && s != "."));

        let site = FileAllocator::new(SaveMode::SiteDir, '_');
        let candidate = site.candidate(&url, "text/plain");
        assert!(candidate.path.starts_with("test.com/x/"));
        assert_eq!(candidate.path.matches('/').count(), 2);
    }

    #[test]
    fn test_dot_segments_replaced() {
        let allocator = FileAllocator::new(SaveMode::Dir, '_');
        assert_eq!(allocator.sanitize_path("/a/%2E%2E/b"), "a/_/b");
        assert_eq!(allocator.sanitize_path("/a/./b"), "a/_/b");
        assert_eq!(allocator.sanitize_path("/a//b/"), "a/_/b/");
        assert_eq!(allocator.sanitize_path("/"), "");
        assert_eq!(allocator.sanitize_path("/a%2Fb/c"), "a_b/c");
    }

    #[test]
    fn test_existing_path_returned() {
        let fixture = Fixture::new(SaveMode::Flat);
        let task = Task::new(
            Url::parse("http://test.com/a.css").unwrap(),
            Budget::ZERO,
            1,
        )
        .unwrap();
        let (task, _) = fixture.registry.add_or_get(task);
        let first = fixture
            .allocator
            .allocate(&task, "text/css", &fixture.registry, &fixture.log)
            .unwrap();
        let second = fixture
            .allocator
            .allocate(&task, "text/css", &fixture.registry, &fixture.log)
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_allocation_logged_in_claim_order() {
        let fixture = Fixture::new(SaveMode::Flat);
        fixture.allocate("http://test.com/a.html", "text/html").unwrap();
        fixture.allocate("http://test.com/b/a.html", "text/html").unwrap();
        fixture.log.close().unwrap();

        let (_, entries) = ResumeLog::open(fixture.log.path()).unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.html", "a-1.html"]);
        assert_eq!(entries[1].url, "http://test.com/b/a.html");
    }

    #[test]
    fn test_suffix_overflow() {
        let dir = TempDir::new().unwrap();
        let log = ResumeLog::create(&dir.path().join("webmirror.map")).unwrap();
        let registry = TaskRegistry::new();
        let allocator = FileAllocator::new(SaveMode::Flat, '_').with_suffix_limit(2);

        let mut results = Vec::new();
        for url in [
            "http://test.com/a.txt",
            "http://test.com/1/a.txt",
            "http://test.com/2/a.txt",
            "http://test.com/3/a.txt",
        ] {
            let task = Task::new(Url::parse(url).unwrap(), Budget::ZERO, 1).unwrap();
            let (task, _) = registry.add_or_get(task);
            results.push(allocator.allocate(&task, "text/plain", &registry, &log));
        }

        assert_eq!(results[0].as_ref().unwrap(), "a.txt");
        assert_eq!(results[1].as_ref().unwrap(), "a-1.txt");
        assert_eq!(results[2].as_ref().unwrap(), "a-2.txt");
        assert!(matches!(
            results[3],
            Err(MirrorError::AllocationOverflow { .. })
        ));
    }

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("a/b.tar.gz"), ("a/b.tar", ".gz"));
        assert_eq!(split_extension("a.b/c"), ("a.b/c", ""));
        assert_eq!(split_extension("name."), ("name", "."));
        assert_eq!(split_extension("index"), ("index", ""));
    }

    #[test]
    fn test_html_extension_replaced() {
        assert_eq!(with_extension("page.php", "text/html").path, "page.html");
        assert_eq!(with_extension("page.htm", "text/html").path, "page.htm");
        assert_eq!(with_extension("data.php", "text/plain").path, "data.php");
        assert_eq!(with_extension("blob", "application/octet-stream").path, "blob");
    }
}
