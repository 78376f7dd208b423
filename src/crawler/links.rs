//! Local link conversion
//!
//! Links in mirrored pages point at the absolute URL until their target has
//! been downloaded. Once the crawl is over, every page is rewritten so links
//! to mirrored resources use relative local paths.

use crate::crawler::parser::rewrite_html;
use crate::crawler::registry::TaskRegistry;
use crate::storage::write_page;
use crate::url::normalize_url;
use crate::Result;
use std::path::Path;
use url::Url;

/// Relative href from the page at `from_file` to `to_file`
///
/// Both arguments are paths relative to the mirror root using `/`. A `%`
/// left by the allocator is escaped so browsers don't decode it.
///
/// # Example
///
/// ```
/// use webmirror::crawler::relative_link;
///
/// assert_eq!(relative_link("a/b/index.html", "a/c/x.css"), "../c/x.css");
/// ```
pub fn relative_link(from_file: &str, to_file: &str) -> String {
    let mut from_dirs: Vec<&str> = from_file.split('/').collect();
    from_dirs.pop();
    let to_parts: Vec<&str> = to_file.split('/').collect();
    let to_dirs = &to_parts[..to_parts.len() - 1];

    let common = from_dirs
        .iter()
        .zip(to_dirs)
        .take_while(|(a, b)| a == b)
        .count();

    let mut link = "../".repeat(from_dirs.len() - common);
    link.push_str(&to_parts[common..].join("/"));
    link.replace('%', "%25")
}

/// Local href for `target` as seen from the page at `page_file`
///
/// Returns `None` unless the target is a task that finished downloading.
pub(crate) fn local_href(registry: &TaskRegistry, page_file: &str, target: &Url) -> Option<String> {
    let url = normalize_url(target.as_str()).ok()?;
    let task = registry.lookup_by_url(url.as_str())?;
    if !task.is_success() {
        return None;
    }
    let file_name = task.file_name()?;
    Some(relative_link(page_file, &file_name))
}

/// Outcome of a link conversion pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkConversion {
    /// Pages written back with local links
    pub converted: usize,
    /// Pages that could not be read or written
    pub failed: usize,
}

/// Rewrites links in every downloaded page to local paths
///
/// Pages are re-read from disk and only written back when their content
/// changed. A page that cannot be read or written is logged and counted,
/// and the pass moves on to the next one.
pub async fn convert_links(registry: &TaskRegistry, out_dir: &Path) -> LinkConversion {
    let mut outcome = LinkConversion::default();

    for task in registry.tasks() {
        if !task.is_success() || !task.is_html() {
            continue;
        }
        let Some(file_name) = task.file_name() else {
            continue;
        };

        match convert_page(registry, out_dir, task.parsed_url(), &file_name).await {
            Ok(true) => {
                tracing::debug!("Converted links in {}", file_name);
                outcome.converted += 1;
            }
            Ok(false) => {}
            Err(e) => {
                tracing::error!("Cannot convert links in {}: {}", file_name, e);
                outcome.failed += 1;
            }
        }
    }

    outcome
}

/// Returns true if the page changed
async fn convert_page(
    registry: &TaskRegistry,
    out_dir: &Path,
    page_url: &Url,
    file_name: &str,
) -> Result<bool> {
    let path = out_dir.join(file_name);
    let input = tokio::fs::read_to_string(&path).await?;
    let output = rewrite_html(&input, page_url, false, |url, _| {
        local_href(registry, file_name, url)
    });

    if output == input {
        return Ok(false);
    }
    write_page(&path, &output).await?;
    Ok(true)
}
