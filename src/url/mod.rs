//! URL handling module for webmirror
//!
//! This module provides URL normalization (the task registry key) and the
//! site/directory helpers used by the depth policy.

mod dirs;
mod normalize;

pub use dirs::{base_dir, levels_below, root_dir, site_key};
pub use normalize::{is_supported_scheme, normalize_url};

use url::Url;

/// Resolves a link found on a page into an absolute URL
///
/// Returns None if the link should not be considered at all:
/// - empty or fragment-only references
/// - javascript:, mailto:, tel: and data: references
/// - references that do not resolve against `base`
///
/// The returned URL has its fragment removed; its scheme is not checked, so
/// callers decide what to do with non-HTTP links.
pub fn resolve_link(href: &str, base: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
    {
        return None;
    }

    let mut absolute = base.join(href).ok()?;
    absolute.set_fragment(None);
    Some(absolute)
}
