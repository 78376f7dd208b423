//! Depth policy for discovered links
//!
//! This module decides how much traversal budget a discovered link inherits
//! from the page it was found on. It handles:
//! - Links inside the parent's directory subtree (one hop used)
//! - Links that climb to a sibling or ancestor directory (hop plus levels used)
//! - Links to other hosts (the external budget becomes the link budget)

use crate::state::Budget;
use crate::url::{base_dir, levels_below, root_dir, site_key};
use url::Url;

/// Computes the budget a candidate URL inherits from its parent page
///
/// # Arguments
///
/// * `parent` - The budget of the page the link was found on
/// * `parent_url` - The URL of that page
/// * `candidate` - The absolute URL of the discovered link
///
/// # Returns
///
/// The child budget. `Budget::ZERO` means the link must not be followed as a
/// page (requisites may still be fetched with it).
///
/// # Example
///
/// ```
/// use url::Url;
/// use webmirror::crawler::propagate;
/// use webmirror::Budget;
///
/// let parent = Url::parse("http://example.com/a/b/").unwrap();
/// let child = Url::parse("http://example.com/a/b/c/").unwrap();
/// assert_eq!(propagate(Budget::new(2, 2, 1), &parent, &child), Budget::new(1, 2, 1));
/// ```
pub fn propagate(parent: Budget, parent_url: &Url, candidate: &Url) -> Budget {
    if parent.links == 0 {
        return Budget::ZERO;
    }

    if site_key(candidate) != site_key(parent_url) {
        return Budget::new(parent.ext_links, 0, 0);
    }

    let parent_dir = base_dir(parent_url.path());
    let path = candidate.path();

    if path.starts_with(parent_dir) {
        return Budget::new(parent.links - 1, parent.down_level, parent.ext_links);
    }

    let common = root_dir(base_dir(path), parent_dir);
    let climbed = levels_below(parent_dir, common);
    if climbed <= parent.down_level {
        Budget::new(
            parent.links - 1,
            parent.down_level - climbed,
            parent.ext_links,
        )
    } else {
        Budget::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(parent: Budget, from: &str, to: &str) -> Budget {
        propagate(
            parent,
            &Url::parse(from).unwrap(),
            &Url::parse(to).unwrap(),
        )
    }

    #[test]
    fn test_same_subtree() {
        let budget = check(
            Budget::new(2, 2, 1),
            "http://host1/a/b/",
            "http://host1/a/b/c/",
        );
        assert_eq!(budget, Budget::new(1, 2, 1));
    }

    #[test]
    fn test_sibling_directory_uses_down_level() {
        let budget = check(
            Budget::new(3, 1, 1),
            "http://host1/a/b/",
            "http://host1/a/d/",
        );
        assert_eq!(budget, Budget::new(2, 0, 1));
    }

    #[test]
    fn test_parent_directory_without_down_level() {
        let budget = check(Budget::new(2, 0, 1), "http://host1/a/b/", "http://host1/a/");
        assert_eq!(budget, Budget::ZERO);
    }

    #[test]
    fn test_external_host() {
        let budget = check(
            Budget::new(2, 1, 3),
            "http://host1/a/b/",
            "http://host2/a/b/",
        );
        assert_eq!(budget, Budget::new(3, 0, 0));
    }

    #[test]
    fn test_exhausted_links() {
        let budget = check(Budget::new(0, 5, 5), "http://host1/", "http://host2/");
        assert_eq!(budget, Budget::ZERO);
    }

    #[test]
    fn test_file_in_parent_directory() {
        let budget = check(
            Budget::new(2, 0, 0),
            "http://host1/a/page.html",
            "http://host1/a/other.html",
        );
        assert_eq!(budget, Budget::new(1, 0, 0));
    }

    #[test]
    fn test_scheme_does_not_change_site() {
        let budget = check(
            Budget::new(2, 0, 4),
            "http://host1/a/",
            "https://host1/a/x.html",
        );
        assert_eq!(budget, Budget::new(1, 0, 4));
    }

    #[test]
    fn test_port_changes_site() {
        let budget = check(
            Budget::new(2, 0, 4),
            "http://host1/a/",
            "http://host1:8080/a/",
        );
        assert_eq!(budget, Budget::new(4, 0, 0));
    }

    #[test]
    fn test_climb_two_levels() {
        let budget = check(
            Budget::new(5, 2, 0),
            "http://host1/a/b/c/",
            "http://host1/a/x.html",
        );
        assert_eq!(budget, Budget::new(4, 0, 0));

        let budget = check(
            Budget::new(5, 1, 0),
            "http://host1/a/b/c/",
            "http://host1/a/x.html",
        );
        assert_eq!(budget, Budget::ZERO);
    }
}
