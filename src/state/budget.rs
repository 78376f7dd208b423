use serde::{Deserialize, Serialize};
use std::fmt;

/// Traversal budget carried by a task
///
/// The three counters are independent:
/// - `links`: how many more page hops may be followed on the same site
/// - `down_level`: how many directory levels a same-site hop may climb
/// - `ext_links`: the same-site budget handed to a page on another host
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Budget {
    pub links: u32,
    pub down_level: u32,
    pub ext_links: u32,
}

impl Budget {
    /// The empty budget: nothing propagates from a task holding it
    pub const ZERO: Budget = Budget {
        links: 0,
        down_level: 0,
        ext_links: 0,
    };

    pub const fn new(links: u32, down_level: u32, ext_links: u32) -> Self {
        Self {
            links,
            down_level,
            ext_links,
        }
    }

    /// Raises every field to the maximum of `self` and `other`
    ///
    /// Returns true if any field changed.
    pub fn merge(&mut self, other: Budget) -> bool {
        let mut changed = false;
        if other.links > self.links {
            self.links = other.links;
            changed = true;
        }
        if other.down_level > self.down_level {
            self.down_level = other.down_level;
            changed = true;
        }
        if other.ext_links > self.ext_links {
            self.ext_links = other.ext_links;
            changed = true;
        }
        changed
    }

    /// Returns true if `self` is at least `other` in every field
    pub fn covers(&self, other: &Budget) -> bool {
        self.links >= other.links
            && self.down_level >= other.down_level
            && self.ext_links >= other.ext_links
    }
}

impl fmt::Display for Budget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.links, self.down_level, self.ext_links)
    }
}
