//! Crawler module for mirroring websites
//!
//! This module contains the core crawling logic, including:
//! - Budget propagation across links
//! - The task registry and the work queue
//! - HTTP fetching, charset detection and HTML rewriting
//! - Task execution and post-crawl link conversion
//! - The `Mirror` aggregate tying a run together

mod charset;
mod depth;
mod execute;
mod fetcher;
mod links;
mod mirror;
mod parser;
mod registry;
mod scheduler;

pub use charset::{decode_html, detect_encoding};
pub use depth::propagate;
pub use fetcher::{
    build_http_client, content_type_of, fetch, html_text, normalize_content_type,
    DEFAULT_CONTENT_TYPE,
};
pub use links::{convert_links, relative_link, LinkConversion};
pub use mirror::{Crawl, Mirror};
pub use parser::{rewrite_html, LinkKind, ABSOLUTE_URL_ATTR};
pub use registry::TaskRegistry;
pub use scheduler::{Poll, TaskQueue, IDLE_BACKOFF};
