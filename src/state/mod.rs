//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `Budget`: the three traversal counters a task carries
//! - `Task`: one unit of crawl work per normalized URL, shared between workers
//! - `TaskState`: the download state of a task (file, content type, success)

mod budget;
mod task;

// Re-export main types
pub use budget::Budget;
pub use task::{Protocol, RunGuard, Task, TaskState, HTML_CONTENT_TYPE};
