//! Output module for run reports
//!
//! This module handles:
//! - Aggregating the task registry into end-of-run statistics
//! - Printing the summary shown by the CLI

pub mod stats;

pub use stats::{print_statistics, CrawlStatistics};
