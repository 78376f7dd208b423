//! Statistics of a finished run
//!
//! This module aggregates the task registry into an end-of-run summary and
//! prints it.

use crate::state::Task;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

/// Crawl statistics summary
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    /// Total number of tasks registered
    pub total: u64,

    /// Tasks whose content is on disk
    pub succeeded: u64,

    /// Tasks abandoned with no attempts left
    pub failed: u64,

    /// Tasks neither downloaded nor abandoned (e.g. after an abort)
    pub pending: u64,

    /// Bytes written by successful tasks
    pub bytes: u64,

    /// Successful tasks by content type
    pub by_content_type: HashMap<String, u64>,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl CrawlStatistics {
    /// Aggregates a snapshot of tasks
    pub fn collect(tasks: &[Arc<Task>], started_at: DateTime<Utc>, finished_at: DateTime<Utc>) -> Self {
        let mut stats = Self {
            total: tasks.len() as u64,
            succeeded: 0,
            failed: 0,
            pending: 0,
            bytes: 0,
            by_content_type: HashMap::new(),
            started_at,
            finished_at,
        };

        for task in tasks {
            let state = task.state();
            if state.success {
                stats.succeeded += 1;
                stats.bytes += state.size;
                *stats.by_content_type.entry(state.content_type).or_insert(0) += 1;
            } else if state.retries_left == 0 {
                stats.failed += 1;
            } else {
                stats.pending += 1;
            }
        }

        stats
    }

    pub fn duration_seconds(&self) -> i64 {
        (self.finished_at - self.started_at).num_seconds()
    }
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Mirror Statistics ===\n");

    println!("Overview:");
    println!("  Started: {}", stats.started_at.to_rfc3339());
    println!("  Finished: {}", stats.finished_at.to_rfc3339());
    println!("  Duration: {}s", stats.duration_seconds());
    println!("  Total tasks: {}", stats.total);
    println!("  Downloaded: {}", stats.succeeded);
    println!("  Failed: {}", stats.failed);
    println!("  Pending: {}", stats.pending);
    println!("  Bytes written: {}", stats.bytes);
    println!();

    if !stats.by_content_type.is_empty() {
        println!("Downloads by Content Type:");
        let mut counts: Vec<_> = stats.by_content_type.iter().collect();
        counts.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

        for (content_type, count) in counts {
            println!("  {}: {}", content_type, count);
        }
        println!();
    }

    let success_rate = if stats.total > 0 {
        (stats.succeeded as f64 / stats.total as f64) * 100.0
    } else {
        0.0
    };

    println!(
        "Success Rate: {:.1}% ({} / {} tasks downloaded)",
        success_rate, stats.succeeded, stats.total
    );
}
