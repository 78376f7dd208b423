//! Task registry
//!
//! Concurrent store of every task known to a run. It keeps two indexes:
//! - normalized URL → task (exactly one task per URL, never removed)
//! - allocated relative path → task (exactly one task per output file)
//!
//! Paths used by the mirror itself are reserved and never handed to a task.

use crate::state::{Budget, Task};
use crate::storage::LogEntry;
use crate::url::normalize_url;
use crate::{MirrorError, Result};
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use std::sync::Arc;

/// Registry of tasks by URL and by allocated path
#[derive(Debug, Default)]
pub struct TaskRegistry {
    by_url: DashMap<String, Arc<Task>>,
    by_path: DashMap<String, Arc<Task>>,
    reserved: DashSet<String>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a task unless one already exists for its URL
    ///
    /// Concurrent callers for the same URL observe exactly one winner; the
    /// others get the winner's task back.
    ///
    /// # Returns
    ///
    /// The registered task and whether it already existed
    pub fn add_or_get(&self, task: impl Into<Arc<Task>>) -> (Arc<Task>, bool) {
        let task = task.into();
        match self.by_url.entry(task.url().to_string()) {
            Entry::Occupied(entry) => (Arc::clone(entry.get()), true),
            Entry::Vacant(entry) => {
                entry.insert(Arc::clone(&task));
                (task, false)
            }
        }
    }

    pub fn lookup_by_url(&self, url: &str) -> Option<Arc<Task>> {
        self.by_url.get(url).map(|entry| Arc::clone(entry.value()))
    }

    pub fn lookup_by_path(&self, path: &str) -> Option<Arc<Task>> {
        self.by_path.get(path).map(|entry| Arc::clone(entry.value()))
    }

    /// Raises a task's budget; returns true if any field changed
    pub fn merge_budget(&self, task: &Task, proposed: Budget) -> bool {
        task.merge_budget(proposed)
    }

    /// Keeps a path out of allocation
    pub fn reserve_path(&self, path: &str) {
        self.reserved.insert(path.to_string());
    }

    pub fn is_reserved(&self, path: &str) -> bool {
        self.reserved.contains(path)
    }

    /// Claims an output path for a task
    ///
    /// Returns false if the path is reserved or another task already holds it.
    pub fn claim_path(&self, path: &str, task: &Arc<Task>) -> bool {
        if self.is_reserved(path) {
            return false;
        }
        match self.by_path.entry(path.to_string()) {
            Entry::Occupied(entry) => Arc::ptr_eq(entry.get(), task),
            Entry::Vacant(entry) => {
                entry.insert(Arc::clone(task));
                true
            }
        }
    }

    /// Registers a task replayed from the resume log
    ///
    /// The task gets an empty budget; roots and rescans raise it later.
    ///
    /// # Errors
    ///
    /// Returns `MirrorError::Persistence` if the entry holds an invalid URL
    /// or a path that already belongs to another task.
    pub fn restore(&self, entry: &LogEntry, retries: u32) -> Result<Arc<Task>> {
        let url = normalize_url(&entry.url)
            .map_err(|e| MirrorError::Persistence(format!("invalid URL {}: {}", entry.url, e)))?;
        let candidate = Task::restored(url, &entry.file_name, &entry.content_type, retries)?;
        let (task, existed) = self.add_or_get(candidate);
        if existed {
            task.restore_file(&entry.file_name, &entry.content_type);
        }

        if !self.claim_path(&entry.file_name, &task) {
            return Err(MirrorError::Persistence(format!(
                "{} is mapped to more than one URL",
                entry.file_name
            )));
        }
        Ok(task)
    }

    /// Snapshot of every registered task
    pub fn tasks(&self) -> Vec<Arc<Task>> {
        self.by_url
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_url.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_url.is_empty()
    }
}
