use crate::state::Budget;
use crate::MirrorError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use url::Url;

/// Content type of pages that are parsed and rewritten
pub const HTML_CONTENT_TYPE: &str = "text/html";

/// Transfer protocol of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Unsupported,
    Http,
}

impl Protocol {
    /// Maps a URL scheme to a protocol
    pub fn from_scheme(scheme: &str) -> Self {
        match scheme {
            "http" | "https" => Self::Http,
            _ => Self::Unsupported,
        }
    }
}

/// Download state of a task, guarded by the task's state lock
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskState {
    /// Relative output path, assigned once by the allocator
    pub file_name: Option<String>,

    /// Content type without parameters, empty until known
    pub content_type: String,

    /// Content is durably written
    pub success: bool,

    /// Bytes written
    pub size: u64,

    /// Fetch attempts left; 0 means the task is abandoned
    pub retries_left: u32,

    /// Budget the page's links were last propagated with
    pub scanned: Option<Budget>,

    /// Replayed from the resume log and not executed in this run yet
    pub unconfirmed: bool,
}

/// The unit of crawl work for one normalized URL
///
/// A task is shared between workers through an `Arc`. Its fields are
/// synchronized individually: the budget has its own merge lock so any
/// discoverer can raise it, the run flag gives one worker at a time the right
/// to fetch, and the download state is only written by the run flag holder.
#[derive(Debug)]
pub struct Task {
    url: Url,
    key: String,
    protocol: Protocol,
    budget: Mutex<Budget>,
    state: Mutex<TaskState>,
    running: AtomicBool,
}

/// Exclusive right to execute a task, released on drop
#[derive(Debug)]
pub struct RunGuard<'a> {
    task: &'a Task,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.task.running.store(false, Ordering::Release);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Task {
    /// Creates a task for a normalized URL
    ///
    /// # Errors
    ///
    /// Returns `MirrorError::UnsupportedProtocol` if the URL scheme cannot
    /// be fetched.
    pub fn new(url: Url, budget: Budget, retries: u32) -> Result<Self, MirrorError> {
        let protocol = Protocol::from_scheme(url.scheme());
        if protocol == Protocol::Unsupported {
            return Err(MirrorError::UnsupportedProtocol {
                url: url.to_string(),
            });
        }

        Ok(Self {
            key: url.as_str().to_string(),
            url,
            protocol,
            budget: Mutex::new(budget),
            state: Mutex::new(TaskState {
                retries_left: retries,
                ..TaskState::default()
            }),
            running: AtomicBool::new(false),
        })
    }

    /// Creates a task reloaded from the resume log
    pub fn restored(
        url: Url,
        file_name: &str,
        content_type: &str,
        retries: u32,
    ) -> Result<Self, MirrorError> {
        let task = Self::new(url, Budget::ZERO, retries)?;
        task.restore_file(file_name, content_type);
        Ok(task)
    }

    /// The registry key of this task
    pub fn url(&self) -> &str {
        &self.key
    }

    /// The parsed URL of this task
    pub fn parsed_url(&self) -> &Url {
        &self.url
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Current traversal budget
    pub fn budget(&self) -> Budget {
        *lock(&self.budget)
    }

    /// Raises each budget field to the proposed value if it is larger
    ///
    /// Returns true if any field changed. Budgets never decrease.
    pub fn merge_budget(&self, proposed: Budget) -> bool {
        lock(&self.budget).merge(proposed)
    }

    /// Tries to take the run flag without blocking
    ///
    /// Returns None if another worker is executing this task.
    pub fn try_lock(&self) -> Option<RunGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard { task: self })
    }

    /// Returns true while a worker holds the run flag
    pub fn is_locked(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Copy of the download state
    pub fn state(&self) -> TaskState {
        lock(&self.state).clone()
    }

    pub fn file_name(&self) -> Option<String> {
        lock(&self.state).file_name.clone()
    }

    pub fn content_type(&self) -> String {
        lock(&self.state).content_type.clone()
    }

    pub fn is_success(&self) -> bool {
        lock(&self.state).success
    }

    pub fn is_html(&self) -> bool {
        lock(&self.state).content_type == HTML_CONTENT_TYPE
    }

    pub fn size(&self) -> u64 {
        lock(&self.state).size
    }

    pub fn retries_left(&self) -> u32 {
        lock(&self.state).retries_left
    }

    /// Records the allocated path and content type
    ///
    /// The path is assigned at most once; returns false and leaves the task
    /// unchanged if it already has one.
    pub fn assign_file(&self, file_name: &str, content_type: &str) -> bool {
        let mut state = lock(&self.state);
        if state.file_name.is_some() {
            return false;
        }
        state.file_name = Some(file_name.to_string());
        state.content_type = content_type.to_string();
        true
    }

    /// Overwrites path and content type with values replayed from the log
    ///
    /// The task stays unconfirmed until a worker executes it.
    pub fn restore_file(&self, file_name: &str, content_type: &str) {
        let mut state = lock(&self.state);
        state.file_name = Some(file_name.to_string());
        state.content_type = content_type.to_string();
        state.unconfirmed = true;
    }

    /// Returns true for a replayed task no worker has looked at yet
    pub fn is_unconfirmed(&self) -> bool {
        lock(&self.state).unconfirmed
    }

    /// Records that a worker executed the task in this run
    pub fn confirm(&self) {
        lock(&self.state).unconfirmed = false;
    }

    /// Marks the content as durably written
    pub fn mark_success(&self, size: u64) {
        let mut state = lock(&self.state);
        state.success = true;
        state.size = size;
    }

    /// Abandons the task: no further fetch attempts
    pub fn exhaust_retries(&self) {
        lock(&self.state).retries_left = 0;
    }

    /// Uses up one fetch attempt and returns how many are left
    pub fn consume_retry(&self) -> u32 {
        let mut state = lock(&self.state);
        state.retries_left = state.retries_left.saturating_sub(1);
        state.retries_left
    }

    /// Returns true if the page's links have not been propagated with the
    /// current budget yet
    pub fn needs_scan(&self) -> bool {
        let budget = self.budget();
        match lock(&self.state).scanned {
            Some(scanned) => !scanned.covers(&budget),
            None => true,
        }
    }

    /// Records the budget the page's links were propagated with
    pub fn mark_scanned(&self, budget: Budget) {
        lock(&self.state).scanned = Some(budget);
    }

    /// Returns true if a dequeued task has nothing left to do
    ///
    /// Downloaded non-HTML tasks are done. Downloaded pages are done until
    /// their budget rises above the one they were last scanned with.
    pub fn is_settled(&self) -> bool {
        let state = self.state();
        if !state.success {
            return false;
        }
        if state.content_type != HTML_CONTENT_TYPE {
            return true;
        }
        match state.scanned {
            Some(scanned) => scanned.covers(&self.budget()),
            None => false,
        }
    }
}
