//! Work queue and worker loop
//!
//! This module handles:
//! - The FIFO queue of tasks waiting to run
//! - Counting workers that are busy with a dequeued task
//! - Detecting quiescence (empty queue, no busy worker) to end the run
//! - Waking idle workers on new work, quiescence and abort
//! - The run flags: `running` (cooperative stop) and `failed` (outcome)

use crate::crawler::Mirror;
use crate::state::Task;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, trace};

/// How long an idle worker sleeps when nothing wakes it
pub const IDLE_BACKOFF: Duration = Duration::from_millis(200);

/// Result of polling the queue
#[derive(Debug)]
pub enum Poll {
    /// A task to run; the caller is counted busy until `finish`
    Task(Arc<Task>),

    /// Nothing queued but another worker is busy and may enqueue more
    Empty,

    /// Nothing queued and no worker busy: the run is over
    Quiescent,
}

#[derive(Debug, Default)]
struct QueueState {
    items: VecDeque<Arc<Task>>,
    active: usize,
}

/// Shared FIFO queue with busy-worker accounting
#[derive(Debug)]
pub struct TaskQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    running: AtomicBool,
    failed: AtomicBool,
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            running: AtomicBool::new(true),
            failed: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a task and wakes one idle worker
    pub fn push(&self, task: Arc<Task>) {
        self.lock().items.push_back(task);
        self.notify.notify_one();
    }

    /// Takes the next task, marking the caller busy
    ///
    /// Dequeue and activation happen under the same lock, so no worker can
    /// observe an empty queue with zero busy workers while a task is being
    /// handed out.
    pub fn poll(&self) -> Poll {
        let mut state = self.lock();
        match state.items.pop_front() {
            Some(task) => {
                state.active += 1;
                Poll::Task(task)
            }
            None if state.active == 0 => Poll::Quiescent,
            None => Poll::Empty,
        }
    }

    /// Marks the caller idle after running a polled task
    ///
    /// Tasks enqueued while running (retries, discoveries) must be pushed
    /// before this call. The last busy worker to finish with an empty queue
    /// wakes every idle worker so they observe quiescence.
    pub fn finish(&self) {
        let quiescent = {
            let mut state = self.lock();
            state.active = state.active.saturating_sub(1);
            state.active == 0 && state.items.is_empty()
        };
        if quiescent {
            self.notify.notify_waiters();
        }
    }

    /// Waits for an enqueue notification or the backoff, whichever is first
    pub async fn wait_for_work(&self, backoff: Duration) {
        let _ = tokio::time::timeout(backoff, self.notify.notified()).await;
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn is_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    /// Records that some task failed; the run keeps going
    pub fn set_failed(&self) {
        self.failed.store(true, Ordering::Release);
    }

    /// Stops the run: workers exit after their current task
    pub fn abort(&self) {
        self.failed.store(true, Ordering::Release);
        self.running.store(false, Ordering::Release);
        self.notify.notify_waiters();
    }
}

/// Worker loop: runs tasks until the run is quiescent or aborted
pub(crate) async fn run_worker(mirror: Arc<Mirror>, id: usize) {
    debug!(worker = id, "Starting");

    while mirror.queue().is_running() {
        match mirror.queue().poll() {
            Poll::Task(task) => {
                trace!(worker = id, url = %task.url(), "Dequeued");
                mirror.process(task).await;
                mirror.queue().finish();
            }
            Poll::Empty => mirror.queue().wait_for_work(IDLE_BACKOFF).await,
            Poll::Quiescent => break,
        }
    }

    debug!(worker = id, "Exit");
}
