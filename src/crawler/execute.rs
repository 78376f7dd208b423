//! Task execution
//!
//! One dequeued task is taken through its state machine here:
//! - Resume confirmation of files left by an earlier run
//! - Rescanning saved pages whose budget rose
//! - Fetching, allocating an output path and persisting the body
//! - Rewriting HTML and registering the links it holds
//! - Classifying failures into retry, abandon and abort

use crate::crawler::depth::propagate;
use crate::crawler::fetcher::{content_type_of, fetch, html_text};
use crate::crawler::links::relative_link;
use crate::crawler::parser::{rewrite_html, LinkKind};
use crate::crawler::scheduler::IDLE_BACKOFF;
use crate::crawler::Mirror;
use crate::state::{Budget, Task};
use crate::storage::{write_page, PartFile};
use crate::url::normalize_url;
use crate::{MirrorError, Result};
use std::io::ErrorKind;
use std::sync::Arc;
use url::Url;

impl Mirror {
    /// Runs one dequeued task
    ///
    /// The task is resolved against the registry first so budgets carried by
    /// a foreign copy are not lost. Contention on the run lock puts the task
    /// back at the end of the queue after `IDLE_BACKOFF`.
    pub(crate) async fn process(&self, task: Arc<Task>) {
        let (registered, existed) = self.registry().add_or_get(Arc::clone(&task));
        if existed && !Arc::ptr_eq(&registered, &task) {
            self.registry().merge_budget(&registered, task.budget());
        }
        let task = registered;

        if task.is_settled() {
            tracing::trace!("Skipping settled task {}", task.url());
            return;
        }

        let Some(_guard) = task.try_lock() else {
            // Back off so a lone holder isn't spun on, then requeue unless
            // the holder settled it meanwhile
            tokio::time::sleep(IDLE_BACKOFF).await;
            if !task.is_settled() {
                tracing::trace!("Task {} is running elsewhere, requeueing", task.url());
                self.queue().push(Arc::clone(&task));
            }
            return;
        };

        self.execute(&task).await;
    }

    async fn execute(&self, task: &Arc<Task>) {
        task.confirm();

        if let Err(e) = self.confirm_existing(task).await {
            self.handle_failure(task, e);
            return;
        }

        if task.is_success() {
            if task.is_html() && task.needs_scan() {
                if let Err(e) = self.rescan(task).await {
                    self.handle_failure(task, e);
                }
            }
            return;
        }

        if task.retries_left() == 0 {
            return;
        }

        match self.download(task).await {
            Ok(()) => tracing::info!(
                url = %task.url(),
                file = %task.file_name().unwrap_or_default(),
                size = task.size(),
                "Downloaded"
            ),
            Err(e) => self.handle_failure(task, e),
        }
    }

    /// Marks a task successful if an earlier run already wrote its file
    async fn confirm_existing(&self, task: &Task) -> Result<()> {
        if task.is_success() {
            return Ok(());
        }
        let Some(file_name) = task.file_name() else {
            return Ok(());
        };

        match tokio::fs::metadata(self.out_dir().join(&file_name)).await {
            Ok(meta) if meta.is_dir() => Err(MirrorError::NotAFile { path: file_name }),
            Ok(meta) => {
                tracing::debug!("{} already downloaded as {}", task.url(), file_name);
                task.mark_success(meta.len());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Fetches a task and persists its body
    async fn download(&self, task: &Arc<Task>) -> Result<()> {
        let mut response = fetch(self.client(), task.parsed_url()).await?;

        let file_name = match task.file_name() {
            Some(file_name) => file_name,
            None => {
                let content_type = content_type_of(&response);
                self.allocator()
                    .allocate(task, &content_type, self.registry(), self.log())?
            }
        };
        let target = self.out_dir().join(&file_name);

        if task.is_html() {
            // Relative links resolve against the final URL after redirects
            let base = response.url().clone();
            let body = html_text(response).await?;
            let budget = task.budget();
            let page = self.rewrite_page(task, &file_name, &base, &body, true, budget);
            let size = write_page(&target, &page).await?;
            task.mark_success(size);
            task.mark_scanned(budget);
        } else {
            let mut part = PartFile::create(&target).await?;
            while let Some(chunk) = response.chunk().await? {
                part.write(&chunk).await?;
            }
            let size = part.commit().await?;
            task.mark_success(size);
        }

        Ok(())
    }

    /// Re-parses a saved page with its current budget, without network
    async fn rescan(&self, task: &Arc<Task>) -> Result<()> {
        let Some(file_name) = task.file_name() else {
            return Ok(());
        };
        let path = self.out_dir().join(&file_name);
        let input = tokio::fs::read_to_string(&path).await?;

        let budget = task.budget();
        let page = self.rewrite_page(task, &file_name, task.parsed_url(), &input, false, budget);
        if page != input {
            write_page(&path, &page).await?;
        }
        task.mark_scanned(budget);

        tracing::debug!("Rescanned {} with budget {}", file_name, budget);
        Ok(())
    }

    /// Rewrites a page, registering every link it holds
    fn rewrite_page(
        &self,
        page: &Task,
        page_file: &str,
        base: &Url,
        input: &str,
        first_parse: bool,
        budget: Budget,
    ) -> String {
        rewrite_html(input, base, first_parse, |url, kind| {
            let target = self.discover(page, budget, url, kind)?;
            if !target.is_success() {
                return None;
            }
            let target_file = target.file_name()?;
            Some(relative_link(page_file, &target_file))
        })
    }

    /// Registers a link found on `parent` and schedules it if needed
    ///
    /// Page links out of budget are not registered, but an existing task for
    /// them is still returned so the link can point at a local copy.
    fn discover(&self, parent: &Task, budget: Budget, url: &Url, kind: LinkKind) -> Option<Arc<Task>> {
        let url = normalize_url(url.as_str()).ok()?;
        let child = propagate(budget, parent.parsed_url(), &url);

        if kind == LinkKind::Page && child.links < 1 {
            return self.registry().lookup_by_url(url.as_str());
        }

        let candidate = Task::new(url, child, self.config().retry).ok()?;
        let (task, existed) = self.registry().add_or_get(candidate);

        let schedule = !existed
            || self.registry().merge_budget(&task, child)
            || task.is_unconfirmed();
        if schedule {
            tracing::trace!("Discovered {} with budget {}", task.url(), child);
            self.queue().push(Arc::clone(&task));
        }

        Some(task)
    }

    /// Records a failed attempt and decides what happens to the task
    fn handle_failure(&self, task: &Arc<Task>, error: MirrorError) {
        let url = task.url();
        let file = task.file_name().unwrap_or_default();

        match error {
            MirrorError::Persistence(_) => {
                tracing::error!(url = %url, file = %file, "{}", error);
                self.abort();
            }
            ref e if e.is_retriable() => {
                self.queue().set_failed();
                let left = task.consume_retry();
                if left > 0 {
                    tracing::warn!(url = %url, file = %file, retries_left = left, "{}", e);
                    self.queue().push(Arc::clone(task));
                } else {
                    tracing::error!(url = %url, file = %file, "{}, giving up", e);
                }
            }
            e => {
                self.queue().set_failed();
                task.exhaust_retries();
                tracing::error!(url = %url, file = %file, "{}", e);
            }
        }
    }
}
