//! Mirror run - the owned aggregate behind one crawl
//!
//! This module contains the state of a single run and its lifecycle:
//! - Creating a fresh output directory with a config snapshot and resume log
//! - Reopening an existing directory and replaying its resume log
//! - Seeding root URLs
//! - Spawning the worker pool and joining it
//! - Post-crawl link conversion and closing the resume log

use crate::config::{load_config_with_hash, save_config, validate, MirrorConfig, RootUrl};
use crate::crawler::links::convert_links;
use crate::crawler::registry::TaskRegistry;
use crate::crawler::scheduler::{run_worker, TaskQueue};
use crate::crawler::build_http_client;
use crate::output::CrawlStatistics;
use crate::state::{Budget, Task};
use crate::storage::{FileAllocator, ResumeLog, CONFIG_FILE, MAP_FILE};
use crate::url::normalize_url;
use crate::{MirrorError, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// State shared by every worker of one run
///
/// Each run builds its own `Mirror`; nothing is process-global.
#[derive(Debug)]
pub struct Mirror {
    config: MirrorConfig,
    out_dir: PathBuf,
    client: Client,
    registry: TaskRegistry,
    allocator: FileAllocator,
    log: ResumeLog,
    queue: TaskQueue,
}

impl Mirror {
    /// Prepares a fresh mirror in `out_dir`
    ///
    /// The directory is created if missing and must otherwise be empty. The
    /// config snapshot is written before the resume log so `continue` always
    /// finds both.
    ///
    /// # Errors
    ///
    /// * `MirrorError::Usage` - the directory exists and is not empty
    /// * `MirrorError::Config` - the configuration is invalid
    /// * `MirrorError::Persistence` - the resume log cannot be created
    pub fn create(out_dir: &Path, config: MirrorConfig) -> Result<Self> {
        validate(&config)?;

        if out_dir.exists() {
            if !out_dir.is_dir() {
                return Err(MirrorError::Usage(format!(
                    "{} is not a directory",
                    out_dir.display()
                )));
            }
            if std::fs::read_dir(out_dir)?.next().is_some() {
                return Err(MirrorError::Usage(format!(
                    "output directory {} is not empty",
                    out_dir.display()
                )));
            }
        }
        std::fs::create_dir_all(out_dir)?;

        save_config(&out_dir.join(CONFIG_FILE), &config)?;
        let log = ResumeLog::create(&out_dir.join(MAP_FILE))?;

        tracing::info!(
            "Created mirror in {} ({} roots, save mode {})",
            out_dir.display(),
            config.urls.len(),
            config.save_mode
        );

        Self::build(out_dir, config, log)
    }

    /// Reopens an existing mirror and replays its resume log
    ///
    /// Every log entry is registered with an empty budget; seeding the roots
    /// again raises the budgets of whatever is still reachable.
    ///
    /// # Arguments
    ///
    /// * `out_dir` - Directory created by an earlier `create`
    /// * `parallel` - Optional override of the snapshot's worker count
    pub fn resume(out_dir: &Path, parallel: Option<usize>) -> Result<Self> {
        if !out_dir.is_dir() {
            return Err(MirrorError::Usage(format!(
                "output directory {} does not exist",
                out_dir.display()
            )));
        }

        let config_path = out_dir.join(CONFIG_FILE);
        let map_path = out_dir.join(MAP_FILE);
        for required in [&config_path, &map_path] {
            if !required.is_file() {
                return Err(MirrorError::Usage(format!(
                    "{} is missing, not a mirror directory",
                    required.display()
                )));
            }
        }

        let (mut config, hash) = load_config_with_hash(&config_path)?;
        tracing::info!("Configuration loaded (hash: {})", hash);
        if let Some(parallel) = parallel {
            config.parallel = parallel;
            validate(&config)?;
        }

        let (log, entries) = ResumeLog::open(&map_path)?;
        let mirror = Self::build(out_dir, config, log)?;
        for entry in &entries {
            mirror.registry.restore(entry, mirror.config.retry)?;
        }

        tracing::info!(
            "Resuming mirror in {}: {} entries replayed",
            out_dir.display(),
            entries.len()
        );

        Ok(mirror)
    }

    fn build(out_dir: &Path, config: MirrorConfig, log: ResumeLog) -> Result<Self> {
        let client = build_http_client(&config)?;
        let allocator = FileAllocator::new(config.save_mode, config.separator);

        let registry = TaskRegistry::new();
        registry.reserve_path(MAP_FILE);
        registry.reserve_path(CONFIG_FILE);

        Ok(Self {
            config,
            out_dir: out_dir.to_path_buf(),
            client,
            registry,
            allocator,
            log,
            queue: TaskQueue::new(),
        })
    }

    /// Seeds one root URL
    ///
    /// Returns true if the root was enqueued: it was new, or it already
    /// existed and its budget rose.
    pub fn add_root(&self, root: &RootUrl) -> Result<bool> {
        let url = normalize_url(&root.url)?;
        let budget = Budget::new(root.level, root.down_level, root.ext_level);
        let task = Task::new(url, budget, self.config.retry)?;

        let (task, existed) = self.registry.add_or_get(task);
        let enqueue = !existed || self.registry.merge_budget(&task, budget);
        if enqueue {
            tracing::debug!("Root {} with budget {}", task.url(), task.budget());
            self.queue.push(task);
        }
        Ok(enqueue)
    }

    /// Seeds every root URL of the configuration
    pub fn add_roots(&self) -> Result<usize> {
        let mut added = 0;
        for root in &self.config.urls {
            if self.add_root(root)? {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Spawns `parallel` workers on the current tokio runtime
    pub fn start(self: &Arc<Self>) -> Crawl {
        let started_at = Utc::now();
        let workers = (0..self.config.parallel)
            .map(|id| tokio::spawn(run_worker(Arc::clone(self), id)))
            .collect();

        tracing::info!(
            "Started {} workers, {} tasks queued",
            self.config.parallel,
            self.queue.len()
        );

        Crawl {
            mirror: Arc::clone(self),
            workers,
            started_at,
        }
    }

    /// Stops the run: workers exit after their current task and the run
    /// counts as failed
    pub fn abort(&self) {
        tracing::warn!("Aborting run");
        self.queue.abort();
    }

    pub fn config(&self) -> &MirrorConfig {
        &self.config
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }

    pub(crate) fn allocator(&self) -> &FileAllocator {
        &self.allocator
    }

    pub(crate) fn log(&self) -> &ResumeLog {
        &self.log
    }

    /// Aggregates the registry into end-of-run statistics
    pub fn statistics(&self, started_at: DateTime<Utc>) -> CrawlStatistics {
        CrawlStatistics::collect(&self.registry.tasks(), started_at, Utc::now())
    }
}

/// A started run
#[derive(Debug)]
pub struct Crawl {
    mirror: Arc<Mirror>,
    workers: Vec<JoinHandle<()>>,
    started_at: DateTime<Utc>,
}

impl Crawl {
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn mirror(&self) -> &Arc<Mirror> {
        &self.mirror
    }

    /// Waits for every worker, then finishes the run
    ///
    /// Unless the run was aborted, links in downloaded pages are converted to
    /// local paths. The resume log is closed in every case.
    ///
    /// # Returns
    ///
    /// true if any task failed or the run was aborted
    pub async fn wait(self) -> bool {
        let mirror = self.mirror;

        for worker in self.workers {
            if let Err(e) = worker.await {
                tracing::error!("Worker terminated abnormally: {}", e);
                mirror.queue.set_failed();
            }
        }

        if mirror.queue.is_running() {
            let outcome = convert_links(&mirror.registry, &mirror.out_dir).await;
            tracing::info!("Converted links in {} pages", outcome.converted);
            if outcome.failed > 0 {
                tracing::error!("Link conversion failed for {} pages", outcome.failed);
                mirror.queue.set_failed();
            }
        }

        if let Err(e) = mirror.log.close() {
            tracing::error!("{}", e);
            mirror.queue.set_failed();
        }

        mirror.queue.is_failed()
    }
}
