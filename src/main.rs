//! Webmirror main entry point
//!
//! This is the command-line interface for the webmirror website mirroring
//! crawler.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use webmirror::config::{parse_root_url, MirrorConfig, RootUrl, SaveMode};
use webmirror::output::print_statistics;
use webmirror::Mirror;

/// Webmirror: a resumable website mirroring crawler
///
/// Webmirror downloads websites into a local directory by following links
/// within per-root budgets, rewriting pages so mirrored links resolve
/// locally. An interrupted mirror can be continued from its output
/// directory.
#[derive(Parser, Debug)]
#[command(name = "webmirror")]
#[command(version)]
#[command(about = "A resumable website mirroring crawler", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start a fresh mirror in an empty directory
    New(NewArgs),

    /// Continue an interrupted mirror
    Continue(ContinueArgs),
}

#[derive(Args, Debug)]
struct NewArgs {
    /// Output directory; created if missing, must be empty otherwise
    #[arg(long, value_name = "DIR")]
    dir: PathBuf,

    /// Number of concurrent workers
    #[arg(long, default_value_t = 1)]
    parallel: usize,

    /// Fetch attempts per resource
    #[arg(long, default_value_t = 3)]
    retry: u32,

    /// Maximum redirects followed per request
    #[arg(long, default_value_t = 0)]
    redirects: u32,

    /// Request timeout in milliseconds
    #[arg(long = "timeout-ms", default_value_t = 1000)]
    timeout_ms: u64,

    /// File layout: flat, flat-dir, dir or site-dir
    #[arg(long, default_value_t = SaveMode::Flat)]
    save: SaveMode,

    /// Replacement for characters not allowed in file names
    #[arg(long, default_value_t = '_')]
    separator: char,

    /// Root URLs, each given as 'URL LEVEL DOWN_LEVEL EXT_LEVEL'
    #[arg(required = true, value_name = "ROOT", value_parser = parse_root_url)]
    urls: Vec<RootUrl>,
}

impl NewArgs {
    fn to_config(&self) -> MirrorConfig {
        MirrorConfig {
            retry: self.retry,
            max_redirects: self.redirects,
            timeout_ms: self.timeout_ms,
            save_mode: self.save,
            parallel: self.parallel,
            separator: self.separator,
            urls: self.urls.clone(),
        }
    }
}

#[derive(Args, Debug)]
struct ContinueArgs {
    /// Output directory of an earlier `new` run
    #[arg(long, value_name = "DIR")]
    dir: PathBuf,

    /// Override the number of concurrent workers
    #[arg(long)]
    parallel: Option<usize>,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version are not errors
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    match run(cli) {
        Ok(false) => ExitCode::SUCCESS,
        Ok(true) => {
            tracing::warn!("Mirror finished with failures");
            ExitCode::from(1)
        }
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::from(1)
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("webmirror=info,warn"),
            1 => EnvFilter::new("webmirror=debug,info"),
            2 => EnvFilter::new("webmirror=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Prepares the mirror and drives the crawl on a runtime sized to it
///
/// Returns true if any task failed.
fn run(cli: Cli) -> anyhow::Result<bool> {
    let mirror = match &cli.command {
        Command::New(args) => Mirror::create(&args.dir, args.to_config())
            .with_context(|| format!("cannot create mirror in {}", args.dir.display()))?,
        Command::Continue(args) => Mirror::resume(&args.dir, args.parallel)
            .with_context(|| format!("cannot continue mirror in {}", args.dir.display()))?,
    };

    // One worker per runtime thread
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(mirror.config().parallel)
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;

    runtime.block_on(crawl(mirror, cli.quiet))
}

async fn crawl(mirror: Mirror, quiet: bool) -> anyhow::Result<bool> {
    let roots = mirror.add_roots().context("invalid root URL")?;
    tracing::info!("Seeded {} root URLs", roots);

    let mirror = Arc::new(mirror);
    let crawl = mirror.start();

    let interrupt = {
        let mirror = Arc::clone(&mirror);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted");
                mirror.abort();
            }
        })
    };

    let started_at = crawl.started_at();
    let failed = crawl.wait().await;
    interrupt.abort();

    if !quiet {
        print_statistics(&mirror.statistics(started_at));
    }

    Ok(failed)
}
