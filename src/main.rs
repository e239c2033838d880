//! # deskindex CLI
//!
//! The `deskindex` binary crawls configured directory trees into a
//! Meilisearch index and serves search and crawl control over HTTP.
//!
//! ## Usage
//!
//! ```bash
//! deskindex --config ./config/deskindex.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `deskindex init` | Write a starter config, create the database, set up the index |
//! | `deskindex crawl` | Run one crawl over every root and exit |
//! | `deskindex serve` | Start the HTTP API with the interval scheduler |
//! | `deskindex search "<query>"` | Search the index |
//! | `deskindex stats` | Index statistics and recent crawl runs |
//! | `deskindex clear` | Delete every document and forget the snapshot |
//! | `deskindex completions <shell>` | Print shell completions |

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use deskindex::config::{self, Config, CONFIG_TEMPLATE};
use deskindex::logging;
use deskindex::meili::MeilisearchStore;
use deskindex::pipeline::CrawlPipeline;
use deskindex::progress::{format_number, NoProgress, ProgressMode};
use deskindex::scheduler::{CrawlScheduler, RunNowOutcome, RunSummary, SchedulerSettings};
use deskindex::server::{self, AppContext};
use deskindex::snapshot_store::SnapshotStore;
use deskindex_core::store::{DocumentStore, SearchRequest};
use tracing::{info, warn};

/// deskindex keeps a full-text search index in sync with filesystem trees.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. `deskindex init` writes a commented starter file.
#[derive(Parser)]
#[command(
    name = "deskindex",
    about = "Keeps a full-text search index in sync with local and network filesystem trees",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/deskindex.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter config (if missing), create the database and set up the index.
    ///
    /// Idempotent: an existing config file is left untouched.
    Init,

    /// Crawl every configured root once and exit.
    ///
    /// Only new and changed files are submitted unless `--full` is given.
    /// Ctrl-C stops the crawl between files without committing the snapshot.
    Crawl {
        /// Resubmit every file regardless of the previous snapshot.
        #[arg(long)]
        full: bool,

        /// Progress output on stderr. Defaults to `human` on a terminal.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Start the HTTP API and the interval crawl scheduler.
    Serve,

    /// Search the index.
    Search {
        query: String,

        /// Backend filter expression, e.g. `extension = ".pdf"`.
        #[arg(long)]
        filter: Option<String>,

        /// Sort clause such as `modified_at:desc`; may be repeated.
        #[arg(long)]
        sort: Vec<String>,

        #[arg(long, default_value_t = 20)]
        limit: usize,

        #[arg(long, default_value_t = 0)]
        offset: usize,
    },

    /// Show index statistics and recent crawl runs.
    Stats,

    /// Delete every document from the index and forget the snapshot.
    ///
    /// The next crawl resubmits every file.
    Clear,

    /// Print a shell completion script to stdout.
    Completions { shell: Shell },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(*shell, &mut cmd, "deskindex", &mut std::io::stdout());
            return Ok(());
        }
        Commands::Init => write_config_template(&cli.config)?,
        _ => {}
    }

    let cfg = config::load_config(&cli.config)?;
    logging::init(&cfg.logging)?;

    match cli.command {
        Commands::Init => run_init(&cfg).await?,
        Commands::Crawl { full, progress } => run_crawl(&cfg, full, progress).await?,
        Commands::Serve => run_serve(cfg).await?,
        Commands::Search {
            query,
            filter,
            sort,
            limit,
            offset,
        } => {
            let mut request = SearchRequest::new(query);
            request.filter = filter;
            request.sort = sort;
            request.limit = limit;
            request.offset = offset;
            run_search(&cfg, &request).await?;
        }
        Commands::Stats => run_stats(&cfg).await?,
        Commands::Clear => run_clear(&cfg).await?,
        Commands::Completions { .. } => {}
    }

    Ok(())
}

fn write_config_template(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, CONFIG_TEMPLATE)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote starter config to {}", path.display());
    Ok(())
}

fn open_store(cfg: &Config) -> Result<Arc<dyn DocumentStore>> {
    Ok(Arc::new(MeilisearchStore::new(&cfg.store)?))
}

async fn run_init(cfg: &Config) -> Result<()> {
    SnapshotStore::open(&cfg.db).await?;
    println!("Database initialized at {}", cfg.db.path.display());

    let store = open_store(cfg)?;
    match store.initialize().await {
        Ok(()) => println!("Index '{}' ready at {}", cfg.store.index_name, cfg.store.host),
        Err(e) => warn!(error = %e, "search backend not reachable; index will be set up on first crawl"),
    }
    Ok(())
}

async fn run_crawl(cfg: &Config, full: bool, progress: Option<ProgressMode>) -> Result<()> {
    let store = open_store(cfg)?;
    store
        .initialize()
        .await
        .context("Failed to set up the search index")?;
    let snapshots = SnapshotStore::open(&cfg.db).await?;
    let pipeline = CrawlPipeline::from_config(cfg, store, snapshots)?.with_incremental(!full);

    let mut settings = SchedulerSettings::from_config(&cfg.crawler);
    settings.crawl_on_start = false;
    let reporter = progress.unwrap_or_else(ProgressMode::default_for_tty).reporter();
    let scheduler = CrawlScheduler::spawn(Arc::new(pipeline), settings, reporter);

    if scheduler.run_now() != RunNowOutcome::Started {
        bail!("Crawl could not be started");
    }
    tokio::select! {
        _ = scheduler.wait_for_completed_runs(1) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received; stopping crawl");
            scheduler.stop_current();
            scheduler.wait_for_completed_runs(1).await;
        }
    }
    let summary = scheduler.status().last_summary;
    scheduler.shutdown().await;

    let Some(summary) = summary else {
        bail!("Crawl finished without a summary");
    };
    print_summary(&summary);
    if let Some(error) = summary.error {
        bail!("Crawl failed: {error}");
    }
    if summary.roots_failed > 0 && summary.roots_completed == 0 {
        bail!("No root could be crawled");
    }
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    let status = if summary.cancelled {
        "cancelled"
    } else {
        "completed"
    };
    println!(
        "Crawl {status} in {:.1}s: {} files, {} documents submitted, {} roots ok, {} failed",
        summary.duration().num_milliseconds() as f64 / 1000.0,
        format_number(summary.files_processed),
        format_number(summary.documents_submitted),
        summary.roots_completed,
        summary.roots_failed,
    );
}

async fn run_serve(cfg: Config) -> Result<()> {
    let store = open_store(&cfg)?;
    if let Err(e) = store.initialize().await {
        warn!(error = %e, "search backend not ready; crawls will fail until it is reachable");
    }
    let snapshots = SnapshotStore::open(&cfg.db).await?;
    let pipeline = CrawlPipeline::from_config(&cfg, store.clone(), snapshots.clone())?;
    let scheduler = CrawlScheduler::spawn(
        Arc::new(pipeline),
        SchedulerSettings::from_config(&cfg.crawler),
        Arc::new(NoProgress),
    );

    server::run_server(AppContext {
        config: Arc::new(cfg),
        store,
        scheduler: Arc::new(scheduler),
        snapshots: Some(snapshots),
    })
    .await
}

async fn run_search(cfg: &Config, request: &SearchRequest) -> Result<()> {
    let store = open_store(cfg)?;
    let response = store.search(request).await?;

    if response.hits.is_empty() {
        println!("No results.");
        return Ok(());
    }
    let mut out = std::io::stdout().lock();
    for (i, hit) in response.hits.iter().enumerate() {
        let path = hit["path"].as_str().unwrap_or_default();
        let size = hit["size"].as_u64().unwrap_or_default();
        let modified = hit["modified_at"].as_str().unwrap_or_default();
        writeln!(
            out,
            "{}. {path}  ({} bytes, {modified})",
            request.offset + i + 1,
            format_number(size)
        )?;
        if let Some(snippet) = hit["_formatted"]["content"].as_str() {
            let snippet = snippet.split_whitespace().collect::<Vec<_>>().join(" ");
            if !snippet.is_empty() {
                writeln!(out, "    {snippet}")?;
            }
        }
    }
    writeln!(
        out,
        "\n~{} results in {} ms",
        format_number(response.total_estimate),
        response.elapsed_ms
    )?;
    Ok(())
}

async fn run_stats(cfg: &Config) -> Result<()> {
    let store = open_store(cfg)?;
    let stats = store.stats().await?;
    println!("Index '{}'", cfg.store.index_name);
    println!("  documents: {}", format_number(stats.document_count));
    println!("  indexing:  {}", stats.is_indexing);
    for (field, count) in &stats.field_distribution {
        println!("  field {field}: {}", format_number(*count));
    }

    let snapshots = SnapshotStore::open(&cfg.db).await?;
    println!(
        "Snapshot: {} tracked files",
        format_number(snapshots.len().await?)
    );
    let runs = snapshots.recent_runs(5).await?;
    if !runs.is_empty() {
        println!("Recent crawls:");
        for run in runs {
            println!(
                "  {}  files={} submitted={} roots_ok={} roots_failed={}{}",
                run.finished_at,
                run.files_processed,
                run.documents_submitted,
                run.roots_completed,
                run.roots_failed,
                if run.cancelled { " (cancelled)" } else { "" }
            );
        }
    }
    Ok(())
}

async fn run_clear(cfg: &Config) -> Result<()> {
    let store = open_store(cfg)?;
    if !store.clear_all().await? {
        bail!("Search backend did not confirm the clear");
    }
    SnapshotStore::open(&cfg.db).await?.clear().await?;
    println!("Index '{}' cleared; next crawl resubmits every file.", cfg.store.index_name);
    Ok(())
}
