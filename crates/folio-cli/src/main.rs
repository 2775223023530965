//! Folio - dissertation notebook assembler CLI
//!
//! The `folio` command runs every notebook module and merges their PDFs.
//!
//! ## Commands
//!
//! - (none) or `run`: full notebook run
//! - `fetch`: resolve one asset URL to a local file, for module scripts
//! - `assets`: inspect and maintain the asset ledger

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use folio_assets::{AssetCache, AssetConfig, AssetFetcher};
use folio_build::NotebookPipeline;
use folio_core::{init_tracing, FolioConfig, LogFormat};
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "folio")]
#[command(author = "Folio Maintainers")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run notebook modules and assemble their PDFs into one document", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Notebook root directory
    #[arg(long, global = true, env = "FOLIO_ROOT")]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all active modules and assemble the notebook (the default)
    Run,

    /// Download an asset (or reuse the cached copy) and print its local path
    Fetch {
        /// Google Docs / Drive URL
        url: String,

        /// Owning module; the file lands in downloads/<module>/
        #[arg(short, long)]
        module: Option<String>,

        /// Target file name (default depends on the asset kind)
        #[arg(short, long)]
        filename: Option<String>,
    },

    /// Inspect the asset ledger
    Assets {
        #[command(subcommand)]
        action: AssetsAction,
    },
}

#[derive(Subcommand)]
enum AssetsAction {
    /// List cached assets
    List {
        /// Only assets owned by this module
        #[arg(short, long)]
        module: Option<String>,
    },

    /// Show ledger statistics as JSON
    Stats,

    /// Delete assets fetched more than N days ago
    Prune {
        #[arg(long, default_value = "30")]
        days: i64,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    init_tracing(LogFormat::from_json_flag(cli.json), level);

    let mut config = FolioConfig::from_env().context("Invalid FOLIO_* settings")?;
    if let Some(root) = cli.root {
        config = config.with_root(root);
    }
    config.validate().context("Invalid notebook root")?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => cmd_run(config).await,
        Commands::Fetch {
            url,
            module,
            filename,
        } => cmd_fetch(&config, &url, module.as_deref(), filename.as_deref()).await,
        Commands::Assets { action } => match action {
            AssetsAction::List { module } => cmd_assets_list(&config, module.as_deref()),
            AssetsAction::Stats => cmd_assets_stats(&config),
            AssetsAction::Prune { days } => cmd_assets_prune(&config, days),
        },
    }
}

async fn cmd_run(config: FolioConfig) -> Result<ExitCode> {
    let pipeline = NotebookPipeline::from_config(config)?;
    let result = pipeline.run().await.context("Notebook run failed")?;

    println!("Run:       {}", result.run_id());
    println!(
        "Modules:   {} succeeded, {} failed, {} skipped",
        result.passed_count(),
        result.failed_count(),
        result.report.skipped.len()
    );
    println!("Artifact:  {} ({})", result.assembly.artifact.display(), result.assembly.strategy);
    println!("Summary:   {}", result.assembly.summary_path.display());
    println!("Report:    {}", result.report_path.display());
    if let Some(warning) = &result.report.registry_warning {
        println!("Warning:   {}", warning);
    }
    Ok(ExitCode::SUCCESS)
}

async fn cmd_fetch(
    config: &FolioConfig,
    url: &str,
    module: Option<&str>,
    filename: Option<&str>,
) -> Result<ExitCode> {
    let mut cache = open_cache(config)?;
    let assets = AssetConfig::from_env().context("Invalid FOLIO_* settings")?;
    let fetcher = AssetFetcher::with_reqwest(assets, config.downloads_path())
        .context("Failed to build HTTP client")?;

    match fetcher.fetch(&mut cache, url, module, filename).await {
        Some(path) => {
            println!("{}", path.display());
            Ok(ExitCode::SUCCESS)
        }
        None => Ok(ExitCode::FAILURE),
    }
}

fn cmd_assets_list(config: &FolioConfig, module: Option<&str>) -> Result<ExitCode> {
    let cache = open_cache(config)?;
    let records = cache.records(module);
    if records.is_empty() {
        println!("No cached assets.");
        return Ok(ExitCode::SUCCESS);
    }

    println!(
        "{:<12} {:<46} {:>10}  {:<8} {:<12} {}",
        "KIND", "RESOURCE", "BYTES", "STATUS", "MODULE", "PATH"
    );
    for record in records {
        let status = if record.validate() { "ok" } else { "invalid" };
        println!(
            "{:<12} {:<46} {:>10}  {:<8} {:<12} {}",
            record.resource_kind.as_str(),
            record.resource_id,
            record.byte_size,
            status,
            record.owning_module_id.as_deref().unwrap_or("-"),
            record.local_path.display()
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_assets_stats(config: &FolioConfig) -> Result<ExitCode> {
    let cache = open_cache(config)?;
    println!("{}", serde_json::to_string_pretty(&cache.stats())?);
    Ok(ExitCode::SUCCESS)
}

fn cmd_assets_prune(config: &FolioConfig, days: i64) -> Result<ExitCode> {
    if days < 0 {
        anyhow::bail!("--days must not be negative");
    }
    let mut cache = open_cache(config)?;
    let removed = cache
        .prune_older_than(chrono::Duration::days(days), chrono::Utc::now())
        .context("Failed to prune asset ledger")?;
    info!(removed, days, "Pruned asset ledger");
    println!("Removed {} asset(s) older than {} day(s).", removed, days);
    Ok(ExitCode::SUCCESS)
}

fn open_cache(config: &FolioConfig) -> Result<AssetCache> {
    let path = config.ledger_path();
    AssetCache::open(&path).with_context(|| format!("Failed to open asset ledger {:?}", path))
}
