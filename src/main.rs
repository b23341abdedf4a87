//! Listing-Sweep main entry point
//!
//! This is the command-line interface for the Listing-Sweep crawler.

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use listing_sweep::config::{load_config_with_hash, Config};
use listing_sweep::crawler::{run_crawl, StopSignal};
use listing_sweep::filter::apply_query;
use listing_sweep::output::{load_statistics, print_report, print_statistics};
use listing_sweep::storage::{open_journal, Partition};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Listing-Sweep: a resumable listing crawler
///
/// Walks the paginated listing pages of the configured site, opens each new
/// listing's detail page, and keeps a deduplicated result set per day and
/// filter that survives interruptions and re-runs.
#[derive(Parser, Debug)]
#[command(name = "listing-sweep")]
#[command(version)]
#[command(about = "A resumable listing crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show recent runs from the run journal and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config)
    } else if cli.stats {
        handle_stats(&config)
    } else {
        handle_crawl(config, &config_hash).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("listing_sweep=info,warn"),
            1 => EnvFilter::new("listing_sweep=debug,info"),
            2 => EnvFilter::new("listing_sweep=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    println!("=== Listing-Sweep Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Max pages per base URL: {}", config.max_pages());
    println!("  Max items per page: {}", config.max_items_per_page());
    println!(
        "  Item cooldown: {}-{}ms",
        config.cooldown.item_min_ms, config.cooldown.item_max_ms
    );
    println!(
        "  Page cooldown: {}-{}ms",
        config.cooldown.page_min_ms, config.cooldown.page_max_ms
    );

    let partition = Partition::new(Utc::now().date_naive(), &config.site.name, &config.filter);
    println!("\nOutput:");
    println!(
        "  Checkpoint: {}",
        partition.path(Path::new(&config.output.output_dir)).display()
    );
    println!("  Screenshots: {}", config.output.screenshot_dir);
    println!("  Journal: {}", config.output.journal_path);

    if let Some(location) = config.filter.location() {
        println!("\nLocation filter: {}", location);
    }
    if let Some(from) = config.filter.posted_date_from {
        println!("Posted on or after: {}", from);
    }

    println!(
        "\nBase URLs for {} ({}):",
        config.site.name,
        config.site.base_urls.len()
    );
    for base_url in &config.site.base_urls {
        let target = apply_query(base_url, &config.filter, &config.site.params)
            .with_context(|| format!("Invalid base URL {}", base_url))?;
        println!("  - {}", base_url);
        if &target != base_url {
            println!("    -> {}", target);
        }
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles the --stats mode: shows recent runs from the journal
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Journal: {}\n", config.output.journal_path);

    let journal = open_journal(Path::new(&config.output.journal_path))
        .context("Failed to open run journal")?;
    let stats = load_statistics(&journal, 10).context("Failed to read run journal")?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: &str) -> anyhow::Result<()> {
    tracing::info!(
        "Site {}: {} base URLs",
        config.site.name,
        config.site.base_urls.len()
    );

    let stop = StopSignal::new();
    let handle = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing current step and saving");
            handle.request_stop();
        }
    });

    match run_crawl(config, config_hash, stop).await {
        Ok(report) => {
            print_report(&report);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err::<(), _>(e).context("Crawl aborted")
        }
    }
}
