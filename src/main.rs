//! Pantopod main entry point
//!
//! Command-line interface for running a crawl participant.

use anyhow::Context;
use clap::Parser;
use pantopod::app::Application;
use pantopod::config::{load_config_with_hash, Config, HandlerType};
use pantopod::storage::SqliteCrawlStore;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Pantopod: a cluster-coordinated web crawler
///
/// Joins a crawl cluster as one participant and crawls every resource the
/// cluster assigns to it, recording pages and cross-domain links.
#[derive(Parser, Debug)]
#[command(name = "pantopod")]
#[command(version)]
#[command(about = "A cluster-coordinated web crawler", long_about = None)]
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

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        Application::build(config)?.run_until_shutdown().await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("pantopod=info,warn"),
            1 => EnvFilter::new("pantopod=debug,info"),
            2 => EnvFilter::new("pantopod=trace,debug"),
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

/// Handles the --dry-run mode: shows what this participant would do
fn handle_dry_run(config: &Config) {
    println!("=== Pantopod Dry Run ===\n");

    println!("Cluster:");
    println!("  Coordination service: {}", config.cluster.zk_connect_string);
    println!("  Cluster name: {}", config.cluster.cluster_name);
    println!("  Participant: {}", config.cluster.participant_name);

    println!("\nBroker:");
    println!("  Broker list: {}", config.broker.broker_list);
    println!("  Group id: {}", config.broker.group_id);

    println!("\nCrawler:");
    println!("  Handler type: {:?}", config.crawler.handler_type);
    println!("  Check errors: {}", config.crawler.check_errors);
    println!("  Traverse duplicates: {}", config.crawler.traverse_duplicates);
    match config.crawler.handler_type {
        HandlerType::Database => println!("  Database: {}", config.output.database_path),
        HandlerType::File => println!("  Output dir: {}", config.output.output_dir),
    }

    if config.tor.enabled {
        println!("\nTor:");
        println!("  SOCKS port: {}", config.tor.socks_port);
        println!("  Control port: {}", config.tor.control_port);
        println!("  Watchdog: {}ms", config.tor.watchdog_delay_ms);
    }

    println!("\nResources ({}):", config.resources.len());
    for resource in &config.resources {
        println!(
            "  - {} => http://{}{}{}",
            resource.name,
            resource.name,
            resource.chroot.as_deref().unwrap_or(""),
            resource.start_page.as_deref().unwrap_or("")
        );
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    if config.crawler.handler_type != HandlerType::Database {
        anyhow::bail!("--stats requires handler-type = \"database\"");
    }

    println!("Database: {}\n", config.output.database_path);
    let store = SqliteCrawlStore::new(Path::new(&config.output.database_path))?;
    let stats = store.stats()?;

    println!("Crawl records:  {}", stats.records);
    println!("Errored URLs:   {}", stats.errors);
    println!("External edges: {}", stats.external_edges);

    Ok(())
}
