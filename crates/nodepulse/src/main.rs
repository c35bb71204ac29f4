use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nodepulse_discovery::{
    FnObserver, LogLevel, NodePool, PoolConfig, defaults, default_endpoints, logging,
};

#[derive(Parser, Debug)]
#[command(name = "nodepulse")]
#[command(about = "Discover endpoints from a directory API and hand them out round-robin", long_about = None)]
struct Args {
    /// Path to configuration file (optional; NODEPULSE__* env vars override it)
    #[arg(short, long, default_value = "nodepulse.yaml")]
    config: String,

    /// Use JSON structured logging
    #[arg(long)]
    json_logs: bool,

    /// Override the configured log level
    #[arg(long, env = "NODEPULSE_LOG_LEVEL")]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Wait for discovery and print endpoints in rotation order
    Next {
        /// How many endpoints to print
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
    },
    /// Keep the pool running and report every discovery outcome until Ctrl-C
    Watch,
    /// Print the compiled-in fallback endpoints
    Defaults,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = PoolConfig::load(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config))?;
    if let Some(level) = args.log_level {
        config.log_level = level;
    }
    config.validate()?;

    logging::init(config.log_level, args.json_logs);

    match args.command {
        Command::Next { count } => next(config, count).await,
        Command::Watch => watch(config).await,
        Command::Defaults => {
            print_defaults();
            Ok(())
        },
    }
}

async fn next(config: PoolConfig, count: usize) -> Result<()> {
    let pool = NodePool::start(config)?;

    for _ in 0..count {
        let node = pool.get_node().await?;
        println!("{}", node);
    }

    pool.shutdown();
    Ok(())
}

async fn watch(config: PoolConfig) -> Result<()> {
    let observer = FnObserver::new()
        .with_on_update(|nodes| tracing::info!(count = nodes.len(), nodes = ?nodes, "Endpoint list updated"))
        .with_on_error(|error| tracing::warn!(error = %error, "Directory attempt failed"))
        .with_on_fallback(|kind, nodes| {
            tracing::warn!(kind = %kind, nodes = ?nodes, "Refresh cycle fell back")
        });

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        node_type = %config.node_type,
        network = %config.network,
        api_url = %config.api_url,
        update_interval_ms = config.update_interval_ms,
        "Starting nodepulse watch"
    );

    let pool = NodePool::builder(config).observer(Arc::new(observer)).start()?;
    pool.wait_for_nodes().await;
    tracing::info!(nodes = ?pool.nodes(), "Pool ready");

    tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?;

    tracing::info!("Shutting down");
    pool.shutdown();
    Ok(())
}

fn print_defaults() {
    for node_type in defaults::known_node_types() {
        for network in defaults::known_networks() {
            if let Some(endpoints) = default_endpoints(node_type, network) {
                println!("{}/{}:", node_type, network);
                for endpoint in endpoints {
                    println!("  {}", endpoint);
                }
            }
        }
    }
}
