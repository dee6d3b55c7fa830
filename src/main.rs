//! Fault Dispute Game Monitor CLI
//!
//! Watches the dispute game factory and keeps every game's agent progressing.

use anyhow::Result;
use clap::{Parser, Subcommand};
use dispute_monitor::config::parse_address;
use dispute_monitor::services::{FactoryGameLoader, RpcClient, StatusAgentFactory};
use dispute_monitor::{cancel_pair, CancelContext, CancelReason, Config, GameMonitor};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dispute-monitor")]
#[command(about = "Monitor and progress fault dispute games")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// L1 JSON-RPC endpoint (overrides L1_RPC_URL)
    #[arg(long, global = true)]
    rpc_url: Option<String>,

    /// Dispute game factory address (overrides GAME_FACTORY_ADDRESS)
    #[arg(long, global = true)]
    factory: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the monitor until Ctrl-C
    Run {
        /// Poll interval in milliseconds (overrides POLL_INTERVAL_MS)
        #[arg(short, long)]
        interval_ms: Option<u64>,

        /// Stop after this many seconds
        #[arg(long)]
        run_for: Option<u64>,
    },

    /// List the games reported by the factory
    Games {
        /// Block to list games at (defaults to the current head)
        #[arg(short, long)]
        block: Option<u64>,
    },

    /// Show the current L1 block number
    Block,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging. Override with RUST_LOG, e.g. RUST_LOG=dispute_monitor=debug
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    // Load configuration
    let mut config = Config::from_env()?;
    if let Some(url) = cli.rpc_url {
        config.rpc_url = url;
    }
    if let Some(factory) = cli.factory {
        config.game_factory = Some(parse_address(&factory)?);
    }

    let rpc = Arc::new(RpcClient::new(
        &config.rpc_url,
        config.rpc_timeout,
        config.retry_config(),
    ));

    match cli.command {
        Commands::Run {
            interval_ms,
            run_for,
        } => run_monitor(&config, rpc, interval_ms, run_for).await?,
        Commands::Games { block } => list_games(&config, rpc, block).await?,
        Commands::Block => show_block(rpc).await?,
    }

    Ok(())
}

async fn run_monitor(
    config: &Config,
    rpc: Arc<RpcClient>,
    interval_ms: Option<u64>,
    run_for: Option<u64>,
) -> Result<()> {
    let factory = config.require_factory()?;
    let poll_interval = interval_ms
        .map(Duration::from_millis)
        .unwrap_or(config.poll_interval);

    info!(
        rpc = rpc.url(),
        %factory,
        interval_ms = poll_interval.as_millis() as u64,
        "Starting dispute game monitor"
    );

    let (canceller, ctx) = cancel_pair();
    let ctx = match run_for {
        Some(secs) => ctx.with_deadline(Duration::from_secs(secs)),
        None => ctx,
    };

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl-C, shutting down");
                canceller.cancel(CancelReason::Interrupted);
            }
            Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    let monitor = GameMonitor::new(
        Box::new(rpc.clone()),
        Box::new(FactoryGameLoader::new(rpc.clone(), factory)),
        Box::new(StatusAgentFactory::new(rpc)),
    )
    .with_poll_interval(poll_interval);

    let cancelled = monitor.monitor_games(ctx).await;
    info!("{}", cancelled);

    Ok(())
}

async fn list_games(config: &Config, rpc: Arc<RpcClient>, block: Option<u64>) -> Result<()> {
    let ctx = CancelContext::never();
    let loader = FactoryGameLoader::new(rpc.clone(), config.require_factory()?);

    let block = match block {
        Some(block) => block,
        None => rpc.block_number(&ctx).await?,
    };
    let games = loader.fetch_games(&ctx, block).await?;

    println!("{} games at block {} (factory {})", games.len(), block, loader.factory());
    for (index, game) in games.iter().enumerate() {
        println!("  [{:>4}] {}", index, game);
    }

    Ok(())
}

async fn show_block(rpc: Arc<RpcClient>) -> Result<()> {
    let block = rpc.block_number(&CancelContext::never()).await?;
    println!("{}", block);
    Ok(())
}
