mod cli;
mod config_loader;
mod render;

use anyhow::{bail, Context};
use clap::Parser;
use claimer_common::utils::logging::{init_logging, LoggingConfig};
use claimer_engine::metrics::serve_metrics;
use claimer_engine::{ClaimEngine, ClaimerConfig, EngineError, Scheduler};
use serde_json::json;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Parse CLI
    let args = Cli::parse();

    // 2. Setup Logging
    let mut logging = LoggingConfig::default().with_env_overrides();
    if args.debug {
        logging.level = "debug".to_string();
    }
    init_logging(&logging).map_err(|e| anyhow::anyhow!("Failed to initialise logging: {}", e))?;

    // 3. Load Config
    let config = config_loader::load_claimer_config(&args).context("Configuration error")?;

    // 4. Initialize Engine
    let engine = Arc::new(ClaimEngine::from_config(&config)?);

    // 5. Dispatch
    match args.command.unwrap_or(Commands::Run) {
        Commands::Run => run_daemon(engine, &config).await?,
        Commands::Create { count } => {
            let created = engine.create_wallets(count).await?;
            let total = engine.list_wallets().await.len();
            println!("{}", render::created(&created, total));
        }
        Commands::List => {
            println!("{}", render::wallet_list(&engine.list_wallets().await));
        }
        Commands::Claim => {
            if engine.list_wallets().await.is_empty() {
                bail!("No wallets to claim for");
            }
            let report = engine.try_claim_all().await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", render::batch(&report));
            }
        }
        Commands::Info => {
            let status = engine.faucet_info().await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                println!("{}", render::faucet_info(&status));
            }
        }
        Commands::Stats => {
            let stats = engine.stats().await;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("{}", render::stats(&stats));
            }
        }
        Commands::Export => {
            let export = engine.export_secrets().await?;
            let contents = std::fs::read_to_string(export.path())?;
            print!("{}", contents);
            export.remove()?;
        }
        Commands::Delete { index } => {
            let zero_based = index
                .checked_sub(1)
                .ok_or_else(|| EngineError::InvalidRequest("wallet indices start at 1".to_string()))?;
            let removed = engine.delete_wallet(zero_based).await?;
            if args.json {
                println!("{}", json!({ "deleted": removed.address() }));
            } else {
                println!("{}", render::deleted(&removed));
            }
        }
    }

    Ok(())
}

/// Scheduler (+ optional metrics endpoint) until Ctrl+C / SIGTERM.
async fn run_daemon(engine: Arc<ClaimEngine>, config: &ClaimerConfig) -> anyhow::Result<()> {
    info!("Starting faucet claimer v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration: {:?}", config);

    if let Some(addr) = config.metrics_addr.clone() {
        let metrics = engine.metrics();
        tokio::spawn(async move {
            if let Err(e) = serve_metrics(&addr, metrics).await {
                error!("Metrics server failed: {}", e);
            }
        });
    }

    let scheduler = Arc::new(Scheduler::new(
        engine.clone(),
        config.initial_delay(),
        config.claim_interval(),
    ));
    let (stop_tx, stop_rx) = watch::channel(false);
    let handle = scheduler.clone().spawn(stop_rx);

    shutdown_signal().await;

    if engine.batch_in_progress() {
        info!("Waiting for the in-flight batch to finish");
    }
    let _ = stop_tx.send(true);
    handle.await?;

    info!("Shutting down gracefully");
    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }
}
