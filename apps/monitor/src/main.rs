#![warn(clippy::all, clippy::pedantic)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use logger::{init_with_level, parse_level};
use tracing::info;

use uppe_monitor::config::Config;
use uppe_monitor::database::LibsqlStore;
use uppe_monitor::diagnostics::HttpSummarizer;
use uppe_monitor::monitoring::ProbeExecutor;
use uppe_monitor::notification::{HttpTransport, NotificationDispatcher};
use uppe_monitor::{EngineOptions, Orchestrator, pool};

/// Maximum number of pooled database connections
const POOL_SIZE: usize = 4;

#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to the config file, created with defaults when missing
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::from_config(args.config.as_ref()).context("failed to load config")?;

    if args.print_config {
        print!("{config}");
        return Ok(());
    }

    init_with_level(parse_level(&config.logging.level));

    let pool = pool::open_local(&config.database.path, POOL_SIZE)
        .await
        .with_context(|| format!("failed to open database {}", config.database.path))?;
    let store = Arc::new(LibsqlStore::new(pool).await?);

    let executor = Arc::new(ProbeExecutor::new(
        &config.engine.user_agent,
        config.engine.probe_timeout(),
    )?);
    let transport = Arc::new(HttpTransport::new(
        config.notifications.email_relay_url.clone(),
        config.notifications.telegram_bot_token.clone(),
    ));
    let summarizer = Arc::new(HttpSummarizer::new(
        config.diagnostics.endpoint.clone(),
        config.diagnostics.api_key.clone(),
    ));

    let orchestrator = Orchestrator::load(
        store,
        executor,
        NotificationDispatcher::new(transport),
        summarizer,
        EngineOptions::from(&config.engine),
    )
    .await?;

    info!(database = %config.database.path, "Uppe monitor started");

    orchestrator
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;

    Ok(())
}
