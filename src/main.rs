//! Backpack Grid - Main Entry Point
//!
//! Seeds a grid of limit orders on one Backpack market and keeps it
//! alive by mirroring every fill onto the neighbouring level.

use anyhow::Result;
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use backpack_grid::backpack::messages::ORDER_UPDATE_STREAM;
use backpack_grid::config::{load_config, load_from_env};
use backpack_grid::{AppConfig, BackpackClient, EngineSettings, GridEngine, Notifier, StatusReporter, TelegramNotifier};

/// CLI arguments for the application
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file; environment variables are used when it is absent
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error); overrides the configured level
    #[arg(long)]
    log_level: Option<String>,
}

fn load(path: &str) -> backpack_grid::Result<AppConfig> {
    let config = if Path::new(path).exists() {
        load_config(Some(path))?
    } else {
        load_from_env()?
    };
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    let loaded = load(&args.config);
    let log_level = args
        .log_level
        .clone()
        .or_else(|| loaded.as_ref().ok().map(|c| c.settings.log_level.clone()))
        .unwrap_or_else(|| "info".to_string());

    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting Backpack grid bot");

    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let client = BackpackClient::new(&config.backpack, &config.settings)?;
    let exchange = Arc::new(client.rest().clone());

    let notifier: Option<Arc<dyn Notifier>> = match config.notifications() {
        Some(telegram) => {
            let telegram: Arc<dyn Notifier> =
                Arc::new(TelegramNotifier::new(telegram, config.settings.request_timeout())?);
            info!("Telegram notifications enabled");
            Some(telegram)
        }
        None => None,
    };

    let mut engine = GridEngine::new(EngineSettings::from_config(&config)?, exchange.clone())?;
    if let Some(notifier) = &notifier {
        engine = engine.with_notifier(notifier.clone());
    }
    let engine = Arc::new(engine);

    info!(
        "[{}] {} levels between {} and {}",
        config.grid.symbol,
        engine.levels().len(),
        config.grid.lower_price,
        config.grid.upper_price
    );

    if let Err(e) = engine.start().await {
        error!("[{}] Startup failed: {}", config.grid.symbol, e);
        std::process::exit(1);
    }

    let feed = client.feed();
    let fills = feed.on_message(ORDER_UPDATE_STREAM).await;
    if let Err(e) = feed.subscribe(vec![ORDER_UPDATE_STREAM.to_string()]).await {
        error!("[{}] Initial subscription failed: {}", config.grid.symbol, e);
    }
    feed.spawn();

    if let Some(notifier) = notifier {
        StatusReporter::new(
            &config.grid.symbol,
            exchange,
            notifier,
            config.settings.notify_interval(),
        )
        .spawn();
    }

    tokio::select! {
        _ = engine.process_fills(fills) => {
            error!("Order update stream ended");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal, exiting");
        }
    }

    Ok(())
}
