mod config;
mod error;
mod notifier;
mod routes;
mod services;
mod shutdown;
mod state;

use crate::config::AppConfig;
use crate::notifier::{LogNotifier, WebhookNotifier};
use crate::services::backup_scheduler::BackupScheduler;
use crate::services::monitor_service;
use crate::shutdown::shutdown_signal;
use crate::state::AppState;
use clap::Parser;
use hostwatch_core::probe::NetworkProber;
use hostwatch_core::utils::logger;
use hostwatch_core::{MonitorEngine, Notifier};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Environment file to load instead of `./.env`
    #[arg(short, long, value_name = "FILE")]
    env_file: Option<PathBuf>,

    /// Port to listen on (overrides PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match &args.env_file {
        Some(path) => {
            dotenvy::from_path(path)?;
        }
        None => {
            let _ = dotenvy::dotenv();
        }
    }

    let mut config = AppConfig::from_env()?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(level) = args.log_level {
        config.log_level = level;
    }

    logger::init(&config.log_level);
    tracing::info!(
        "Starting hostwatch v{} for {}",
        env!("CARGO_PKG_VERSION"),
        config.monitor_host
    );
    if config.ssh.is_none() {
        tracing::warn!("No SSH credential configured, backup and patch commands are disabled");
    }

    let notifier: Arc<dyn Notifier> = if config.alert_webhook.is_some() {
        Arc::new(WebhookNotifier::new()?)
    } else {
        tracing::warn!("ALERT_WEBHOOK_URL not set, messages will only be logged");
        Arc::new(LogNotifier)
    };

    let prober = Arc::new(NetworkProber::new(config.monitor_host.clone()));
    let engine = MonitorEngine::new(
        config.monitor_host.clone(),
        config.targets(),
        prober,
        config.probe_timeouts(),
    )?;

    let state = Arc::new(AppState::new(config.clone(), notifier.clone(), engine.checker()));

    // Start monitor loop
    let cancel = CancellationToken::new();
    let monitor = monitor_service::start(
        engine,
        notifier,
        state.alert_destination.clone(),
        config.check_interval,
        cancel.clone(),
    );

    // Initialize cron scheduler
    let scheduler = match BackupScheduler::new(state.clone()).await {
        Ok(s) => {
            if let Err(e) = s.init_schedules().await {
                tracing::warn!("Failed to initialize schedules: {}", e);
            }
            if let Err(e) = s.start().await {
                tracing::warn!("Failed to start scheduler: {}", e);
            }
            Some(s)
        }
        Err(e) => {
            tracing::warn!("Failed to create scheduler: {}", e);
            None
        }
    };

    let app = routes::create_router(state.clone());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await?;

    tracing::info!("Shutting down...");
    cancel.cancel();

    if let Some(s) = scheduler {
        if let Err(e) = s.shutdown().await {
            tracing::warn!("Scheduler shutdown error: {}", e);
        }
    }

    if let Err(e) = monitor.await {
        tracing::warn!("Monitor task ended abnormally: {}", e);
    }

    tracing::info!("Hostwatch stopped");
    Ok(())
}
