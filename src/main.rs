mod alerter;
mod config;
mod cooldown;
mod detector;
mod error;
mod fetcher;
mod orchestrator;
mod parsing;
mod state;
mod stats;
mod types;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::orchestrator::Orchestrator;

#[tokio::main]
async fn main() {
    let config_path = std::env::var("CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    let cfg = match Config::load(Some(&config_path)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(code) = run(cfg).await {
        std::process::exit(code);
    }
}

async fn run(cfg: Config) -> std::result::Result<(), i32> {
    info!("sentinel starting");

    let gamma_client = fetcher::build_client().map_err(|e| {
        error!("failed to build HTTP client: {e}");
        1
    })?;
    let clob_client = gamma_client.clone();
    let notify_client = gamma_client.clone();

    info!("validating {} configured slugs", cfg.slugs.len());
    let valid_slugs = fetcher::validate_slugs(&gamma_client, &cfg).await;

    if valid_slugs.is_empty() {
        error!("no valid slugs found, exiting");
        return Err(1);
    }
    info!("monitoring {} valid event(s)", valid_slugs.len());

    let shutdown = Arc::new(AtomicBool::new(false));
    install_signal_handlers(Arc::clone(&shutdown));

    let orchestrator = Orchestrator::new(cfg, valid_slugs, gamma_client, clob_client);

    orchestrator::run_forever(orchestrator, notify_client, shutdown).await;

    info!("sentinel shutdown complete");
    Ok(())
}

fn install_signal_handlers(shutdown: Arc<AtomicBool>) {
    tokio::spawn(async move {
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                return;
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("received SIGINT, initiating graceful shutdown");
            }
            _ = sigterm.recv() => {
                info!("received SIGTERM, initiating graceful shutdown");
            }
        }

        shutdown.store(true, Ordering::SeqCst);
    });
}
