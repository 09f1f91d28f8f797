//! Biometric Check-in Sync — Binary Entrypoint
//! Pulls attendance punches from the configured BioTime servers on a fixed
//! period and forwards them as ERPNext employee check-ins.
//!
//! See `README.md` for configuration and `DESIGN.md` for architecture notes.

use tokio::sync::watch;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use checkin_sync::config::AppConfig;
use checkin_sync::scheduler;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("checkin_sync=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments. This enables
    // CHECKIN_SYNC_CONFIG / RUST_LOG from .env.
    let _ = dotenvy::dotenv();

    init_tracing();

    let config = AppConfig::from_env_or_default()?;
    tracing::info!(
        devices = config.devices.len(),
        pull_frequency_mins = config.pull_frequency_mins,
        "configuration loaded"
    );

    // Graceful shutdown: ctrl-c finishes the in-flight punch (its
    // watermark is persisted) and stops before the next one.
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("ctrl-c received, finishing current punch before stopping");
            let _ = tx.send(true);
        }
    });

    scheduler::run_loop(config, rx).await
}
