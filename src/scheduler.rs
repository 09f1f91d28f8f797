// src/scheduler.rs
use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::info;

use crate::config::{AppConfig, DeviceConfig};
use crate::sink::ErpnextClient;
use crate::source::{BioTimeClient, PunchSource};
use crate::sync::Orchestrator;
use crate::watermark::JsonFileStore;

const WATERMARK_FILE: &str = "status.json";

/// Fixed-interval sync loop: one `run_cycle` per tick until the shutdown
/// flag is raised. The first cycle runs immediately.
pub async fn run_loop(config: AppConfig, mut shutdown: watch::Receiver<bool>) -> Result<()> {
    let sink = ErpnextClient::new(&config.erpnext);
    let mut store = JsonFileStore::open(config.logs_directory.join(WATERMARK_FILE))?;

    let period = Duration::from_secs(config.pull_frequency_mins * 60);
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let make_source =
        |device: &DeviceConfig| Box::new(BioTimeClient::new(device)) as Box<dyn PunchSource>;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                info!("starting sync cycle");
                let report = Orchestrator::new(&config, &sink, &mut store)?
                    .with_shutdown(shutdown.clone())
                    .run_cycle(&make_source)
                    .await;
                info!(
                    succeeded = report.succeeded,
                    failed = report.failed,
                    "sync cycle completed"
                );
            }
            res = shutdown.changed() => {
                if res.is_err() {
                    break;
                }
            }
        }
        if *shutdown.borrow() {
            info!("shutdown requested, stopping scheduler");
            break;
        }
    }
    Ok(())
}
