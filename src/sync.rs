// src/sync.rs
// Per-device synchronization pass: compute the fetch window from the
// watermark, pull punches, classify, forward each one in fetch order, and
// advance the watermark after every confirmed push.

use std::path::Path;

use chrono::{Duration, NaiveDateTime};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::allowlist::ErrorAllowlist;
use crate::classify::{classify, PunchCodeSets};
use crate::config::{AppConfig, DeviceConfig};
use crate::sink::{CheckinRequest, CheckinSink, PushOutcome, SinkError};
use crate::source::{PunchSource, SourceError};
use crate::types::{format_punch_timestamp, RawPunch, SyncWindow};
use crate::watermark::{device_key, WatermarkStore};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Sink(#[from] SinkError),
    /// Rejection whose reason matched no allowlist entry; aborts the
    /// remainder of the device's batch.
    #[error("fatal rejection (status {status}) for punch {uid}: {reason}")]
    FatalRejection {
        uid: i64,
        status: u16,
        reason: String,
    },
    #[error("watermark store: {0}")]
    Watermark(#[source] anyhow::Error),
}

/// Outcome counters for one device pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeviceRunReport {
    pub fetched: usize,
    pub created: usize,
    /// Allowlisted rejections that were logged and skipped.
    pub skipped: usize,
    /// Set when a shutdown request stopped the pass between punches.
    pub stopped: bool,
}

/// Counters for one full cycle across all configured devices.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub succeeded: usize,
    pub failed: usize,
}

/// Drives one sync pass per device. Devices run sequentially; punches
/// within a device run strictly in fetch order, because watermark
/// correctness depends on monotonic advancement.
pub struct Orchestrator<'a> {
    config: &'a AppConfig,
    sink: &'a dyn CheckinSink,
    store: &'a mut dyn WatermarkStore,
    allowlist: ErrorAllowlist,
    global_sets: PunchCodeSets,
    shutdown: Option<watch::Receiver<bool>>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        config: &'a AppConfig,
        sink: &'a dyn CheckinSink,
        store: &'a mut dyn WatermarkStore,
    ) -> anyhow::Result<Self> {
        let allowlist = config.allowlist()?;
        let global_sets = PunchCodeSets::new(
            config.punch_values_in.clone(),
            config.punch_values_out.clone(),
        );
        Ok(Self {
            config,
            sink,
            store,
            allowlist,
            global_sets,
            shutdown: None,
        })
    }

    /// Install a shutdown flag, observed between punches: the in-flight
    /// punch is finished and its watermark persisted before stopping.
    pub fn with_shutdown(mut self, rx: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(rx);
        self
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Fetch window for one device: watermark if present, else the
    /// configured import start, else now minus the lookback window.
    pub fn compute_window(&self, device_id: &str, now: NaiveDateTime) -> SyncWindow {
        let start = self
            .store
            .get(&device_key(device_id))
            .or_else(|| {
                self.config
                    .import_start()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })
            .unwrap_or_else(|| now - Duration::days(self.config.lookback_days));
        SyncWindow { start, end: now }
    }

    /// Advance the device watermark to `ts` and flush durably. Never
    /// moves backwards: a re-fetched punch at or before the stored
    /// position leaves it untouched.
    fn advance_watermark(&mut self, key: &str, ts: NaiveDateTime) -> Result<(), SyncError> {
        if self.store.get(key).is_some_and(|current| ts <= current) {
            return Ok(());
        }
        self.store.set(key, ts);
        self.store.persist().map_err(SyncError::Watermark)
    }

    /// One pass for one device. Fatal conditions abort the remainder of
    /// this device's batch only; the caller isolates them per device.
    pub async fn run_device(
        &mut self,
        device: &DeviceConfig,
        source: &dyn PunchSource,
    ) -> Result<DeviceRunReport, SyncError> {
        let key = device_key(&device.device_id);
        let window = self.compute_window(&device.device_id, chrono::Local::now().naive_local());
        info!(
            device_id = %device.device_id,
            start = %window.start_str(),
            end = %window.end_str(),
            "fetching punches"
        );

        let punches = source.fetch_punches(&window).await?;
        dump_last_fetch(&self.config.logs_directory, device, &punches);

        let sets = PunchCodeSets::for_device(&self.global_sets, device);
        let mut report = DeviceRunReport {
            fetched: punches.len(),
            ..Default::default()
        };

        for punch in &punches {
            if self.shutdown_requested() {
                info!(device_id = %device.device_id, "shutdown requested, stopping before next punch");
                report.stopped = true;
                break;
            }

            let direction = classify(punch.punch_code, device.punch_direction, &sets);
            let req = CheckinRequest {
                employee_field_value: punch.emp_code.clone(),
                timestamp: punch.timestamp,
                device_id: device.device_id.clone(),
                direction,
                latitude: device.latitude,
                longitude: device.longitude,
            };

            match self.sink.submit_checkin(&req).await? {
                PushOutcome::Created(name) => {
                    info!(
                        target: "attendance",
                        device_id = %device.device_id,
                        checkin = %name,
                        uid = punch.uid,
                        emp_code = %punch.emp_code,
                        timestamp = %format_punch_timestamp(&punch.timestamp),
                        punch_code = punch.punch_code,
                        direction = direction.map(|d| d.as_str()).unwrap_or(""),
                        "check-in created"
                    );
                    self.advance_watermark(&key, punch.timestamp)?;
                    report.created += 1;
                }
                PushOutcome::Rejected { status, reason } => {
                    warn!(
                        target: "attendance",
                        device_id = %device.device_id,
                        status,
                        uid = punch.uid,
                        emp_code = %punch.emp_code,
                        timestamp = %format_punch_timestamp(&punch.timestamp),
                        punch_code = punch.punch_code,
                        reason = %reason,
                        "check-in rejected"
                    );
                    if self.allowlist.is_allowlisted(&reason) {
                        report.skipped += 1;
                        continue;
                    }
                    return Err(SyncError::FatalRejection {
                        uid: punch.uid,
                        status,
                        reason,
                    });
                }
            }
        }

        Ok(report)
    }

    /// One pass over every configured device. A device's failure is
    /// logged and isolated; the remaining devices still run.
    pub async fn run_cycle(
        &mut self,
        make_source: &dyn Fn(&DeviceConfig) -> Box<dyn PunchSource>,
    ) -> CycleReport {
        let config = self.config;
        let mut cycle = CycleReport::default();
        for device in &config.devices {
            if self.shutdown_requested() {
                break;
            }
            let source = make_source(device);
            match self.run_device(device, source.as_ref()).await {
                Ok(report) => {
                    info!(
                        device_id = %device.device_id,
                        fetched = report.fetched,
                        created = report.created,
                        skipped = report.skipped,
                        "device sync completed"
                    );
                    cycle.succeeded += 1;
                }
                Err(e) => {
                    error!(device_id = %device.device_id, error = %e, "device sync failed");
                    cycle.failed += 1;
                }
            }
        }
        cycle
    }
}

/// Best-effort dump of the last fetched batch, one file per device, for
/// manual reconciliation. Failures are logged, never fatal.
fn dump_last_fetch(logs_dir: &Path, device: &DeviceConfig, punches: &[RawPunch]) {
    let name = format!(
        "{}_{}_last_fetch_dump.json",
        device.device_id,
        device.server_ip.replace('.', "_")
    );
    let path = logs_dir.join(name);
    let result = (|| -> anyhow::Result<()> {
        std::fs::create_dir_all(logs_dir)?;
        let body = serde_json::to_string_pretty(punches)?;
        std::fs::write(&path, body)?;
        Ok(())
    })();
    if let Err(e) = result {
        warn!(path = %path.display(), error = %e, "could not write last-fetch dump");
    }
}
