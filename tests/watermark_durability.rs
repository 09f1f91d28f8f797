// tests/watermark_durability.rs
// The at-least-once contract: the file-backed watermark reflects the last
// confirmed push even when the batch dies partway through, so a restart
// resumes from the failure point rather than the batch start.

use async_trait::async_trait;
use chrono::NaiveDateTime;

use checkin_sync::config::{AppConfig, DeviceConfig, DirectionMode, ErpnextConfig};
use checkin_sync::sink::{CheckinRequest, CheckinSink, PushOutcome, SinkError};
use checkin_sync::source::{PunchSource, SourceError};
use checkin_sync::sync::Orchestrator;
use checkin_sync::types::{parse_punch_timestamp, RawPunch, SyncWindow};
use checkin_sync::watermark::{device_key, JsonFileStore, WatermarkStore};

fn ts(s: &str) -> NaiveDateTime {
    parse_punch_timestamp(s).unwrap()
}

fn config(logs_dir: &std::path::Path) -> AppConfig {
    AppConfig {
        devices: vec![DeviceConfig {
            device_id: "D1".into(),
            server_ip: "10.0.0.5".into(),
            server_port: 8081,
            username: "admin".into(),
            password: "secret".into(),
            punch_direction: Some(DirectionMode::Auto),
            latitude: None,
            longitude: None,
            emp_code: None,
            terminal_sn: None,
            punch_values_in: None,
            punch_values_out: None,
        }],
        erpnext: ErpnextConfig {
            url: "https://hr.example.com".into(),
            api_key: "key".into(),
            api_secret: "secret".into(),
            version: 15,
        },
        import_start_date: Some("20240101".into()),
        pull_frequency_mins: 60,
        lookback_days: 10,
        allowed_exceptions: None,
        punch_values_in: vec![0, 4],
        punch_values_out: vec![1, 5],
        logs_directory: logs_dir.to_path_buf(),
    }
}

struct TwoPunchSource;

#[async_trait]
impl PunchSource for TwoPunchSource {
    async fn fetch_punches(&self, _window: &SyncWindow) -> Result<Vec<RawPunch>, SourceError> {
        Ok(vec![
            RawPunch {
                uid: 1,
                emp_code: "EMP-1".into(),
                timestamp: ts("2024-01-02 08:00:00"),
                punch_code: 0,
                status: 1,
            },
            RawPunch {
                uid: 2,
                emp_code: "EMP-1".into(),
                timestamp: ts("2024-01-02 17:00:00"),
                punch_code: 1,
                status: 1,
            },
        ])
    }
}

/// Accepts the first push, then fails the batch fatally.
struct FirstOnlySink {
    calls: std::sync::Mutex<usize>,
}

#[async_trait]
impl CheckinSink for FirstOnlySink {
    async fn submit_checkin(&self, _req: &CheckinRequest) -> Result<PushOutcome, SinkError> {
        let mut calls = self.calls.lock().unwrap();
        *calls += 1;
        if *calls == 1 {
            Ok(PushOutcome::Created("HR-CKIN-00001".into()))
        } else {
            Ok(PushOutcome::Rejected {
                status: 500,
                reason: "Internal Server Error".into(),
            })
        }
    }
}

#[tokio::test]
async fn partial_batch_persists_progress_durably() {
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("status.json");
    let cfg = config(dir.path());

    {
        let sink = FirstOnlySink {
            calls: std::sync::Mutex::new(0),
        };
        let mut store = JsonFileStore::open(&store_path).unwrap();
        let mut orch = Orchestrator::new(&cfg, &sink, &mut store).unwrap();
        let result = orch.run_device(&cfg.devices[0], &TwoPunchSource).await;
        assert!(result.is_err());
    }

    // A fresh process sees the first punch as confirmed and resumes there.
    let reopened = JsonFileStore::open(&store_path).unwrap();
    assert_eq!(
        reopened.get(&device_key("D1")),
        Some(ts("2024-01-02 08:00:00"))
    );
}

#[tokio::test]
async fn last_fetch_dump_is_written_per_device() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());

    let sink = FirstOnlySink {
        calls: std::sync::Mutex::new(0),
    };
    let mut store = JsonFileStore::open(dir.path().join("status.json")).unwrap();
    let mut orch = Orchestrator::new(&cfg, &sink, &mut store).unwrap();
    let _ = orch.run_device(&cfg.devices[0], &TwoPunchSource).await;

    let dump = dir.path().join("D1_10_0_0_5_last_fetch_dump.json");
    let body = std::fs::read_to_string(dump).unwrap();
    let parsed: Vec<serde_json::Value> = serde_json::from_str(&body).unwrap();
    assert_eq!(parsed.len(), 2);
    assert_eq!(parsed[0]["uid"], 1);
}
