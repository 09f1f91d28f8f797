// src/config.rs
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::allowlist::ErrorAllowlist;
use crate::types::IMPORT_DATE_FORMAT;

const ENV_PATH: &str = "CHECKIN_SYNC_CONFIG";
const DEFAULT_PATH: &str = "config/checkin_sync.toml";

/// Fixed per-device punch direction, or `AUTO` to resolve from the raw
/// punch code. A device without a mode forwards an absent direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DirectionMode {
    In,
    Out,
    Auto,
}

/// One biometric aggregation server to pull from.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    /// Stable, unique identifier; the join key into the watermark store.
    pub device_id: String,
    pub server_ip: String,
    pub server_port: u16,
    pub username: String,
    pub password: String,
    /// Direction policy. Default: unset (forward absent direction).
    #[serde(default)]
    pub punch_direction: Option<DirectionMode>,
    /// Geolocation forwarded with every check-in. Default: absent.
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    /// Restrict the fetch to one employee code. Default: all employees.
    #[serde(default)]
    pub emp_code: Option<String>,
    /// Restrict the fetch to one terminal serial. Default: all terminals.
    #[serde(default)]
    pub terminal_sn: Option<String>,
    /// Per-device override of the IN code set. Default: global set.
    #[serde(default)]
    pub punch_values_in: Option<Vec<u32>>,
    /// Per-device override of the OUT code set. Default: global set.
    #[serde(default)]
    pub punch_values_out: Option<Vec<u32>>,
}

/// ERPNext connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ErpnextConfig {
    /// Base URL, e.g. `https://hr.example.com`.
    pub url: String,
    pub api_key: String,
    pub api_secret: String,
    /// Protocol-version switch: ≤ 13 targets the `erpnext` app namespace,
    /// > 13 targets `hrms`. Default: 15.
    #[serde(default = "default_erpnext_version")]
    pub version: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub devices: Vec<DeviceConfig>,
    pub erpnext: ErpnextConfig,
    /// First-run fetch start, format `YYYYMMDD`. Default: unset, in which
    /// case the lookback window applies.
    #[serde(default)]
    pub import_start_date: Option<String>,
    /// Minutes between sync cycles. Default: 60.
    #[serde(default = "default_pull_frequency_mins")]
    pub pull_frequency_mins: u64,
    /// First-run fallback when no import start is configured: fetch from
    /// now minus this many days. Default: 10.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: i64,
    /// Optional 1-based selection into the fixed benign-error list.
    /// Default: all known benign errors are allowlisted.
    #[serde(default)]
    pub allowed_exceptions: Option<Vec<usize>>,
    /// Global IN punch-code set. Default: [0, 4].
    #[serde(default = "default_punch_values_in")]
    pub punch_values_in: Vec<u32>,
    /// Global OUT punch-code set. Default: [1, 5].
    #[serde(default = "default_punch_values_out")]
    pub punch_values_out: Vec<u32>,
    /// Directory for the watermark store and last-fetch dumps.
    /// Default: `logs`.
    #[serde(default = "default_logs_directory")]
    pub logs_directory: PathBuf,
}

fn default_erpnext_version() -> u32 {
    15
}

fn default_pull_frequency_mins() -> u64 {
    60
}

fn default_lookback_days() -> i64 {
    10
}

fn default_punch_values_in() -> Vec<u32> {
    vec![0, 4]
}

fn default_punch_values_out() -> Vec<u32> {
    vec![1, 5]
}

fn default_logs_directory() -> PathBuf {
    PathBuf::from("logs")
}

impl AppConfig {
    pub fn from_toml(s: &str) -> Result<Self> {
        let cfg: AppConfig = toml::from_str(s).context("parsing configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading configuration from {}", path.display()))?;
        Self::from_toml(&content)
    }

    /// Load from `$CHECKIN_SYNC_CONFIG`, falling back to
    /// `config/checkin_sync.toml`.
    pub fn from_env_or_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_PATH} points to non-existent path"));
            }
            return Self::from_path(&pb);
        }
        Self::from_path(Path::new(DEFAULT_PATH))
    }

    fn validate(&self) -> Result<()> {
        if self.devices.is_empty() {
            return Err(anyhow!("no devices configured"));
        }
        let mut seen = std::collections::HashSet::new();
        for d in &self.devices {
            if d.device_id.trim().is_empty() {
                return Err(anyhow!("device_id must be non-empty"));
            }
            if !seen.insert(d.device_id.as_str()) {
                return Err(anyhow!("duplicate device_id {:?}", d.device_id));
            }
        }
        if self.erpnext.url.trim().is_empty() {
            return Err(anyhow!("erpnext.url must be non-empty"));
        }
        if self.lookback_days < 0 {
            return Err(anyhow!(
                "lookback_days must be non-negative, got {}",
                self.lookback_days
            ));
        }
        if let Some(s) = &self.import_start_date {
            NaiveDate::parse_from_str(s, IMPORT_DATE_FORMAT)
                .map_err(|e| anyhow!("import_start_date {s:?} is not YYYYMMDD: {e}"))?;
        }
        // Fail bad indices at load time, not mid-batch.
        self.allowlist()?;
        Ok(())
    }

    /// Import start, already validated at load time.
    pub fn import_start(&self) -> Option<NaiveDate> {
        self.import_start_date
            .as_deref()
            .and_then(|s| NaiveDate::parse_from_str(s, IMPORT_DATE_FORMAT).ok())
    }

    /// Effective rejection allowlist for this configuration.
    pub fn allowlist(&self) -> Result<ErrorAllowlist> {
        match &self.allowed_exceptions {
            Some(indices) => ErrorAllowlist::from_selection(indices)
                .context("invalid allowed_exceptions selection"),
            None => Ok(ErrorAllowlist::default()),
        }
    }
}
