// src/source/biotime.rs
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::config::DeviceConfig;
use crate::source::{collect_pages, PageFetcher, PunchSource, SourceError, TransactionsPage};
use crate::types::{parse_punch_timestamp, RawPunch, SyncWindow, UNKNOWN_PUNCH_CODE};

/// Per-request timeout so a hung aggregation server cannot stall the
/// scheduling loop.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const TOKEN_PATH: &str = "/api-token-auth/";
const TRANSACTIONS_PATH: &str = "/iclock/api/transactions/";

/// HTTP client for one BioTime aggregation server.
///
/// The auth token is re-obtained once per `fetch_punches` call, not
/// cached across calls.
pub struct BioTimeClient {
    host: String,
    port: u16,
    username: String,
    password: String,
    emp_code: Option<String>,
    terminal_sn: Option<String>,
    client: Client,
    timeout: Duration,
}

impl BioTimeClient {
    pub fn new(device: &DeviceConfig) -> Self {
        Self {
            host: device.server_ip.clone(),
            port: device.server_port,
            username: device.username.clone(),
            password: device.password.clone(),
            emp_code: device.emp_code.clone(),
            terminal_sn: device.terminal_sn.clone(),
            client: Client::new(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    fn auth_err(&self, reason: impl Into<String>) -> SourceError {
        SourceError::Auth {
            host: self.host.clone(),
            port: self.port,
            reason: reason.into(),
        }
    }

    async fn authenticate(&self) -> Result<String, SourceError> {
        #[derive(Deserialize)]
        struct TokenResponse {
            #[serde(default)]
            token: Option<String>,
        }

        let resp = self
            .client
            .post(format!("{}{}", self.base_url(), TOKEN_PATH))
            .timeout(self.timeout)
            .json(&serde_json::json!({
                "username": self.username,
                "password": self.password,
            }))
            .send()
            .await
            .map_err(|e| SourceError::Transport {
                status: None,
                body: e.to_string(),
            })?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(self.auth_err(format!("status {}: {body}", status.as_u16())));
        }
        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|_| self.auth_err("malformed auth response"))?;
        parsed
            .token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| self.auth_err("no token in auth response"))
    }
}

#[async_trait]
impl PunchSource for BioTimeClient {
    async fn fetch_punches(&self, window: &SyncWindow) -> Result<Vec<RawPunch>, SourceError> {
        let token = self.authenticate().await?;
        let pages = BioTimePages {
            client: self,
            token,
            window: *window,
        };
        collect_pages(&pages).await
    }
}

struct BioTimePages<'a> {
    client: &'a BioTimeClient,
    token: String,
    window: SyncWindow,
}

#[async_trait]
impl PageFetcher for BioTimePages<'_> {
    async fn fetch_page(&self, page: u32) -> Result<TransactionsPage, SourceError> {
        let c = self.client;
        let mut params: Vec<(&str, String)> = vec![
            ("start_time", self.window.start_str()),
            ("end_time", self.window.end_str()),
            ("page", page.to_string()),
        ];
        if let Some(emp) = &c.emp_code {
            params.push(("emp_code", emp.clone()));
        }
        if let Some(sn) = &c.terminal_sn {
            params.push(("terminal_sn", sn.clone()));
        }

        let resp = c
            .client
            .get(format!("{}{}", c.base_url(), TRANSACTIONS_PATH))
            .timeout(c.timeout)
            .header("Authorization", format!("Token {}", self.token))
            .query(&params)
            .send()
            .await
            .map_err(|e| SourceError::Transport {
                status: None,
                body: e.to_string(),
            })?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(SourceError::Transport {
                status: Some(status.as_u16()),
                body,
            });
        }
        parse_page_body(&body)
    }
}

#[derive(Deserialize)]
struct TransactionsResponse {
    #[serde(default)]
    data: Vec<TransactionRecord>,
    /// URL of the next page, or null when this is the last one.
    #[serde(default)]
    next: Option<String>,
}

#[derive(Deserialize)]
struct TransactionRecord {
    id: i64,
    #[serde(default)]
    emp_code: Option<String>,
    punch_time: String,
    #[serde(default)]
    punch_state: Option<serde_json::Value>,
}

/// Parse one transactions-page body into punches + next-page indicator.
fn parse_page_body(body: &str) -> Result<TransactionsPage, SourceError> {
    let parsed: TransactionsResponse =
        serde_json::from_str(body).map_err(|e| SourceError::Transport {
            status: None,
            body: format!("malformed transactions response: {e}"),
        })?;
    let mut punches = Vec::with_capacity(parsed.data.len());
    for rec in parsed.data {
        punches.push(record_into_punch(rec)?);
    }
    Ok(TransactionsPage {
        punches,
        has_next: parsed.next.is_some(),
    })
}

fn record_into_punch(rec: TransactionRecord) -> Result<RawPunch, SourceError> {
    let timestamp = parse_punch_timestamp(&rec.punch_time).map_err(|_| SourceError::Parse {
        field: "punch_time",
        value: rec.punch_time.clone(),
    })?;
    // BioTime serializes punch_state as a string on some firmware
    // revisions and as a number on others.
    let punch_code = match rec.punch_state {
        None | Some(serde_json::Value::Null) => UNKNOWN_PUNCH_CODE,
        Some(serde_json::Value::Number(n)) => {
            n.as_u64()
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| SourceError::Parse {
                    field: "punch_state",
                    value: n.to_string(),
                })?
        }
        Some(serde_json::Value::String(s)) => {
            s.trim().parse::<u32>().map_err(|_| SourceError::Parse {
                field: "punch_state",
                value: s.clone(),
            })?
        }
        Some(other) => {
            return Err(SourceError::Parse {
                field: "punch_state",
                value: other.to_string(),
            })
        }
    };
    Ok(RawPunch {
        uid: rec.id,
        emp_code: rec.emp_code.unwrap_or_default(),
        timestamp,
        punch_code,
        status: 1,
    })
}
