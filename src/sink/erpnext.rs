// src/sink/erpnext.rs
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::config::ErpnextConfig;
use crate::sink::{extract_error_text, CheckinRequest, CheckinSink, PushOutcome, SinkError};
use crate::types::format_punch_timestamp;

/// Per-request timeout; see `DESIGN.md`.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const CHECKIN_METHOD: &str =
    "hr.doctype.employee_checkin.employee_checkin.add_log_based_on_employee_field";

/// HTTP client for the ERPNext employee-checkin endpoint.
pub struct ErpnextClient {
    base_url: String,
    api_key: String,
    api_secret: String,
    version: u32,
    client: Client,
    timeout: Duration,
}

impl ErpnextClient {
    pub fn new(cfg: &ErpnextConfig) -> Self {
        Self {
            base_url: cfg.url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
            api_secret: cfg.api_secret.clone(),
            version: cfg.version,
            client: Client::new(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    /// Fixed compatibility switch: the checkin doctype moved from the
    /// `erpnext` app to `hrms` after version 13.
    fn endpoint_app(&self) -> &'static str {
        if self.version > 13 {
            "hrms"
        } else {
            "erpnext"
        }
    }

    fn checkin_url(&self) -> String {
        format!(
            "{}/api/method/{}.{}",
            self.base_url,
            self.endpoint_app(),
            CHECKIN_METHOD
        )
    }
}

#[derive(Deserialize)]
struct CreatedResponse {
    message: CreatedMessage,
}

#[derive(Deserialize)]
struct CreatedMessage {
    name: String,
}

#[async_trait]
impl CheckinSink for ErpnextClient {
    async fn submit_checkin(&self, req: &CheckinRequest) -> Result<PushOutcome, SinkError> {
        let body = serde_json::json!({
            "employee_field_value": req.employee_field_value,
            "timestamp": format_punch_timestamp(&req.timestamp),
            "device_id": req.device_id,
            "log_type": req.direction.map(|d| d.as_str()),
            "latitude": req.latitude,
            "longitude": req.longitude,
        });

        let resp = self
            .client
            .post(self.checkin_url())
            .timeout(self.timeout)
            .header(
                "Authorization",
                format!("token {}:{}", self.api_key, self.api_secret),
            )
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))?;

        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))?;

        if status.is_success() {
            let parsed: CreatedResponse = serde_json::from_slice(&bytes).map_err(|e| {
                SinkError::Transport(format!("malformed checkin success response: {e}"))
            })?;
            return Ok(PushOutcome::Created(parsed.message.name));
        }

        Ok(PushOutcome::Rejected {
            status: status.as_u16(),
            reason: extract_error_text(&bytes),
        })
    }
}
