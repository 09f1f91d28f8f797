// src/sink/mod.rs
pub mod erpnext;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use thiserror::Error;

use crate::types::Direction;

pub use erpnext::ErpnextClient;

/// One check-in submission, built by the orchestrator from a classified
/// punch and the device configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckinRequest {
    pub employee_field_value: String,
    pub timestamp: NaiveDateTime,
    pub device_id: String,
    pub direction: Option<Direction>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Result of one submission that reached the HR system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// Record created; carries the HR system's record identifier.
    Created(String),
    /// The HR system refused the record. The reason is its free-text
    /// message; allowlist classification happens in the orchestrator.
    Rejected { status: u16, reason: String },
}

#[derive(Debug, Error)]
pub enum SinkError {
    /// Network failure or unusable response; fatal for the batch.
    #[error("checkin transport error: {0}")]
    Transport(String),
}

#[async_trait]
pub trait CheckinSink: Send + Sync {
    async fn submit_checkin(&self, req: &CheckinRequest) -> Result<PushOutcome, SinkError>;
}

/// Best-effort human-readable message from an error response body.
///
/// Three explicit tiers: the structured `exc` field (a JSON-encoded list
/// whose first element is the message), else the raw JSON body, else the
/// raw bytes as text.
pub fn extract_error_text(body: &[u8]) -> String {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) {
        if let Some(exc) = value.get("exc").and_then(|v| v.as_str()) {
            if let Ok(serde_json::Value::Array(items)) = serde_json::from_str(exc) {
                if let Some(first) = items.first().and_then(|v| v.as_str()) {
                    return first.to_string();
                }
            }
        }
        return value.to_string();
    }
    String::from_utf8_lossy(body).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_exc_field_wins() {
        let body =
            br#"{"exc": "[\"This employee already has a log with the same timestamp\"]"}"#;
        assert_eq!(
            extract_error_text(body),
            "This employee already has a log with the same timestamp"
        );
    }

    #[test]
    fn falls_back_to_raw_json() {
        let body = br#"{"message": "Server busy"}"#;
        assert_eq!(extract_error_text(body), r#"{"message":"Server busy"}"#);
    }

    #[test]
    fn falls_back_to_raw_bytes() {
        assert_eq!(
            extract_error_text(b"<html>Bad Gateway</html>"),
            "<html>Bad Gateway</html>"
        );
    }

    #[test]
    fn unusable_exc_payload_degrades_to_json_tier() {
        // exc present but not a JSON list: tier one cannot apply.
        let body = br#"{"exc": "plain text"}"#;
        assert_eq!(extract_error_text(body), r#"{"exc":"plain text"}"#);
    }
}
