// src/types.rs
use chrono::{NaiveDateTime, ParseError};
use serde::{Deserialize, Serialize};

/// Timestamp format used by the BioTime API and the watermark store.
pub const PUNCH_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format of the configured import start date, e.g. "20240101".
pub const IMPORT_DATE_FORMAT: &str = "%Y%m%d";

/// Punch state the terminal reports when it has no usable value.
pub const UNKNOWN_PUNCH_CODE: u32 = 255;

/// One attendance punch as fetched from the aggregation server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPunch {
    /// Source-assigned unique id of the transaction.
    pub uid: i64,
    /// Opaque employee code, matched against HR employee records downstream.
    pub emp_code: String,
    /// Punch time, second resolution, source-local time zone.
    pub timestamp: NaiveDateTime,
    /// Raw punch-state code; meaning is terminal-model specific.
    pub punch_code: u32,
    /// Source status flag, carried through for the audit trail.
    pub status: u8,
}

/// Semantic direction of a punch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "IN",
            Direction::Out => "OUT",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive fetch window `[start, end]`, formatted to second resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl SyncWindow {
    pub fn start_str(&self) -> String {
        self.start.format(PUNCH_TIME_FORMAT).to_string()
    }

    pub fn end_str(&self) -> String {
        self.end.format(PUNCH_TIME_FORMAT).to_string()
    }
}

/// Parse a `YYYY-MM-DD HH:MM:SS` punch timestamp.
///
/// Malformed input is a fatal fetch error for the caller, never a
/// skippable record.
pub fn parse_punch_timestamp(s: &str) -> Result<NaiveDateTime, ParseError> {
    NaiveDateTime::parse_from_str(s, PUNCH_TIME_FORMAT)
}

pub fn format_punch_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(PUNCH_TIME_FORMAT).to_string()
}
