// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod allowlist;
pub mod classify;
pub mod config;
pub mod scheduler;
pub mod sink;
pub mod source;
pub mod sync;
pub mod types;
pub mod watermark;

// ---- Re-exports for stable public API ----
pub use crate::allowlist::ErrorAllowlist;
pub use crate::classify::{classify, PunchCodeSets};
pub use crate::config::{AppConfig, DeviceConfig, DirectionMode};
pub use crate::sink::{CheckinRequest, CheckinSink, ErpnextClient, PushOutcome, SinkError};
pub use crate::source::{BioTimeClient, PunchSource, SourceError};
pub use crate::sync::{CycleReport, DeviceRunReport, Orchestrator, SyncError};
pub use crate::types::{Direction, RawPunch, SyncWindow};
pub use crate::watermark::{device_key, JsonFileStore, MemoryStore, WatermarkStore};
