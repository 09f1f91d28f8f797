// src/source/mod.rs
pub mod biotime;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{RawPunch, SyncWindow};

pub use biotime::BioTimeClient;

#[derive(Debug, Error)]
pub enum SourceError {
    /// Credentials rejected or no token in the auth response.
    #[error("authentication against {host}:{port} failed: {reason}")]
    Auth {
        host: String,
        port: u16,
        reason: String,
    },
    /// Non-2xx response or network failure on an auth or fetch call.
    #[error("source transport error{}: {body}", .status.map(|s| format!(" (status {s})")).unwrap_or_default())]
    Transport { status: Option<u16>, body: String },
    /// Malformed field in a source record. Fatal for the whole fetch,
    /// never a skippable record.
    #[error("malformed source {field} {value:?}")]
    Parse { field: &'static str, value: String },
}

/// Fetches all punches in a window from one aggregation server.
#[async_trait]
pub trait PunchSource: Send + Sync {
    async fn fetch_punches(&self, window: &SyncWindow) -> Result<Vec<RawPunch>, SourceError>;
}

/// One page of the source's transaction list.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionsPage {
    pub punches: Vec<RawPunch>,
    /// Whether the response indicated a further page.
    pub has_next: bool,
}

/// Fetches one numbered page; page numbers are 1-based.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, page: u32) -> Result<TransactionsPage, SourceError>;
}

/// Walk pages at increasing numbers until the source signals no further
/// page, concatenating records in page order (never re-sorted).
pub async fn collect_pages(fetcher: &dyn PageFetcher) -> Result<Vec<RawPunch>, SourceError> {
    let mut all = Vec::new();
    let mut page = 1u32;
    loop {
        let p = fetcher.fetch_page(page).await?;
        all.extend(p.punches);
        if !p.has_next {
            break;
        }
        page += 1;
    }
    Ok(all)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::parse_punch_timestamp;

    struct ScriptedPages {
        pages: Vec<TransactionsPage>,
    }

    #[async_trait]
    impl PageFetcher for ScriptedPages {
        async fn fetch_page(&self, page: u32) -> Result<TransactionsPage, SourceError> {
            self.pages
                .get((page - 1) as usize)
                .cloned()
                .ok_or(SourceError::Transport {
                    status: Some(404),
                    body: format!("page {page} requested past the end"),
                })
        }
    }

    fn punch(uid: i64, ts: &str) -> RawPunch {
        RawPunch {
            uid,
            emp_code: "E1".into(),
            timestamp: parse_punch_timestamp(ts).unwrap(),
            punch_code: 0,
            status: 1,
        }
    }

    #[tokio::test]
    async fn concatenates_all_pages_in_order() {
        let fetcher = ScriptedPages {
            pages: vec![
                TransactionsPage {
                    punches: vec![punch(1, "2024-01-02 08:00:00"), punch(2, "2024-01-02 09:00:00")],
                    has_next: true,
                },
                TransactionsPage {
                    punches: vec![punch(3, "2024-01-02 10:00:00")],
                    has_next: true,
                },
                TransactionsPage {
                    punches: vec![punch(4, "2024-01-02 11:00:00")],
                    has_next: false,
                },
            ],
        };
        let all = collect_pages(&fetcher).await.unwrap();
        assert_eq!(all.iter().map(|p| p.uid).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn stops_exactly_when_no_next_page() {
        // A single page with has_next=false must not request page 2,
        // which the scripted fetcher would fail.
        let fetcher = ScriptedPages {
            pages: vec![TransactionsPage {
                punches: vec![punch(1, "2024-01-02 08:00:00")],
                has_next: false,
            }],
        };
        let all = collect_pages(&fetcher).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn empty_first_page_yields_empty_fetch() {
        let fetcher = ScriptedPages {
            pages: vec![TransactionsPage {
                punches: vec![],
                has_next: false,
            }],
        };
        assert!(collect_pages(&fetcher).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn mid_walk_transport_error_propagates() {
        let fetcher = ScriptedPages {
            pages: vec![TransactionsPage {
                punches: vec![punch(1, "2024-01-02 08:00:00")],
                has_next: true,
            }],
        };
        assert!(matches!(
            collect_pages(&fetcher).await,
            Err(SourceError::Transport { .. })
        ));
    }
}
