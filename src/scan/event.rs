// src/scan/event.rs
use serde::Deserialize;
use thiserror::Error;

use crate::item::{InvalidItem, TrendingItem};

/// One decoded scan stream record.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScanEvent {
    /// Freshly scraped item.
    Item {
        #[serde(default)]
        spider: Option<String>,
        data: TrendingItem,
    },
    /// Item replayed from the backend cache.
    CachedItem {
        #[serde(default)]
        spider: Option<String>,
        data: TrendingItem,
    },
    ScanComplete {
        #[serde(default)]
        total_items: Option<u64>,
    },
    Status {
        #[serde(default)]
        message: String,
    },
    SpiderStart {
        spider: String,
    },
    SpiderComplete {
        spider: String,
    },
    Connecting {
        #[serde(default)]
        spider: Option<String>,
        #[serde(default)]
        message: String,
    },
    Scanning {
        #[serde(default)]
        spider: Option<String>,
        #[serde(default)]
        message: String,
    },
    Warning {
        #[serde(default)]
        spider: Option<String>,
        #[serde(default)]
        message: String,
    },
    /// Server-side problem with one source. Not fatal to the scan.
    Error {
        #[serde(default)]
        spider: Option<String>,
        #[serde(default)]
        message: String,
    },
    #[serde(other)]
    Unknown,
}

impl ScanEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanEvent::ScanComplete { .. })
    }

    /// The carried item and whether it came from cache.
    pub fn item(&self) -> Option<(&TrendingItem, bool)> {
        match self {
            ScanEvent::Item { data, .. } => Some((data, false)),
            ScanEvent::CachedItem { data, .. } => Some((data, true)),
            _ => None,
        }
    }

    pub fn into_item(self) -> Option<(TrendingItem, bool)> {
        match self {
            ScanEvent::Item { data, .. } => Some((data, false)),
            ScanEvent::CachedItem { data, .. } => Some((data, true)),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("invalid record json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid item: {0}")]
    Item(#[from] InvalidItem),
}

/// The single validating decoder at the stream boundary.
pub fn decode_record(payload: &str) -> Result<ScanEvent, RecordError> {
    let ev: ScanEvent = serde_json::from_str(payload)?;
    Ok(match ev {
        ScanEvent::Item { spider, data } => ScanEvent::Item {
            spider,
            data: data.validated()?,
        },
        ScanEvent::CachedItem { spider, data } => ScanEvent::CachedItem {
            spider,
            data: data.validated()?,
        },
        other => other,
    })
}
