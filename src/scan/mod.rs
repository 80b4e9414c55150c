// src/scan/mod.rs
pub mod event;
pub mod sse;
pub mod stream;

pub use event::{decode_record, ScanEvent};
pub use stream::{ScanPhase, ScanRequest, ScanStream, SourceScope};

use metrics::{describe_counter, Unit};
use once_cell::sync::OnceCell;
use tokio_util::sync::CancellationToken;

/// Opens scan streams. Implemented by the HTTP client and by test fixtures.
pub trait ScanSource: Send + Sync {
    /// Returns immediately in `Connecting`; the connection is made on first poll.
    fn open_scan(&self, request: &ScanRequest, cancel: CancellationToken) -> ScanStream;
}

/// One-time metrics registration (so series show up once a recorder exists).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("scan_events_total", Unit::Count, "Decoded scan stream events.");
        describe_counter!("scan_items_total", Unit::Count, "Items ingested from scans.");
        describe_counter!(
            "scan_malformed_records_total",
            Unit::Count,
            "Scan records skipped as malformed."
        );
        describe_counter!(
            "scan_transport_errors_total",
            Unit::Count,
            "Scan connections that failed."
        );
    });
}
