// src/scan/stream.rs
//! One scan: `Idle -> Connecting -> Streaming -> Complete | Errored | Aborted`.

use std::collections::VecDeque;

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::StreamExt;
use metrics::counter;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::event::{decode_record, ScanEvent};
use super::sse::SseDecoder;
use crate::error::{ClientError, ClientResult};

pub type ByteStream = BoxStream<'static, ClientResult<Vec<u8>>>;
pub type OpenFuture = BoxFuture<'static, ClientResult<ByteStream>>;

/// Which sources a scan covers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SourceScope {
    #[default]
    All,
    Sources(Vec<String>),
}

impl SourceScope {
    /// Empty list means "all".
    pub fn from_list(list: Vec<String>) -> Self {
        let list: Vec<String> = list
            .into_iter()
            .map(|s| s.trim().to_ascii_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        if list.is_empty() || list.iter().any(|s| s == "all") {
            SourceScope::All
        } else {
            SourceScope::Sources(list)
        }
    }

    pub fn as_param(&self) -> String {
        match self {
            SourceScope::All => "all".to_string(),
            SourceScope::Sources(v) => v.join(","),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScanRequest {
    pub scope: SourceScope,
    /// Ask the backend for the cached-item fast path first.
    pub demo: bool,
}

impl ScanRequest {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn demo() -> Self {
        Self {
            scope: SourceScope::All,
            demo: true,
        }
    }

    pub fn query(&self) -> Vec<(&'static str, String)> {
        let mut q = vec![("sources", self.scope.as_param())];
        if self.demo {
            q.push(("demo", "true".to_string()));
        }
        q
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Idle,
    Connecting,
    Streaming,
    Complete,
    Errored,
    Aborted,
}

impl ScanPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, ScanPhase::Complete | ScanPhase::Errored | ScanPhase::Aborted)
    }
}

/// Pull-based consumer of one scan response.
///
/// `next_event` yields decoded events in arrival order. Malformed records are
/// logged and skipped; the first transport failure ends the stream with
/// `Some(Err(..))`; cancellation ends it with `None` and drops the body.
pub struct ScanStream {
    phase: ScanPhase,
    cancel: CancellationToken,
    opener: Option<OpenFuture>,
    body: Option<ByteStream>,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    skipped: usize,
}

impl ScanStream {
    fn idle(cancel: CancellationToken) -> Self {
        super::ensure_metrics_described();
        Self {
            phase: ScanPhase::Idle,
            cancel,
            opener: None,
            body: None,
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
            skipped: 0,
        }
    }

    /// Start a scan whose connection is opened lazily by `opener`.
    pub fn start(opener: OpenFuture, cancel: CancellationToken) -> Self {
        let mut s = Self::idle(cancel);
        s.opener = Some(opener);
        s.phase = ScanPhase::Connecting;
        s
    }

    /// Start over an already open body (fixtures, alternative transports).
    pub fn from_body(body: ByteStream, cancel: CancellationToken) -> Self {
        let mut s = Self::idle(cancel);
        s.body = Some(body);
        s.phase = ScanPhase::Connecting;
        s
    }

    /// Fixture helper: each string is one body chunk.
    pub fn from_chunks<I>(chunks: I, cancel: CancellationToken) -> Self
    where
        I: IntoIterator<Item = String>,
        I::IntoIter: Send + 'static,
    {
        let body = futures::stream::iter(chunks.into_iter().map(|c| Ok(c.into_bytes()))).boxed();
        Self::from_body(body, cancel)
    }

    /// Stream that fails to connect.
    pub fn failed(err: ClientError, cancel: CancellationToken) -> Self {
        Self::start(Box::pin(async move { Err(err) }), cancel)
    }

    pub fn phase(&self) -> ScanPhase {
        self.phase
    }

    /// Records skipped as malformed so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn abort(&mut self) {
        if !self.phase.is_terminal() {
            self.phase = ScanPhase::Aborted;
        }
        self.close();
    }

    fn close(&mut self) {
        self.opener = None;
        self.body = None;
        self.pending.clear();
    }

    fn fail(&mut self, err: ClientError) -> Option<ClientResult<ScanEvent>> {
        if err.is_cancelled() {
            self.abort();
            return None;
        }
        counter!("scan_transport_errors_total").increment(1);
        warn!(target: "scan", error = %err, "scan transport failure");
        self.phase = ScanPhase::Errored;
        self.close();
        Some(Err(err))
    }

    pub async fn next_event(&mut self) -> Option<ClientResult<ScanEvent>> {
        loop {
            if self.phase.is_terminal() || self.phase == ScanPhase::Idle {
                return None;
            }
            if self.cancel.is_cancelled() {
                self.abort();
                return None;
            }

            if let Some(rec) = self.pending.pop_front() {
                match decode_record(&rec) {
                    Ok(ev) => {
                        counter!("scan_events_total").increment(1);
                        if ev.item().is_some() {
                            counter!("scan_items_total").increment(1);
                        }
                        if self.phase == ScanPhase::Connecting {
                            self.phase = ScanPhase::Streaming;
                        }
                        if ev.is_terminal() {
                            self.phase = ScanPhase::Complete;
                            self.close();
                        }
                        return Some(Ok(ev));
                    }
                    Err(e) => {
                        self.skipped += 1;
                        counter!("scan_malformed_records_total").increment(1);
                        let preview: String = rec.chars().take(80).collect();
                        warn!(target: "scan", error = %e, %preview, "skipping malformed scan record");
                        continue;
                    }
                }
            }

            if let Some(open) = self.opener.take() {
                let cancel = self.cancel.clone();
                let res = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(ClientError::Cancelled),
                    r = open => r,
                };
                match res {
                    Ok(body) => {
                        self.body = Some(body);
                        continue;
                    }
                    Err(e) => return self.fail(e),
                }
            }

            let cancel = self.cancel.clone();
            let body = match self.body.as_mut() {
                Some(b) => b,
                None => {
                    self.phase = ScanPhase::Complete;
                    return None;
                }
            };
            let polled = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                c = body.next() => Some(c),
            };
            let Some(chunk) = polled else {
                self.abort();
                return None;
            };
            match chunk {
                Some(Ok(bytes)) => self.pending.extend(self.decoder.feed(&bytes)),
                Some(Err(e)) => return self.fail(e),
                None => {
                    self.body = None;
                    match self.decoder.finish() {
                        Some(rec) => self.pending.push_back(rec),
                        None => {
                            debug!(target: "scan", "scan body ended without scan_complete");
                            self.phase = ScanPhase::Complete;
                            return None;
                        }
                    }
                }
            }
        }
    }
}
