// tests/common/mod.rs
//
// Shared fakes for integration tests: a recording page host and terminal
// surface, fixture scan sources, SSE frame builders and an in-process mock
// backend.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::StreamExt;
use serde_json::{json, Value as Json};
use tokio_util::sync::CancellationToken;

use devpulse_client::demo::{DemoEnd, DemoSurface, PageHost, Provenance, ScrollPos};
use devpulse_client::scan::{ScanRequest, ScanSource, ScanStream};
use devpulse_client::terminal::OutputKind;
use devpulse_client::{ClientError, TrendingItem};

// ---------- SSE frames ----------

pub fn item_json(source: &str, url: &str, title: &str) -> Json {
    json!({ "title": title, "url": url, "source": source, "stars": 10 })
}

pub fn frame(value: Json) -> String {
    format!("data: {value}\n\n")
}

pub fn item_frame(source: &str, url: &str) -> String {
    frame(json!({ "type": "item", "spider": source, "data": item_json(source, url, &format!("t {url}")) }))
}

pub fn cached_frame(source: &str, url: &str) -> String {
    frame(json!({ "type": "cached_item", "spider": source, "data": item_json(source, url, &format!("c {url}")) }))
}

pub fn complete_frame(total: u64) -> String {
    frame(json!({ "type": "scan_complete", "total_items": total }))
}

pub fn item(source: &str, url: &str) -> TrendingItem {
    TrendingItem::new(source, format!("t {url}"), url)
        .validated()
        .expect("valid fixture item")
}

pub fn urls(items: &[TrendingItem]) -> Vec<String> {
    items.iter().map(|i| i.url.clone()).collect()
}

// ---------- scan sources ----------

/// Replays the same chunks for every scan.
pub struct FixtureScans {
    chunks: Vec<String>,
    pub opened: AtomicUsize,
    pub last_request: Mutex<Option<ScanRequest>>,
}

impl FixtureScans {
    pub fn new(chunks: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            chunks,
            opened: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        })
    }
}

impl ScanSource for FixtureScans {
    fn open_scan(&self, request: &ScanRequest, cancel: CancellationToken) -> ScanStream {
        self.opened.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        ScanStream::from_chunks(self.chunks.clone(), cancel)
    }
}

/// Emits `chunks` and then never finishes.
pub struct HangingScans {
    chunks: Vec<String>,
}

impl HangingScans {
    pub fn new(chunks: Vec<String>) -> Arc<Self> {
        Arc::new(Self { chunks })
    }
}

impl ScanSource for HangingScans {
    fn open_scan(&self, _request: &ScanRequest, cancel: CancellationToken) -> ScanStream {
        let head = futures::stream::iter(self.chunks.clone().into_iter().map(|c| Ok::<_, ClientError>(c.into_bytes())));
        let body = head.chain(futures::stream::pending()).boxed();
        ScanStream::from_body(body, cancel)
    }
}

/// One script per scan, in open order: each chunk after its delay, then the
/// body stays open. Opens past the last script see an empty open body.
pub struct ScriptedScans {
    scripts: Mutex<std::collections::VecDeque<Vec<(u64, String)>>>,
}

impl ScriptedScans {
    pub fn new(scripts: Vec<Vec<(u64, String)>>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
        })
    }
}

impl ScanSource for ScriptedScans {
    fn open_scan(&self, _request: &ScanRequest, cancel: CancellationToken) -> ScanStream {
        let script = self.scripts.lock().unwrap().pop_front().unwrap_or_default();
        let timed = futures::stream::iter(script).then(|(delay_ms, chunk)| async move {
            tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
            Ok::<_, ClientError>(chunk.into_bytes())
        });
        ScanStream::from_body(timed.chain(futures::stream::pending()).boxed(), cancel)
    }
}

// ---------- page host ----------

#[derive(Default)]
pub struct RecordingHost {
    pub target: Option<ScrollPos>,
    pub lock_calls: AtomicUsize,
    pub unlock_calls: AtomicUsize,
    pub scrolls: Mutex<Vec<ScrollPos>>,
    pub focused: Mutex<Vec<String>>,
}

impl RecordingHost {
    pub fn with_target(target: ScrollPos) -> Arc<Self> {
        Arc::new(Self {
            target: Some(target),
            ..Self::default()
        })
    }

    /// The terminal element is not on the page.
    pub fn without_target() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn locks(&self) -> usize {
        self.lock_calls.load(Ordering::SeqCst)
    }

    pub fn unlocks(&self) -> usize {
        self.unlock_calls.load(Ordering::SeqCst)
    }

    pub fn last_scroll(&self) -> Option<ScrollPos> {
        self.scrolls.lock().unwrap().last().copied()
    }
}

impl PageHost for RecordingHost {
    fn set_scroll_locked(&self, locked: bool) {
        if locked {
            self.lock_calls.fetch_add(1, Ordering::SeqCst);
        } else {
            self.unlock_calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn scroll_position(&self) -> ScrollPos {
        self.last_scroll().unwrap_or_default()
    }

    fn scroll_to(&self, pos: ScrollPos) {
        self.scrolls.lock().unwrap().push(pos);
    }

    fn centering_position(&self, _element: &str) -> Option<ScrollPos> {
        self.target
    }

    fn focus(&self, element: &str) {
        self.focused.lock().unwrap().push(element.to_string());
    }
}

// ---------- terminal surface ----------

#[derive(Default)]
pub struct RecordingSurface {
    pub inputs: Mutex<Vec<String>>,
    pub submitted: Mutex<Vec<String>>,
    pub printed: Mutex<Vec<(String, OutputKind)>>,
    pub shown: Mutex<Vec<(String, Provenance)>>,
    pub finished: Mutex<Vec<DemoEnd>>,
}

impl RecordingSurface {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn shown_with(&self, provenance: Provenance) -> Vec<String> {
        self.shown
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, p)| *p == provenance)
            .map(|(u, _)| u.clone())
            .collect()
    }

    pub fn finished_calls(&self) -> Vec<DemoEnd> {
        self.finished.lock().unwrap().clone()
    }
}

impl DemoSurface for RecordingSurface {
    fn set_input(&self, text: &str) {
        self.inputs.lock().unwrap().push(text.to_string());
    }

    fn submit(&self, command: &str) {
        self.submitted.lock().unwrap().push(command.to_string());
    }

    fn print(&self, line: &str, kind: OutputKind) {
        self.printed.lock().unwrap().push((line.to_string(), kind));
    }

    fn show_item(&self, item: &TrendingItem, provenance: Provenance) {
        self.shown.lock().unwrap().push((item.url.clone(), provenance));
    }

    fn finished(&self, end: DemoEnd) {
        self.finished.lock().unwrap().push(end);
    }
}

// ---------- mock backend ----------

/// Serve `router` on an ephemeral port; returns the base URL.
pub async fn spawn_backend(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock backend");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("mock backend");
    });
    format!("http://{addr}")
}
