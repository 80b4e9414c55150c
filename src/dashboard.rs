// src/dashboard.rs
//! One dashboard page session: cold load from the cache, user-driven scans,
//! and the selection controls. The demo orchestrator shares its state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::aggregate::{AggregationState, SourceSelection};
use crate::cues::{Cue, SoundCuePlayer};
use crate::error::{ClientError, ClientResult};
use crate::gateway::{default_preferences, PreferenceGateway};
use crate::item::TrendingItem;
use crate::notice::NoticeBoard;
use crate::scan::{ScanEvent, ScanPhase, ScanRequest, ScanSource, SourceScope};

/// Summary of one finished scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanReport {
    pub phase: ScanPhase,
    pub delivered: usize,
    pub skipped: usize,
    /// Reported by the backend in `scan_complete`, if it got that far.
    pub total_items: Option<u64>,
}

pub struct Dashboard {
    prefs: Arc<dyn PreferenceGateway>,
    scans: Arc<dyn ScanSource>,
    cues: Arc<SoundCuePlayer>,
    state: Arc<Mutex<AggregationState>>,
    notices: Arc<NoticeBoard>,
    fallback_sources: Vec<String>,
    // Token of the scan in flight, tagged with its start order.
    in_flight: Mutex<Option<(u64, CancellationToken)>>,
    generation: AtomicU64,
}

impl Dashboard {
    pub fn new(
        prefs: Arc<dyn PreferenceGateway>,
        scans: Arc<dyn ScanSource>,
        cues: Arc<SoundCuePlayer>,
    ) -> Self {
        let mut st = AggregationState::new(SourceSelection::default());
        st.is_loading = true;
        Self {
            prefs,
            scans,
            cues,
            state: Arc::new(Mutex::new(st)),
            notices: Arc::new(NoticeBoard::new()),
            fallback_sources: default_preferences(),
            in_flight: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// Sources used when stored preferences cannot be loaded.
    pub fn with_fallback_sources(mut self, sources: Vec<String>) -> Self {
        if !sources.is_empty() {
            self.fallback_sources = sources;
        }
        self
    }

    /// Shared handle for the demo orchestrator.
    pub fn state(&self) -> Arc<Mutex<AggregationState>> {
        Arc::clone(&self.state)
    }

    pub fn cues(&self) -> Arc<SoundCuePlayer> {
        Arc::clone(&self.cues)
    }

    pub fn notices(&self) -> &NoticeBoard {
        &self.notices
    }

    /// Shared handle so the demo reports into the same banner.
    pub fn notice_board(&self) -> Arc<NoticeBoard> {
        Arc::clone(&self.notices)
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut AggregationState) -> R) -> R {
        let mut st = self.state.lock().expect("aggregation mutex poisoned");
        f(&mut st)
    }

    /// Load preferences and today's cached results. Failures degrade to
    /// defaults and an empty collection; only cancellation is returned.
    pub async fn mount(&self, cancel: &CancellationToken) -> ClientResult<()> {
        let prefs = match self.prefs.load_preferences(cancel).await {
            Ok(p) => p,
            Err(ClientError::Cancelled) => return Err(ClientError::Cancelled),
            Err(e) => {
                warn!(target: "dashboard", error = %e, "preferences unavailable; using defaults");
                self.notices.raise_error("Loading preferences", &e);
                self.fallback_sources.clone()
            }
        };
        let cached = match self.prefs.load_todays_cached_results(cancel).await {
            Ok(items) => items,
            Err(ClientError::Cancelled) => return Err(ClientError::Cancelled),
            Err(e) => {
                warn!(target: "dashboard", error = %e, "cached results unavailable");
                self.notices.raise_error("Loading cached results", &e);
                Vec::new()
            }
        };
        let count = cached.len();
        self.with_state(|st| {
            st.selection.set_preferences(prefs);
            st.hydrate(cached);
        });
        info!(target: "dashboard", cached = count, "dashboard mounted");
        Ok(())
    }

    /// Run one scan to its end. Starting a scan cancels any scan still in
    /// flight from this dashboard.
    pub async fn scan(&self, scope: SourceScope, cancel: &CancellationToken) -> ClientResult<ScanReport> {
        let token = cancel.child_token();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some((_, prev)) = self
            .in_flight
            .lock()
            .expect("in-flight mutex poisoned")
            .replace((generation, token.clone()))
        {
            debug!(target: "dashboard", "cancelling previous scan");
            prev.cancel();
        }

        let request = ScanRequest { scope, demo: false };
        let mut stream = self.scans.open_scan(&request, token.clone());
        let ticket = self.with_state(|st| st.begin_scan());

        let mut delivered = 0usize;
        let mut total_items = None;
        let mut failure = None;
        while let Some(next) = stream.next_event().await {
            match next {
                Err(e) => {
                    failure = Some(e);
                    break;
                }
                Ok(ScanEvent::ScanComplete { total_items: t }) => {
                    total_items = t;
                    break;
                }
                Ok(ScanEvent::Error { spider, message }) => {
                    warn!(target: "dashboard", ?spider, %message, "source reported an error");
                }
                Ok(ev) => {
                    if let Some((item, cached)) = ev.into_item() {
                        self.cues.play(Cue::Item);
                        self.with_state(|st| st.ingest_scanned(ticket, item, cached));
                        delivered += 1;
                    }
                }
            }
        }

        self.with_state(|st| st.end_scan(ticket));
        {
            let mut slot = self.in_flight.lock().expect("in-flight mutex poisoned");
            if slot.as_ref().is_some_and(|(g, _)| *g == generation) {
                *slot = None;
            }
        }

        if let Some(e) = failure {
            self.notices.raise_error("Scan", &e);
            self.cues.play(Cue::Error);
            return Err(e);
        }
        let report = ScanReport {
            phase: stream.phase(),
            delivered,
            skipped: stream.skipped(),
            total_items,
        };
        if report.phase == ScanPhase::Complete {
            self.cues.play(Cue::Success);
        }
        info!(target: "dashboard", phase = ?report.phase, delivered, skipped = report.skipped, "scan finished");
        Ok(report)
    }

    /// Stop the scan in flight, if any.
    pub fn cancel_scan(&self) {
        if let Some((_, t)) = self.in_flight.lock().expect("in-flight mutex poisoned").take() {
            t.cancel();
        }
    }

    pub fn view(&self) -> Vec<TrendingItem> {
        self.with_state(|st| st.view())
    }

    pub fn selection(&self) -> SourceSelection {
        self.with_state(|st| st.selection.clone())
    }

    pub fn is_from_cache(&self) -> bool {
        self.with_state(|st| st.is_from_cache)
    }

    pub fn is_loading(&self) -> bool {
        self.with_state(|st| st.is_loading)
    }

    /// Replace the preferred sources locally (empty means all).
    pub fn set_filter(&self, sources: Vec<String>) {
        self.with_state(|st| st.selection.set_preferences(sources));
    }

    pub fn set_priority(&self, source: Option<&str>) {
        self.with_state(|st| st.selection.set_priority(source));
    }

    /// Persist the current preferences. Anonymous users get `AuthRequired`.
    pub async fn save_preferences(&self, cancel: &CancellationToken) -> ClientResult<()> {
        let prefs = self.with_state(|st| st.selection.preferences().to_vec());
        match self.prefs.save_preferences(&prefs, cancel).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.notices.raise_error("Saving preferences", &e);
                Err(e)
            }
        }
    }
}
