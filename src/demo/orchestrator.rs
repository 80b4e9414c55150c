// src/demo/orchestrator.rs
//! The demo state machine:
//!
//! `Idle -> Scrolling -> Typing -> ExecutingScan -> CachedBurst -> FreshScan
//!  -> SynthActivation -> SynthSearch -> Complete`, plus skip back to `Idle`
//! from any running phase.
//!
//! One orchestrator per page instance. It arms at most once, starts at most
//! once, and every exit path restores scrolling and input focus.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use metrics::counter;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::host::{ease_in_out, DemoSurface, PageHost, Provenance};
use super::{DemoEnd, DemoPhase, Interaction, Key, PageContext};
use crate::aggregate::{AggregationState, ScanTicket};
use crate::client::cancellable;
use crate::config::DemoConfig;
use crate::cues::{Cue, SoundCuePlayer};
use crate::error::DemoError;
use crate::gateway::DemoFeeds;
use crate::item::TrendingItem;
use crate::notice::NoticeBoard;
use crate::scan::{ScanEvent, ScanRequest, ScanSource, ScanStream};
use crate::terminal::OutputKind;
use crate::typing::{type_command, Typed};

/// Collaborators injected at construction.
#[derive(Clone)]
pub struct DemoDeps {
    pub host: Arc<dyn PageHost>,
    pub surface: Arc<dyn DemoSurface>,
    pub cues: Arc<SoundCuePlayer>,
    pub scans: Arc<dyn ScanSource>,
    pub feeds: Arc<dyn DemoFeeds>,
    pub state: Arc<Mutex<AggregationState>>,
    /// Page banner for transport and sign-in failures.
    pub notices: Arc<NoticeBoard>,
}

pub struct DemoOrchestrator {
    deps: DemoDeps,
    config: DemoConfig,
    typing_wpm: u32,
    // Trigger listeners attached (scroll, click, mousemove, keydown).
    armed: AtomicBool,
    triggered: AtomicBool,
    finished: AtomicBool,
    scroll_locked: AtomicBool,
    phase: watch::Sender<DemoPhase>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

type Step = Result<(), DemoError>;

const TRIGGER_LISTENERS: usize = 4;

impl DemoOrchestrator {
    pub fn new(deps: DemoDeps, config: DemoConfig, typing_wpm: u32) -> Arc<Self> {
        super::ensure_metrics_described();
        let (phase, _) = watch::channel(DemoPhase::Idle);
        Arc::new(Self {
            deps,
            config,
            typing_wpm,
            armed: AtomicBool::new(false),
            triggered: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            scroll_locked: AtomicBool::new(false),
            phase,
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        })
    }

    /// Check eligibility once and attach the trigger listeners if it holds.
    /// Returns whether the demo is armed.
    pub fn mount(&self, ctx: &PageContext) -> bool {
        if self.triggered.load(Ordering::SeqCst) || self.finished.load(Ordering::SeqCst) {
            return false;
        }
        if !ctx.demo_eligible(&self.config.landing_route) {
            debug!(target: "demo", signed_in = ctx.signed_in, route = %ctx.route, "demo not eligible");
            return false;
        }
        self.armed.store(true, Ordering::SeqCst);
        debug!(target: "demo", "demo armed");
        true
    }

    pub fn listeners_attached(&self) -> usize {
        if self.armed.load(Ordering::SeqCst) {
            TRIGGER_LISTENERS
        } else {
            0
        }
    }

    pub fn phase(&self) -> DemoPhase {
        *self.phase.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<DemoPhase> {
        self.phase.subscribe()
    }

    pub fn has_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    pub fn can_skip(&self) -> bool {
        self.is_running()
    }

    fn is_running(&self) -> bool {
        self.triggered.load(Ordering::SeqCst) && !self.finished.load(Ordering::SeqCst)
    }

    /// Feed one page interaction. Returns true only for the event that
    /// started the sequence.
    pub fn handle_interaction(self: &Arc<Self>, ev: Interaction) -> bool {
        if ev == Interaction::KeyDown(Key::Escape) && self.is_running() {
            self.skip();
            return false;
        }
        // Audio unlock rides on any trusted gesture while the demo is live.
        if ev.is_trusted_gesture() && (self.armed.load(Ordering::SeqCst) || self.is_running()) {
            self.deps.cues.unlock();
        }
        // First trigger detaches all four listeners.
        if !self.armed.swap(false, Ordering::SeqCst) {
            return false;
        }
        if self.triggered.swap(true, Ordering::SeqCst) {
            return false;
        }
        counter!("demo_runs_total").increment(1);
        info!(target: "demo", trigger = ?ev, "demo sequence starting");

        self.lock_scroll();
        self.enter(DemoPhase::Scrolling);

        let this = Arc::clone(self);
        let handle = tokio::spawn(async move { this.run().await });
        *self.task.lock().expect("demo task mutex poisoned") = Some(handle);
        true
    }

    /// User cancellation (Escape or skip control). Idempotent.
    pub fn skip(&self) {
        if !self.is_running() {
            return;
        }
        info!(target: "demo", phase = ?self.phase(), "demo skipped");
        self.cancel.cancel();
        self.finish(DemoEnd::Skipped);
    }

    /// Page navigation / unmount: stop everything, never re-arm.
    pub fn teardown(&self) {
        self.armed.store(false, Ordering::SeqCst);
        if self.is_running() {
            self.skip();
        } else {
            self.finished.store(true, Ordering::SeqCst);
        }
    }

    /// Wait for a started sequence to stop.
    pub async fn join(&self) {
        let handle = self.task.lock().expect("demo task mutex poisoned").take();
        if let Some(h) = handle {
            if let Err(e) = h.await {
                warn!(target: "demo", error = %e, "demo task panicked");
                self.finish(DemoEnd::Failed);
            }
        }
    }

    async fn run(self: Arc<Self>) {
        if self.finished.load(Ordering::SeqCst) {
            return;
        }
        match self.sequence().await {
            Ok(()) => self.finish(DemoEnd::Completed),
            Err(DemoError::Cancelled) => self.finish(DemoEnd::Skipped),
            Err(e) => {
                warn!(target: "demo", error = %e, phase = ?self.phase(), "demo failed; cleaning up");
                if let DemoError::Client(err) = &e {
                    self.deps.notices.raise_error("Demo", err);
                }
                self.finish(DemoEnd::Failed);
            }
        }
    }

    async fn sequence(&self) -> Step {
        self.scroll_into_view().await?;

        self.enter(DemoPhase::Typing);
        let boot = self.config.boot_message.clone();
        self.type_into_input(&boot).await?;
        self.deps.surface.set_input("");
        self.deps.surface.print(&boot, OutputKind::Info);
        let command = self.config.scan_command.clone();
        self.type_into_input(&command).await?;
        self.deps.surface.set_input("");
        self.deps.surface.submit(&command);

        self.enter(DemoPhase::ExecutingScan);
        self.execute_scan().await?;

        self.enter(DemoPhase::SynthActivation);
        let activate = self.config.assistant_command.clone();
        self.type_into_input(&activate).await?;
        self.deps.surface.set_input("");
        self.deps.surface.submit(&activate);
        self.deps
            .surface
            .print(&self.config.assistant_message, OutputKind::Info);

        self.enter(DemoPhase::SynthSearch);
        let demo = cancellable(&self.cancel, self.deps.feeds.load_assistant_demo(&self.cancel))
            .await
            .map_err(cancel_aware)?;
        self.ensure_live()?;
        self.deps
            .surface
            .print(&format!("> {}", demo.query), OutputKind::Info);
        if !demo.summary.is_empty() {
            self.deps.surface.print(&demo.summary, OutputKind::Success);
        }
        for item in &demo.results {
            self.show(item, Provenance::Assistant);
        }
        self.with_state(|st| st.ingest_batch(&demo.results));
        self.deps.cues.play(Cue::Success);
        self.ensure_live()
    }

    async fn scroll_into_view(&self) -> Step {
        let target = self
            .deps
            .host
            .centering_position(&self.config.terminal_element)
            .ok_or_else(|| DemoError::MissingTarget(self.config.terminal_element.clone()))?;
        let start = self.deps.host.scroll_position();
        let budget = self.config.scroll_duration();
        let frame = self.config.frame_interval();
        let began = tokio::time::Instant::now();
        loop {
            let elapsed = began.elapsed();
            if elapsed >= budget {
                break;
            }
            let t = elapsed.as_secs_f64() / budget.as_secs_f64();
            self.deps.host.scroll_to(start.lerp(target, ease_in_out(t)));
            self.pause(frame).await?;
        }
        // Budget spent: land on target whatever the animation reached.
        self.deps.host.scroll_to(target);
        Ok(())
    }

    async fn execute_scan(&self) -> Step {
        let mut stream = self
            .deps
            .scans
            .open_scan(&ScanRequest::demo(), self.cancel.child_token());
        let ticket = self.with_state(|st| st.begin_scan());
        let res = self.pump_scan(ticket, &mut stream).await;
        self.with_state(|st| st.end_scan(ticket));
        res
    }

    async fn pump_scan(&self, ticket: ScanTicket, stream: &mut ScanStream) -> Step {
        let mut seen_cached = false;
        let mut seen_live = false;
        while let Some(next) = stream.next_event().await {
            match next.map_err(cancel_aware)? {
                ScanEvent::CachedItem { data, .. } => {
                    if !seen_cached {
                        seen_cached = true;
                        self.enter(DemoPhase::CachedBurst);
                    }
                    self.pause(self.config.burst_delay()).await?;
                    self.arrive(ticket, data, Provenance::Cached);
                }
                ScanEvent::Item { data, .. } => {
                    if !seen_live {
                        seen_live = true;
                        self.enter(DemoPhase::FreshScan);
                    }
                    self.arrive(ticket, data, Provenance::Live);
                }
                ScanEvent::ScanComplete { total_items } => {
                    debug!(target: "demo", ?total_items, "demo scan complete");
                    break;
                }
                ScanEvent::Status { message } => self.deps.surface.print(&message, OutputKind::Info),
                ScanEvent::Error { spider, message } | ScanEvent::Warning { spider, message } => {
                    warn!(target: "demo", ?spider, %message, "source reported a problem");
                }
                other => debug!(target: "demo", event = ?other, "demo scan progress"),
            }
        }
        self.ensure_live()
    }

    /// Shown and merged together, or not at all once the run has finished.
    fn arrive(&self, ticket: ScanTicket, item: TrendingItem, provenance: Provenance) {
        if self.finished.load(Ordering::SeqCst) {
            return;
        }
        self.present(&item, provenance);
        let cached = provenance == Provenance::Cached;
        self.with_state(|st| st.ingest_scanned(ticket, item, cached));
    }

    fn show(&self, item: &TrendingItem, provenance: Provenance) {
        if self.finished.load(Ordering::SeqCst) {
            return;
        }
        self.present(item, provenance);
    }

    fn present(&self, item: &TrendingItem, provenance: Provenance) {
        self.deps.cues.play(Cue::Item);
        self.deps.surface.show_item(item, provenance);
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut AggregationState) -> R) -> R {
        let mut st = self.deps.state.lock().expect("aggregation mutex poisoned");
        f(&mut st)
    }

    async fn type_into_input(&self, text: &str) -> Step {
        let surface = &self.deps.surface;
        let cues = &self.deps.cues;
        let out = type_command(
            text,
            self.typing_wpm,
            &self.cancel,
            |s| {
                cues.play(Cue::Typing);
                surface.set_input(s);
            },
            || {},
        )
        .await;
        match out {
            Typed::Finished => self.ensure_live(),
            Typed::Cancelled => Err(DemoError::Cancelled),
        }
    }

    async fn pause(&self, d: Duration) -> Step {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(DemoError::Cancelled),
            _ = tokio::time::sleep(d) => Ok(()),
        }
    }

    fn ensure_live(&self) -> Step {
        if self.cancel.is_cancelled() || self.finished.load(Ordering::SeqCst) {
            Err(DemoError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn enter(&self, next: DemoPhase) {
        // Checked under the watch lock: `finish` sets the latch before it
        // publishes, so a late step never overwrites the terminal phase.
        let mut prev = None;
        self.phase.send_if_modified(|p| {
            if self.finished.load(Ordering::SeqCst) || *p == next {
                return false;
            }
            prev = Some(std::mem::replace(p, next));
            true
        });
        if let Some(prev) = prev {
            debug!(target: "demo", from = ?prev, to = ?next, "demo phase");
        }
    }

    fn lock_scroll(&self) {
        if !self.scroll_locked.swap(true, Ordering::SeqCst) {
            self.deps.host.set_scroll_locked(true);
        }
    }

    fn unlock_scroll(&self) {
        if self.scroll_locked.swap(false, Ordering::SeqCst) {
            self.deps.host.set_scroll_locked(false);
        }
    }

    /// Shared cleanup for completion, skip and failure. Runs once.
    fn finish(&self, end: DemoEnd) {
        if self.finished.swap(true, Ordering::SeqCst) {
            return;
        }
        self.armed.store(false, Ordering::SeqCst);
        self.cancel.cancel();
        self.unlock_scroll();
        self.deps.host.focus(&self.config.input_element);
        let terminal = match end {
            DemoEnd::Completed => DemoPhase::Complete,
            DemoEnd::Skipped | DemoEnd::Failed => {
                counter!("demo_skips_total").increment(1);
                DemoPhase::Idle
            }
        };
        self.phase.send_replace(terminal);
        self.deps.surface.finished(end);
        info!(target: "demo", ?end, "demo finished");
    }
}

fn cancel_aware(e: crate::error::ClientError) -> DemoError {
    if e.is_cancelled() {
        DemoError::Cancelled
    } else {
        DemoError::Client(e)
    }
}
