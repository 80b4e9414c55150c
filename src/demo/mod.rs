// src/demo/mod.rs
//! Single-shot onboarding demo for anonymous visitors.

pub mod host;
pub mod orchestrator;

pub use host::{ease_in_out, DemoSurface, PageHost, Provenance, ScrollPos};
pub use orchestrator::{DemoDeps, DemoOrchestrator};

use reqwest::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoPhase {
    Idle,
    Scrolling,
    Typing,
    ExecutingScan,
    CachedBurst,
    FreshScan,
    SynthActivation,
    SynthSearch,
    Complete,
}

impl DemoPhase {
    /// Phases from which the user may skip.
    pub fn is_running(self) -> bool {
        !matches!(self, DemoPhase::Idle | DemoPhase::Complete)
    }
}

/// How a demo run ended. Every variant leaves the page usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoEnd {
    Completed,
    Skipped,
    /// Internal failure, cleaned up like a skip.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Escape,
    Enter,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interaction {
    Scroll,
    Click,
    MouseMove,
    KeyDown(Key),
}

impl Interaction {
    /// Browsers only unlock audio from these.
    pub fn is_trusted_gesture(self) -> bool {
        matches!(self, Interaction::Click | Interaction::KeyDown(_))
    }
}

/// What the page knows at mount time.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    pub signed_in: bool,
    pub route: String,
    pub referrer: Option<String>,
    /// Host of the current page, e.g. "devpulse.dev".
    pub host: String,
}

impl PageContext {
    /// Absent, empty or unparsable referrers all count as external.
    pub fn is_external_landing(&self) -> bool {
        let Some(r) = self.referrer.as_deref().map(str::trim).filter(|r| !r.is_empty()) else {
            return true;
        };
        match Url::parse(r) {
            Ok(u) => !u
                .host_str()
                .is_some_and(|h| h.eq_ignore_ascii_case(self.host.trim())),
            Err(_) => true,
        }
    }

    pub fn demo_eligible(&self, landing_route: &str) -> bool {
        !self.signed_in && self.route == landing_route && self.is_external_landing()
    }
}

pub(crate) fn ensure_metrics_described() {
    use metrics::{describe_counter, Unit};
    static ONCE: once_cell::sync::OnceCell<()> = once_cell::sync::OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("demo_runs_total", Unit::Count, "Demo sequences started.");
        describe_counter!("demo_skips_total", Unit::Count, "Demo sequences skipped or aborted.");
    });
}
