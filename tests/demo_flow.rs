// tests/demo_flow.rs
//
// Onboarding demo: eligibility, single trigger, skip/failure cleanup and a
// full run on paused time.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{
    cached_frame, complete_frame, item, item_frame, urls, FixtureScans, HangingScans,
    RecordingHost, RecordingSurface,
};
use devpulse_client::config::DemoConfig;
use devpulse_client::cues::{AudioClip, ClipLoader, Cue, SoundCuePlayer};
use devpulse_client::demo::{
    DemoDeps, DemoEnd, DemoOrchestrator, DemoPhase, Interaction, Key, PageContext, Provenance,
    ScrollPos,
};
use devpulse_client::gateway::{AssistantDemo, InMemoryGateway};
use devpulse_client::notice::{NoticeBoard, NoticeKind};
use devpulse_client::scan::ScanSource;
use devpulse_client::AggregationState;

const TARGET: ScrollPos = ScrollPos { x: 0.0, y: 640.0 };

struct Rig {
    demo: Arc<DemoOrchestrator>,
    host: Arc<RecordingHost>,
    surface: Arc<RecordingSurface>,
    state: Arc<Mutex<AggregationState>>,
    notices: Arc<NoticeBoard>,
}

fn assistant() -> AssistantDemo {
    AssistantDemo {
        query: "rust async runtimes".into(),
        summary: "Three picks.".into(),
        results: vec![item("github", "s1")],
    }
}

fn rig(host: Arc<RecordingHost>, scans: Arc<dyn ScanSource>, gw: InMemoryGateway) -> Rig {
    rig_with_cues(host, scans, gw, Arc::new(SoundCuePlayer::silent()))
}

fn rig_with_cues(
    host: Arc<RecordingHost>,
    scans: Arc<dyn ScanSource>,
    gw: InMemoryGateway,
    cues: Arc<SoundCuePlayer>,
) -> Rig {
    let surface = RecordingSurface::new();
    let state = Arc::new(Mutex::new(AggregationState::default()));
    let notices = Arc::new(NoticeBoard::new());
    let deps = DemoDeps {
        host: host.clone(),
        surface: surface.clone(),
        cues,
        scans,
        feeds: Arc::new(gw),
        state: state.clone(),
        notices: notices.clone(),
    };
    let demo = DemoOrchestrator::new(deps, DemoConfig::default(), 120);
    Rig { demo, host, surface, state, notices }
}

/// Clip that accepts every play and counts them.
#[derive(Default)]
struct CountingClip {
    plays: AtomicUsize,
}

impl AudioClip for CountingClip {
    fn set_volume(&self, _volume: f32) {}
    fn rewind(&self) {}
    fn pause(&self) {}
    fn play(&self) -> anyhow::Result<()> {
        self.plays.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct CountingLoader(Arc<CountingClip>);

impl ClipLoader for CountingLoader {
    fn load(&self, _cue: Cue) -> anyhow::Result<Arc<dyn AudioClip>> {
        Ok(self.0.clone())
    }
}

fn landing(signed_in: bool) -> PageContext {
    PageContext {
        signed_in,
        route: "/".into(),
        referrer: Some("https://news.ycombinator.com/item?id=1".into()),
        host: "devpulse.dev".into(),
    }
}

fn with_assistant() -> InMemoryGateway {
    InMemoryGateway {
        assistant: Some(assistant()),
        ..InMemoryGateway::new()
    }
}

#[tokio::test(start_paused = true)]
async fn full_run_reaches_complete_and_restores_the_page() {
    let scans = FixtureScans::new(vec![
        cached_frame("github", "c1"),
        cached_frame("devto", "c2"),
        item_frame("reddit", "live1"),
        complete_frame(3),
    ]);
    let r = rig(RecordingHost::with_target(TARGET), scans.clone(), with_assistant());

    assert!(r.demo.mount(&landing(false)));
    assert_eq!(r.demo.listeners_attached(), 4);
    assert!(r.demo.handle_interaction(Interaction::Scroll));
    assert_eq!(r.demo.listeners_attached(), 0);
    assert_eq!(r.host.locks(), 1);
    assert!(r.demo.can_skip());

    r.demo.join().await;

    assert_eq!(r.demo.phase(), DemoPhase::Complete);
    assert_eq!(r.surface.finished_calls(), vec![DemoEnd::Completed]);
    assert_eq!(r.host.locks(), 1);
    assert_eq!(r.host.unlocks(), 1);
    assert_eq!(r.host.last_scroll(), Some(TARGET));
    assert_eq!(r.host.focused.lock().unwrap().as_slice(), ["terminal-input".to_string()]);

    assert_eq!(
        r.surface.submitted.lock().unwrap().as_slice(),
        ["scan all".to_string(), "synth".to_string()]
    );
    assert_eq!(r.surface.shown_with(Provenance::Cached), vec!["c1", "c2"]);
    assert_eq!(r.surface.shown_with(Provenance::Live), vec!["live1"]);
    assert_eq!(r.surface.shown_with(Provenance::Assistant), vec!["s1"]);
    assert!(r
        .surface
        .printed
        .lock()
        .unwrap()
        .iter()
        .any(|(l, _)| l.contains("rust async runtimes")));

    let st = r.state.lock().unwrap();
    assert_eq!(urls(st.items()), vec!["s1", "c1", "c2", "live1"]);
    assert!(!st.is_loading);

    let req = scans.last_request.lock().unwrap().clone().unwrap();
    assert!(req.demo);
    assert!(!r.demo.can_skip());
}

#[tokio::test(start_paused = true)]
async fn typing_updates_the_input_one_prefix_at_a_time() {
    let scans = FixtureScans::new(vec![complete_frame(0)]);
    let r = rig(RecordingHost::with_target(TARGET), scans, with_assistant());
    r.demo.mount(&landing(false));
    r.demo.handle_interaction(Interaction::Click);
    r.demo.join().await;

    let inputs = r.surface.inputs.lock().unwrap().clone();
    let at = inputs.iter().position(|s| s == "s").expect("scan command typed");
    assert_eq!(&inputs[at..at + 8], ["s", "sc", "sca", "scan", "scan ", "scan a", "scan al", "scan all"]);
}

#[tokio::test(start_paused = true)]
async fn two_rapid_triggers_start_exactly_once() {
    let scans = FixtureScans::new(vec![complete_frame(0)]);
    let r = rig(RecordingHost::with_target(TARGET), scans.clone(), with_assistant());
    r.demo.mount(&landing(false));

    assert!(r.demo.handle_interaction(Interaction::Scroll));
    assert!(!r.demo.handle_interaction(Interaction::Click));
    assert!(!r.demo.handle_interaction(Interaction::MouseMove));
    r.demo.join().await;

    assert_eq!(scans.opened.load(Ordering::SeqCst), 1);
    assert_eq!(r.host.locks(), 1);
    assert_eq!(r.surface.finished_calls().len(), 1);

    // Mounting again on the same page never re-arms.
    assert!(!r.demo.mount(&landing(false)));
    assert!(!r.demo.handle_interaction(Interaction::Scroll));
}

#[tokio::test(start_paused = true)]
async fn signed_in_visitor_gets_no_listeners_and_no_transitions() {
    let scans = FixtureScans::new(vec![complete_frame(0)]);
    let r = rig(RecordingHost::with_target(TARGET), scans.clone(), with_assistant());

    assert!(!r.demo.mount(&landing(true)));
    assert_eq!(r.demo.listeners_attached(), 0);

    let mut rx = r.demo.subscribe();
    for ev in [
        Interaction::Scroll,
        Interaction::Click,
        Interaction::MouseMove,
        Interaction::KeyDown(Key::Enter),
    ] {
        assert!(!r.demo.handle_interaction(ev));
    }
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert!(!rx.has_changed().unwrap());
    assert_eq!(r.demo.phase(), DemoPhase::Idle);
    assert!(!r.demo.has_triggered());
    assert_eq!(scans.opened.load(Ordering::SeqCst), 0);
    assert_eq!(r.host.locks(), 0);
}

#[tokio::test(start_paused = true)]
async fn internal_navigation_is_not_eligible() {
    let r = rig(
        RecordingHost::with_target(TARGET),
        FixtureScans::new(vec![]),
        with_assistant(),
    );
    let ctx = PageContext {
        referrer: Some("https://devpulse.dev/arcade".into()),
        ..landing(false)
    };
    assert!(!r.demo.mount(&ctx));
    assert_eq!(r.demo.listeners_attached(), 0);
}

#[tokio::test(start_paused = true)]
async fn skip_twice_cleans_up_once() {
    let scans = HangingScans::new(vec![item_frame("github", "g1")]);
    let r = rig(RecordingHost::with_target(TARGET), scans, with_assistant());
    r.demo.mount(&landing(false));
    r.demo.handle_interaction(Interaction::Scroll);

    let mut rx = r.demo.subscribe();
    rx.wait_for(|p| *p == DemoPhase::FreshScan).await.unwrap();

    r.demo.skip();
    r.demo.skip();
    r.demo.join().await;

    assert_eq!(r.demo.phase(), DemoPhase::Idle);
    assert_eq!(r.host.locks(), 1);
    assert_eq!(r.host.unlocks(), 1);
    assert_eq!(r.surface.finished_calls(), vec![DemoEnd::Skipped]);
    assert_eq!(r.surface.shown_with(Provenance::Live), vec!["g1"]);
    assert!(r.surface.shown_with(Provenance::Assistant).is_empty());
    assert!(!r.state.lock().unwrap().is_loading);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn skip_during_a_busy_scan_leaves_idle_and_consistent_state() {
    let frames = (0..300).map(|i| item_frame("github", &format!("g{i}"))).collect();
    let r = rig(RecordingHost::with_target(TARGET), HangingScans::new(frames), with_assistant());
    r.demo.mount(&landing(false));
    r.demo.handle_interaction(Interaction::Scroll);

    let mut rx = r.demo.subscribe();
    rx.wait_for(|p| *p == DemoPhase::FreshScan).await.unwrap();
    r.demo.skip();
    r.demo.join().await;

    assert_eq!(r.demo.phase(), DemoPhase::Idle);
    assert_eq!(r.surface.finished_calls(), vec![DemoEnd::Skipped]);
    // Nothing lands in the collection without having been shown, and vice versa.
    let mut shown = r.surface.shown_with(Provenance::Live);
    let mut held = urls(r.state.lock().unwrap().items());
    shown.sort();
    held.sort();
    assert_eq!(shown, held);
    assert!(!r.state.lock().unwrap().is_loading);
}

#[tokio::test(start_paused = true)]
async fn escape_skips_while_running() {
    let r = rig(
        RecordingHost::with_target(TARGET),
        FixtureScans::new(vec![complete_frame(0)]),
        with_assistant(),
    );
    r.demo.mount(&landing(false));
    r.demo.handle_interaction(Interaction::Scroll);

    let mut rx = r.demo.subscribe();
    rx.wait_for(|p| *p == DemoPhase::Typing).await.unwrap();
    assert!(!r.demo.handle_interaction(Interaction::KeyDown(Key::Escape)));
    r.demo.join().await;

    assert_eq!(r.demo.phase(), DemoPhase::Idle);
    assert_eq!(r.surface.finished_calls(), vec![DemoEnd::Skipped]);
    assert_eq!(r.host.unlocks(), 1);
    assert!(r.surface.submitted.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn missing_scroll_target_cleans_up_like_a_skip() {
    let scans = FixtureScans::new(vec![complete_frame(0)]);
    let r = rig(RecordingHost::without_target(), scans.clone(), with_assistant());
    r.demo.mount(&landing(false));
    r.demo.handle_interaction(Interaction::Scroll);
    r.demo.join().await;

    assert_eq!(r.demo.phase(), DemoPhase::Idle);
    assert_eq!(r.surface.finished_calls(), vec![DemoEnd::Failed]);
    assert_eq!(r.host.locks(), 1);
    assert_eq!(r.host.unlocks(), 1);
    assert_eq!(r.host.focused.lock().unwrap().len(), 1);
    assert_eq!(scans.opened.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn assistant_failure_still_unlocks_scroll() {
    let scans = FixtureScans::new(vec![item_frame("github", "g1"), complete_frame(1)]);
    // No canned assistant result: the endpoint answers 404.
    let r = rig(RecordingHost::with_target(TARGET), scans, InMemoryGateway::new());
    r.demo.mount(&landing(false));
    r.demo.handle_interaction(Interaction::Click);
    r.demo.join().await;

    assert_eq!(r.surface.finished_calls(), vec![DemoEnd::Failed]);
    assert_eq!(r.host.unlocks(), 1);
    assert_eq!(urls(r.state.lock().unwrap().items()), vec!["g1"]);
    assert_eq!(r.notices.current().unwrap().kind, NoticeKind::Transport);
}

#[tokio::test(start_paused = true)]
async fn assistant_sign_in_failure_raises_the_sign_in_notice() {
    let scans = FixtureScans::new(vec![item_frame("github", "g1"), complete_frame(1)]);
    let gw = InMemoryGateway {
        fail_status: Some(401),
        ..InMemoryGateway::new()
    };
    let r = rig(RecordingHost::with_target(TARGET), scans, gw);
    r.demo.mount(&landing(false));
    r.demo.handle_interaction(Interaction::Scroll);
    r.demo.join().await;

    assert_eq!(r.surface.finished_calls(), vec![DemoEnd::Failed]);
    assert_eq!(r.host.unlocks(), 1);
    let notice = r.notices.current().expect("sign-in notice");
    assert_eq!(notice.kind, NoticeKind::AuthRequired);
    assert!(notice.message.contains("Sign in"));
}

#[tokio::test(start_paused = true)]
async fn skipping_raises_no_notice() {
    let r = rig(
        RecordingHost::with_target(TARGET),
        HangingScans::new(vec![]),
        with_assistant(),
    );
    r.demo.mount(&landing(false));
    r.demo.handle_interaction(Interaction::Scroll);
    r.demo.skip();
    r.demo.join().await;
    assert!(r.notices.current().is_none());
}

#[tokio::test(start_paused = true)]
async fn only_click_and_key_presses_unlock_audio() {
    let clip = Arc::new(CountingClip::default());
    let cues = Arc::new(SoundCuePlayer::load(&CountingLoader(clip.clone()), 0.5));
    let r = rig_with_cues(
        RecordingHost::with_target(TARGET),
        HangingScans::new(vec![]),
        with_assistant(),
        cues.clone(),
    );
    r.demo.mount(&landing(false));

    assert!(r.demo.handle_interaction(Interaction::Scroll));
    assert!(!cues.is_enabled());
    r.demo.handle_interaction(Interaction::MouseMove);
    assert!(!cues.is_enabled());
    assert_eq!(clip.plays.load(Ordering::SeqCst), 0);

    r.demo.handle_interaction(Interaction::Click);
    assert!(cues.is_enabled());
    assert_eq!(clip.plays.load(Ordering::SeqCst), 1);

    r.demo.skip();
    r.demo.join().await;
}

#[tokio::test(start_paused = true)]
async fn key_press_trigger_unlocks_audio() {
    let clip = Arc::new(CountingClip::default());
    let cues = Arc::new(SoundCuePlayer::load(&CountingLoader(clip.clone()), 0.5));
    let r = rig_with_cues(
        RecordingHost::with_target(TARGET),
        HangingScans::new(vec![]),
        with_assistant(),
        cues.clone(),
    );
    r.demo.mount(&landing(false));

    assert!(r.demo.handle_interaction(Interaction::KeyDown(Key::Enter)));
    assert!(cues.is_enabled());

    r.demo.skip();
    r.demo.join().await;
}

#[tokio::test(start_paused = true)]
async fn teardown_before_trigger_disarms_for_good() {
    let scans = FixtureScans::new(vec![complete_frame(0)]);
    let r = rig(RecordingHost::with_target(TARGET), scans.clone(), with_assistant());
    assert!(r.demo.mount(&landing(false)));
    r.demo.teardown();

    assert_eq!(r.demo.listeners_attached(), 0);
    assert!(!r.demo.handle_interaction(Interaction::Scroll));
    assert!(!r.demo.mount(&landing(false)));
    assert_eq!(scans.opened.load(Ordering::SeqCst), 0);
    assert!(r.surface.finished_calls().is_empty());
}
