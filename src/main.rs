//! `devpulse`: terminal front-end for the DevPulse trends dashboard.
//!
//! `devpulse` runs the interactive command loop; `devpulse demo` plays the
//! onboarding sequence against the configured backend.

use std::sync::Arc;

use anyhow::{Context, Result};
use devpulse_client::config::ClientConfig;
use devpulse_client::cues::{SilentLoader, SoundCuePlayer};
use devpulse_client::demo::{
    DemoDeps, DemoEnd, DemoOrchestrator, DemoSurface, Interaction, PageContext, PageHost,
    Provenance, ScrollPos,
};
use devpulse_client::gateway::DemoFeeds;
use devpulse_client::terminal::{Command, CommandHistory, OutputKind, HELP};
use devpulse_client::{ApiClient, Dashboard, TrendingItem};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SHOWN_ITEMS: usize = 20;

// Library events log under per-concern targets, not the crate path.
const DEFAULT_FILTER: &str = "warn,scan=info,demo=info,dashboard=info,gateway=info,config=info,cues=info";

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let json = std::env::var("DEVPULSE_LOG_JSON").is_ok_and(|v| v == "1");

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

fn format_item(item: &TrendingItem) -> String {
    let metric = item
        .headline_metric()
        .map(|n| format!(" [{n}]"))
        .unwrap_or_default();
    format!("{:<12} {}{}\n             {}", item.source, item.title, metric, item.url)
}

fn print_items(items: &[TrendingItem]) {
    for it in items.iter().take(SHOWN_ITEMS) {
        println!("{}", format_item(it));
    }
    if items.len() > SHOWN_ITEMS {
        println!("... {} more", items.len() - SHOWN_ITEMS);
    }
}

/// Terminal stand-in for the page: nothing to scroll, every element exists.
struct NoopHost;

impl PageHost for NoopHost {
    fn set_scroll_locked(&self, _locked: bool) {}
    fn scroll_position(&self) -> ScrollPos {
        ScrollPos::default()
    }
    fn scroll_to(&self, _pos: ScrollPos) {}
    fn centering_position(&self, _element: &str) -> Option<ScrollPos> {
        Some(ScrollPos::default())
    }
    fn focus(&self, _element: &str) {}
}

struct StdoutSurface;

impl DemoSurface for StdoutSurface {
    fn set_input(&self, _text: &str) {}
    fn submit(&self, command: &str) {
        println!("$ {command}");
    }
    fn print(&self, line: &str, _kind: OutputKind) {
        println!("{line}");
    }
    fn show_item(&self, item: &TrendingItem, provenance: Provenance) {
        let tag = match provenance {
            Provenance::Cached => "cached",
            Provenance::Live => "live",
            Provenance::Assistant => "synth",
        };
        println!("({tag}) {}", format_item(item));
    }
    fn finished(&self, end: DemoEnd) {
        println!("-- demo {end:?} --");
    }
}

async fn run_demo(cfg: &ClientConfig, client: Arc<ApiClient>, dashboard: &Dashboard) -> Result<()> {
    let deps = DemoDeps {
        host: Arc::new(NoopHost),
        surface: Arc::new(StdoutSurface),
        cues: dashboard.cues(),
        scans: client.clone(),
        feeds: client,
        state: dashboard.state(),
        notices: dashboard.notice_board(),
    };
    let demo = DemoOrchestrator::new(deps, cfg.demo.clone(), cfg.typing_wpm);
    let ctx = PageContext {
        signed_in: false,
        route: cfg.demo.landing_route.clone(),
        referrer: None,
        host: String::new(),
    };
    if !demo.mount(&ctx) {
        println!("demo not eligible");
        return Ok(());
    }
    demo.handle_interaction(Interaction::Scroll);

    tokio::select! {
        _ = demo.join() => {}
        _ = tokio::signal::ctrl_c() => {
            demo.skip();
            demo.join().await;
        }
    }
    if let Some(n) = dashboard.notices().current() {
        eprintln!("! {}", n.message);
    }
    Ok(())
}

async fn run_command(
    line: &str,
    dashboard: &Dashboard,
    feeds: &dyn DemoFeeds,
    history: &mut CommandHistory,
    cancel: &CancellationToken,
) -> (String, OutputKind) {
    let cmd = match Command::parse(line) {
        Ok(c) => c,
        Err(e) => return (e.to_string(), OutputKind::Error),
    };
    match cmd {
        Command::Scan(scope) => match dashboard.scan(scope, cancel).await {
            Ok(report) => {
                print_items(&dashboard.view());
                (
                    format!(
                        "{:?}: {} items, {} skipped",
                        report.phase, report.delivered, report.skipped
                    ),
                    OutputKind::Success,
                )
            }
            Err(e) => (format!("scan failed: {e}"), OutputKind::Error),
        },
        Command::Filter(sources) => {
            dashboard.set_filter(sources);
            print_items(&dashboard.view());
            ("filter applied".into(), OutputKind::Success)
        }
        Command::Priority(source) => {
            dashboard.set_priority(source.as_deref());
            print_items(&dashboard.view());
            ("priority applied".into(), OutputKind::Success)
        }
        Command::Sources => {
            let sel = dashboard.selection();
            (
                format!(
                    "preferred: {} | scanned: {} | priority: {}",
                    sel.preferences().join(","),
                    sel.manual().join(","),
                    sel.priority().unwrap_or("none")
                ),
                OutputKind::Info,
            )
        }
        Command::Cached => match feeds.load_demo_cached_items(cancel).await {
            Ok(items) => {
                print_items(&items);
                (format!("{} cached items", items.len()), OutputKind::Success)
            }
            Err(e) => (format!("cache unavailable: {e}"), OutputKind::Error),
        },
        Command::History => {
            let lines: Vec<String> = history
                .entries()
                .iter()
                .map(|h| format!("{} {}", h.at.format("%H:%M:%S"), h.command))
                .collect();
            (lines.join("\n"), OutputKind::Info)
        }
        Command::Help => (HELP.to_string(), OutputKind::Info),
        Command::Clear => ("\x1b[2J\x1b[H".to_string(), OutputKind::Info),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = ClientConfig::load_default().context("loading client config")?;
    let mut client = ApiClient::new(&cfg.api_base_url).context("building backend client")?;
    if let Ok(token) = std::env::var("DEVPULSE_SESSION_TOKEN") {
        if !token.trim().is_empty() {
            client = client.with_session(token.trim());
        }
    }
    let client = Arc::new(client);
    let cues = Arc::new(SoundCuePlayer::load(&SilentLoader, cfg.cue_volume));
    let dashboard = Dashboard::new(client.clone(), client.clone(), cues)
        .with_fallback_sources(cfg.default_sources.clone());

    let cancel = CancellationToken::new();
    dashboard.mount(&cancel).await.context("mounting dashboard")?;
    if let Some(n) = dashboard.notices().current() {
        eprintln!("! {}", n.message);
    }

    if std::env::args().nth(1).as_deref() == Some("demo") {
        return run_demo(&cfg, client, &dashboard).await;
    }

    if dashboard.is_from_cache() {
        println!("today's cached results:");
        print_items(&dashboard.view());
    }
    println!("devpulse ready. type `help` for commands.");

    let mut history = CommandHistory::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }
        let (output, kind) = run_command(line, &dashboard, client.as_ref(), &mut history, &cancel).await;
        match kind {
            OutputKind::Error => eprintln!("{output}"),
            _ => println!("{output}"),
        }
        history.record(line, output, kind);
    }
    cancel.cancel();
    Ok(())
}
