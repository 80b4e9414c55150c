// src/config.rs
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::gateway::default_preferences;
use crate::typing::DEFAULT_WPM;

pub const ENV_CONFIG_PATH: &str = "DEVPULSE_CONFIG_PATH";
pub const ENV_API_BASE_URL: &str = "DEVPULSE_API_BASE_URL";
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

fn default_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}
fn default_wpm() -> u32 {
    DEFAULT_WPM
}
fn default_volume() -> f32 {
    0.5
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    #[serde(default = "default_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_wpm")]
    pub typing_wpm: u32,
    /// 0.0 ..= 1.0
    #[serde(default = "default_volume")]
    pub cue_volume: f32,
    #[serde(default = "default_preferences")]
    pub default_sources: Vec<String>,
    #[serde(default)]
    pub demo: DemoConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_base_url(),
            typing_wpm: default_wpm(),
            cue_volume: default_volume(),
            default_sources: default_preferences(),
            demo: DemoConfig::default(),
        }
    }
}

/// Timings and canned text for the onboarding demo.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DemoConfig {
    pub landing_route: String,
    pub terminal_element: String,
    pub input_element: String,
    pub scroll_ms: u64,
    pub frame_ms: u64,
    pub burst_delay_ms: u64,
    pub boot_message: String,
    pub scan_command: String,
    pub assistant_command: String,
    pub assistant_message: String,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            landing_route: "/".into(),
            terminal_element: "terminal".into(),
            input_element: "terminal-input".into(),
            scroll_ms: 1500,
            frame_ms: 16,
            burst_delay_ms: 30,
            boot_message: "devpulse v1.1 ready. tracking the pulse of developer trends.".into(),
            scan_command: "scan all".into(),
            assistant_command: "synth".into(),
            assistant_message: "SYNTH online. Searching across every source...".into(),
        }
    }
}

impl DemoConfig {
    pub fn scroll_duration(&self) -> Duration {
        Duration::from_millis(self.scroll_ms)
    }
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_ms.max(1))
    }
    pub fn burst_delay(&self) -> Duration {
        Duration::from_millis(self.burst_delay_ms)
    }
}

impl ClientConfig {
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading client config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg: ClientConfig = match ext.as_str() {
            "json" => serde_json::from_str(&content).context("parsing client config json")?,
            "toml" => toml::from_str(&content).context("parsing client config toml")?,
            other => bail!("unsupported config format: {other:?}"),
        };
        Ok(cfg.sanitized())
    }

    /// 1) $DEVPULSE_CONFIG_PATH
    /// 2) config/devpulse.toml
    /// 3) config/devpulse.json
    /// 4) built-in defaults
    ///
    /// $DEVPULSE_API_BASE_URL overrides the base URL from any of them.
    pub fn load_default() -> Result<Self> {
        let mut cfg = Self::load_file_chain()?;
        if let Ok(url) = std::env::var(ENV_API_BASE_URL) {
            if !url.trim().is_empty() {
                cfg.api_base_url = url;
            }
        }
        Ok(cfg.sanitized())
    }

    fn load_file_chain() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
        for candidate in ["config/devpulse.toml", "config/devpulse.json"] {
            let pb = PathBuf::from(candidate);
            if pb.exists() {
                return Self::load_from(&pb);
            }
        }
        Ok(Self::default())
    }

    fn sanitized(mut self) -> Self {
        self.api_base_url = self.api_base_url.trim().trim_end_matches('/').to_string();
        if self.api_base_url.is_empty() {
            self.api_base_url = default_base_url();
        }
        if self.typing_wpm == 0 {
            self.typing_wpm = default_wpm();
        }
        if !(0.0..=1.0).contains(&self.cue_volume) {
            self.cue_volume = default_volume();
        }
        let mut seen = BTreeSet::new();
        self.default_sources = self
            .default_sources
            .into_iter()
            .map(|s| s.trim().to_ascii_lowercase())
            .filter(|s| !s.is_empty() && seen.insert(s.clone()))
            .collect();
        if self.default_sources.is_empty() {
            self.default_sources = default_preferences();
        }
        self
    }
}
