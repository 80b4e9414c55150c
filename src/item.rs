// src/item.rs
//! Trending item model plus the text clean-up applied to everything scraped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sources the backend knows how to scan. Also the default preference list.
pub const KNOWN_SOURCES: [&str; 6] = ["github", "hackernews", "devto", "reddit", "stocks", "crypto"];

fn default_category() -> String {
    "article".to_string()
}

/// One aggregated content entry. `url` is the natural dedup key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrendingItem {
    #[serde(default)]
    pub id: String,
    pub title: String,
    pub url: String,
    /// e.g. "github", "reddit/programming"
    pub source: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub stars: Option<u64>,
    #[serde(default)]
    pub score: Option<i64>,
    #[serde(default)]
    pub comments: Option<u64>,
    #[serde(default)]
    pub reactions: Option<u64>,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub scraped_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_new: bool,
}

/// Why a decoded item was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidItem {
    #[error("item has an empty title")]
    EmptyTitle,
    #[error("item has an empty url")]
    EmptyUrl,
}

impl TrendingItem {
    pub fn new(source: impl Into<String>, title: impl Into<String>, url: impl Into<String>) -> Self {
        let mut it = Self {
            id: String::new(),
            title: title.into(),
            url: url.into(),
            source: source.into(),
            author: None,
            description: None,
            language: None,
            stars: None,
            score: None,
            comments: None,
            reactions: None,
            category: default_category(),
            scraped_at: None,
            is_new: false,
        };
        it.id = derive_id(&it.source, &it.url);
        it
    }

    /// Clean text fields, fill a missing id and reject items without title/url.
    pub fn validated(mut self) -> Result<Self, InvalidItem> {
        self.url = self.url.trim().to_string();
        if self.url.is_empty() {
            return Err(InvalidItem::EmptyUrl);
        }
        self.title = normalize_text(&self.title);
        if self.title.is_empty() {
            return Err(InvalidItem::EmptyTitle);
        }
        self.description = self
            .description
            .as_deref()
            .map(normalize_text)
            .filter(|d| !d.is_empty());
        self.source = self.source.trim().to_ascii_lowercase();
        if self.id.trim().is_empty() {
            self.id = derive_id(&self.source, &self.url);
        }
        Ok(self)
    }

    /// Segment before the first `/` ("reddit/programming" -> "reddit").
    pub fn top_source(&self) -> &str {
        top_level(&self.source)
    }

    /// Stars, then score, then reactions: whatever the source reports.
    pub fn headline_metric(&self) -> Option<i64> {
        self.stars
            .map(|s| s as i64)
            .or(self.score)
            .or(self.reactions.map(|r| r as i64))
    }
}

pub fn top_level(source: &str) -> &str {
    source.split('/').next().unwrap_or(source).trim()
}

/// `<source>-<12 hex chars of sha256(url)>`; stable across sessions.
pub fn derive_id(source: &str, url: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(source.len() + 13);
    out.push_str(if source.is_empty() { "unknown" } else { source });
    out.push('-');
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Normalize text: decode entities, strip tags, collapse whitespace, cap length.
pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
    out = re_tags.replace_all(&out, "").to_string();

    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").expect("ws regex"));
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // Descriptions from some feeds are whole articles.
    if out.chars().count() > 500 {
        out = out.chars().take(500).collect();
    }
    out
}
