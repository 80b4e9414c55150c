// src/gateway.rs
//! Preference / cache gateway: the managed backend as seen by the client.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{ClientError, ClientResult};
use crate::item::{TrendingItem, KNOWN_SOURCES};

/// Documented default when a user has no stored selection.
pub fn default_preferences() -> Vec<String> {
    KNOWN_SOURCES.iter().map(|s| s.to_string()).collect()
}

/// Pre-baked assistant search shown in the demo's second act.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantDemo {
    pub query: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub results: Vec<TrendingItem>,
}

#[async_trait::async_trait]
pub trait PreferenceGateway: Send + Sync {
    /// Stored selection, or `default_preferences()` when none exists.
    async fn load_preferences(&self, cancel: &CancellationToken) -> ClientResult<Vec<String>>;
    async fn save_preferences(&self, sources: &[String], cancel: &CancellationToken) -> ClientResult<()>;
    /// Items scraped today; empty is a normal outcome.
    async fn load_todays_cached_results(&self, cancel: &CancellationToken) -> ClientResult<Vec<TrendingItem>>;
}

#[async_trait::async_trait]
pub trait DemoFeeds: Send + Sync {
    async fn load_demo_cached_items(&self, cancel: &CancellationToken) -> ClientResult<Vec<TrendingItem>>;
    async fn load_assistant_demo(&self, cancel: &CancellationToken) -> ClientResult<AssistantDemo>;
}

/// Fixture backend for tests and offline runs.
#[derive(Debug, Default)]
pub struct InMemoryGateway {
    pub signed_in: bool,
    pub preferences: Mutex<Option<Vec<String>>>,
    pub todays_results: Vec<TrendingItem>,
    pub demo_cached: Vec<TrendingItem>,
    pub assistant: Option<AssistantDemo>,
    /// When set, every call fails with this HTTP status.
    pub fail_status: Option<u16>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn check(&self, endpoint: &'static str, cancel: &CancellationToken) -> ClientResult<()> {
        if cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }
        match self.fail_status {
            Some(status) => Err(ClientError::from_status(endpoint, status)),
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl PreferenceGateway for InMemoryGateway {
    async fn load_preferences(&self, cancel: &CancellationToken) -> ClientResult<Vec<String>> {
        self.check("preferences", cancel)?;
        let stored = self.preferences.lock().expect("preferences mutex poisoned").clone();
        Ok(stored.unwrap_or_else(default_preferences))
    }

    async fn save_preferences(&self, sources: &[String], cancel: &CancellationToken) -> ClientResult<()> {
        self.check("preferences", cancel)?;
        if !self.signed_in {
            return Err(ClientError::AuthRequired);
        }
        *self.preferences.lock().expect("preferences mutex poisoned") = Some(sources.to_vec());
        Ok(())
    }

    async fn load_todays_cached_results(&self, cancel: &CancellationToken) -> ClientResult<Vec<TrendingItem>> {
        self.check("cached-results", cancel)?;
        Ok(self.todays_results.clone())
    }
}

#[async_trait::async_trait]
impl DemoFeeds for InMemoryGateway {
    async fn load_demo_cached_items(&self, cancel: &CancellationToken) -> ClientResult<Vec<TrendingItem>> {
        self.check("demo-cached-items", cancel)?;
        Ok(self.demo_cached.clone())
    }

    async fn load_assistant_demo(&self, cancel: &CancellationToken) -> ClientResult<AssistantDemo> {
        self.check("assistant-demo", cancel)?;
        self.assistant
            .clone()
            .ok_or(ClientError::Status { endpoint: "assistant-demo", status: 404 })
    }
}
