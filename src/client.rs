// src/client.rs
//! HTTP client for the DevPulse backend. Every endpoint resolves against one
//! configured base URL.

use std::future::Future;
use std::time::Duration;

use futures::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::{RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{ClientError, ClientResult};
use crate::gateway::{default_preferences, AssistantDemo, DemoFeeds, PreferenceGateway};
use crate::item::TrendingItem;
use crate::scan::stream::OpenFuture;
use crate::scan::{ScanRequest, ScanSource, ScanStream};

const USER_AGENT: &str = "devpulse-client/0.1";

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
    session_token: Option<String>,
    request_timeout: Duration,
}

#[derive(Serialize, Deserialize)]
struct PreferencesBody {
    sources: Vec<String>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> ClientResult<Self> {
        // Url::join drops the last path segment unless it ends in '/'.
        let mut raw = base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let base = Url::parse(&raw).map_err(|e| ClientError::InvalidUrl(format!("{raw}: {e}")))?;
        // No overall timeout: scan streams stay open for the whole scan.
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(4))
            .build()?;
        Ok(Self {
            http,
            base,
            session_token: None,
            request_timeout: Duration::from_secs(10),
        })
    }

    /// Attach the signed-in user's access token.
    pub fn with_session(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    pub fn is_signed_in(&self) -> bool {
        self.session_token.is_some()
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> ClientResult<Url> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| ClientError::InvalidUrl(format!("{path}: {e}")))
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.session_token {
            Some(t) => req.bearer_auth(t),
            None => req,
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        path: &str,
        query: &[(&str, String)],
        cancel: &CancellationToken,
    ) -> ClientResult<T> {
        let url = self.endpoint(path)?;
        let req = self.authorize(self.http.get(url).query(query).timeout(self.request_timeout));
        cancellable(cancel, async move {
            let resp = req.send().await?;
            let status = resp.status();
            if !status.is_success() {
                return Err(ClientError::from_status(endpoint, status.as_u16()));
            }
            let bytes = resp.bytes().await?;
            Ok(serde_json::from_slice(&bytes)?)
        })
        .await
    }
}

/// Race `fut` against the token; the loser is dropped, which closes its connection.
pub(crate) async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = ClientResult<T>>,
) -> ClientResult<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ClientError::Cancelled),
        r = fut => r,
    }
}

/// Keep valid items; drop the rest with a warning.
fn validate_items(endpoint: &str, raw: Vec<TrendingItem>) -> Vec<TrendingItem> {
    let total = raw.len();
    let kept: Vec<TrendingItem> = raw.into_iter().filter_map(|it| it.validated().ok()).collect();
    if kept.len() < total {
        warn!(target: "gateway", endpoint, dropped = total - kept.len(), "dropped invalid items");
    }
    kept
}

impl ScanSource for ApiClient {
    fn open_scan(&self, request: &ScanRequest, cancel: CancellationToken) -> ScanStream {
        let url = match self.endpoint("api/scan") {
            Ok(u) => u,
            Err(e) => return ScanStream::failed(e, cancel),
        };
        debug!(target: "scan", %url, scope = %request.scope.as_param(), demo = request.demo, "opening scan");
        let req = self.authorize(
            self.http
                .get(url)
                .query(&request.query())
                .header(ACCEPT, "text/event-stream"),
        );
        let opener: OpenFuture = Box::pin(async move {
            let resp = req.send().await?;
            let status = resp.status();
            if !status.is_success() {
                return Err(ClientError::from_status("scan", status.as_u16()));
            }
            Ok(resp
                .bytes_stream()
                .map(|chunk| chunk.map(|b| b.to_vec()).map_err(ClientError::from))
                .boxed())
        });
        ScanStream::start(opener, cancel)
    }
}

#[async_trait::async_trait]
impl PreferenceGateway for ApiClient {
    async fn load_preferences(&self, cancel: &CancellationToken) -> ClientResult<Vec<String>> {
        if !self.is_signed_in() {
            return Ok(default_preferences());
        }
        match self
            .get_json::<PreferencesBody>("preferences", "api/preferences", &[], cancel)
            .await
        {
            Ok(body) if !body.sources.is_empty() => Ok(body.sources),
            Ok(_) | Err(ClientError::Status { status: 404, .. }) => Ok(default_preferences()),
            Err(e) => Err(e),
        }
    }

    async fn save_preferences(&self, sources: &[String], cancel: &CancellationToken) -> ClientResult<()> {
        if !self.is_signed_in() {
            return Err(ClientError::AuthRequired);
        }
        let url = self.endpoint("api/preferences")?;
        let body = PreferencesBody {
            sources: sources.to_vec(),
        };
        let req = self.authorize(self.http.put(url).json(&body).timeout(self.request_timeout));
        cancellable(cancel, async move {
            let resp = req.send().await?;
            let status = resp.status();
            if !status.is_success() {
                return Err(ClientError::from_status("preferences", status.as_u16()));
            }
            Ok(())
        })
        .await
    }

    async fn load_todays_cached_results(&self, cancel: &CancellationToken) -> ClientResult<Vec<TrendingItem>> {
        let date = chrono::Utc::now().date_naive().format("%Y-%m-%d").to_string();
        let raw: Vec<TrendingItem> = self
            .get_json("cached-results", "api/cached-results", &[("date", date)], cancel)
            .await?;
        Ok(validate_items("cached-results", raw))
    }
}

#[async_trait::async_trait]
impl DemoFeeds for ApiClient {
    async fn load_demo_cached_items(&self, cancel: &CancellationToken) -> ClientResult<Vec<TrendingItem>> {
        let raw: Vec<TrendingItem> = self
            .get_json("demo-cached-items", "api/demo/cached-items", &[], cancel)
            .await?;
        Ok(validate_items("demo-cached-items", raw))
    }

    async fn load_assistant_demo(&self, cancel: &CancellationToken) -> ClientResult<AssistantDemo> {
        let mut demo: AssistantDemo = self
            .get_json("assistant-demo", "api/ai/demo/next", &[], cancel)
            .await?;
        demo.results = validate_items("assistant-demo", demo.results);
        Ok(demo)
    }
}
